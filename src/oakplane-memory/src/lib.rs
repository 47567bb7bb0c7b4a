//! Persistence for control-plane resources.
//!
//! [`Memory`] is the raw key/value engine (LMDB or in-process), [`Store`] the
//! typed view the release engine works against.

mod batch;
mod engine;
mod store;

pub use batch::WriteBatch;
pub use engine::Memory;
pub use store::{Store, StoreRead, StoreWriter};
