pub mod helpers;
pub mod models;

pub use helpers::*;
pub use models::*;
