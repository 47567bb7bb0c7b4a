mod http;
mod memory;
mod publisher;
mod watch;

pub use http::HttpRegistryPublisher;
pub use memory::{MemoryRegistry, PublishCall, Verb};
pub use publisher::{RegistryPublisher, registry_key};
pub use watch::WatchFeed;
