pub mod certificates;
pub mod cluster;
pub mod plugins;
pub mod release;
pub mod routes;
pub mod services;

pub use certificates::*;
pub use cluster::*;
pub use plugins::*;
pub use release::*;
pub use routes::*;
pub use services::*;
