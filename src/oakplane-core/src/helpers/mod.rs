pub mod ids;
pub mod paging;
pub mod pem;
pub mod sni;
pub mod x509;

pub use ids::*;
pub use paging::*;
pub use x509::CertificateFacts;
