use crate::helpers::sni;
use crate::models::release::{Record, Releasable, ReleaseStatus, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub sni: String,
    /// PEM encoded certificate chain.
    pub certificate: String,
    /// PEM encoded private key.
    pub private_key: String,
    pub expired_at: DateTime<Utc>,
    pub is_enable: bool,
    #[serde(default)]
    pub release_status: ReleaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Keep key material out of logs.
impl std::fmt::Debug for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Certificate")
            .field("id", &self.id)
            .field("sni", &self.sni)
            .field("expired_at", &self.expired_at)
            .field("is_enable", &self.is_enable)
            .field("release_status", &self.release_status)
            .finish_non_exhaustive()
    }
}

impl Certificate {
    pub fn covers(&self, domain: &str) -> bool {
        sni::covers(&self.sni, domain)
    }

    pub fn is_wildcard(&self) -> bool {
        sni::is_wildcard(&self.sni)
    }
}

impl Record for Certificate {
    const KIND: ResourceKind = ResourceKind::Certificate;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Releasable for Certificate {
    fn is_enable(&self) -> bool {
        self.is_enable
    }

    fn release_status(&self) -> ReleaseStatus {
        self.release_status
    }

    fn set_release_status(&mut self, status: ReleaseStatus) {
        self.release_status = status;
        self.updated_at = Utc::now();
    }
}
