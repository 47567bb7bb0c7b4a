use crate::models::release::{Record, Releasable, ReleaseStatus, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    Auth,
    Limit,
}

impl PluginType {
    pub fn display_name(&self) -> &'static str {
        match self {
            PluginType::Auth => "Authentication",
            PluginType::Limit => "Rate limiting",
        }
    }
}

// ---------- plugins ----------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    pub name: String,
    /// Handler key understood by the data plane, e.g. `jwt-auth`.
    pub key: String,
    #[serde(rename = "type")]
    pub r#type: PluginType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
    pub is_enable: bool,
    #[serde(default)]
    pub release_status: ReleaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Plugin {
    const KIND: ResourceKind = ResourceKind::Plugin;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Releasable for Plugin {
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
