use crate::models::release::{Record, ResourceKind};
use crate::models::services::IpType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Healthy,
    Unhealthy,
}

/// A gateway node of the data-plane cluster. Reports its own health instead of a release status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterNode {
    pub id: String,
    pub node_ip: String,
    pub ip_type: IpType,
    pub node_status: NodeStatus,
    pub is_enable: bool,
    pub updated_at: DateTime<Utc>,
}

impl Record for ClusterNode {
    const KIND: ResourceKind = ResourceKind::ClusterNode;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Value published by a gateway node on the cluster watch key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNodeWatch {
    pub node_ip: String,
    #[serde(default = "def_watch_enable")]
    pub is_enable: bool,
}

fn def_watch_enable() -> bool {
    true
}
