use crate::models::release::{Record, Releasable, ReleaseStatus, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

fn def_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Protocol {
    #[default]
    #[serde(alias = "http")]
    HTTP,
    #[serde(alias = "https")]
    HTTPS,
    #[serde(alias = "http_and_https", alias = "http&https")]
    HTTPAndHTTPS,
}

impl Protocol {
    /// Whether gateway nodes terminate TLS for this service.
    pub fn serves_https(&self) -> bool {
        matches!(self, Protocol::HTTPS | Protocol::HTTPAndHTTPS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalance {
    #[default]
    RoundRobin,
    IpHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpType {
    Ipv4,
    Ipv6,
}

impl IpType {
    /// Discern the address family of a textual IP.
    pub fn discern(ip: &str) -> Option<IpType> {
        match ip.trim().parse::<IpAddr>().ok()? {
            IpAddr::V4(_) => Some(IpType::Ipv4),
            IpAddr::V6(_) => Some(IpType::Ipv6),
        }
    }
}

fn def_connect_timeout() -> u32 { 5000 }
fn def_read_timeout() -> u32 { 5000 }
fn def_send_timeout() -> u32 { 5000 }

/// Upstream timeouts in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "def_connect_timeout")]
    pub connection_timeout: u32,
    #[serde(default = "def_read_timeout")]
    pub read_timeout: u32,
    #[serde(default = "def_send_timeout")]
    pub send_timeout: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connection_timeout: def_connect_timeout(),
            read_timeout: def_read_timeout(),
            send_timeout: def_send_timeout(),
        }
    }
}

// ---------- services ----------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub health_check: bool,
    #[serde(default)]
    pub web_socket: bool,
    #[serde(default = "def_true")]
    pub is_enable: bool,
    #[serde(default)]
    pub release_status: ReleaseStatus,
    #[serde(default)]
    pub load_balance: LoadBalance,
    #[serde(default)]
    pub timeouts: Timeouts,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Service {
    const KIND: ResourceKind = ResourceKind::Service;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Releasable for Service {
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

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDomain {
    pub id: String,
    pub service_id: String,
    pub domain: String,
}

impl Record for ServiceDomain {
    const KIND: ResourceKind = ResourceKind::ServiceDomain;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceNode {
    pub id: String,
    pub service_id: String,
    pub node_ip: String,
    pub ip_type: IpType,
    pub node_port: u16,
    pub node_weight: u16,
}

impl ServiceNode {
    pub fn get_address(&self) -> String {
        match self.ip_type {
            IpType::Ipv4 => format!("{}:{}", self.node_ip, self.node_port),
            IpType::Ipv6 => format!("[{}]:{}", self.node_ip, self.node_port),
        }
    }
}

impl Record for ServiceNode {
    const KIND: ResourceKind = ResourceKind::ServiceNode;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Desired upstream node as supplied by an operator; identified by `{ip, port}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub node_ip: String,
    pub node_port: u16,
    pub node_weight: u16,
}
