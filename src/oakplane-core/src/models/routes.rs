use crate::models::release::{Record, Releasable, ReleaseStatus, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catch-all path every service carries; users can neither create nor edit it.
pub const DEFAULT_ROUTE_PATH: &str = "/*";

pub const ROUTE_PLUGIN_ORDER_MIN: u8 = 1;
pub const ROUTE_PLUGIN_ORDER_MAX: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    ALL,
    GET,
    POST,
    PUT,
    DELETE,
    OPTIONS,
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(Method::ALL),
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "OPTIONS" => Ok(Method::OPTIONS),
            other => Err(format!("unsupported request method `{other}`")),
        }
    }
}

// ---------- routes ----------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub service_id: String,
    pub name: String,
    pub path: String,
    pub methods: Vec<Method>,
    pub is_enable: bool,
    #[serde(default)]
    pub release_status: ReleaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    pub fn is_default(&self) -> bool {
        self.path == DEFAULT_ROUTE_PATH
    }
}

impl Record for Route {
    const KIND: ResourceKind = ResourceKind::Route;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Releasable for Route {
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

/// Binding of a plugin onto a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlugin {
    pub id: String,
    pub route_id: String,
    pub plugin_id: String,
    pub order: u8,
    #[serde(default)]
    pub config: serde_json::Value,
    pub is_enable: bool,
}

impl Record for RoutePlugin {
    const KIND: ResourceKind = ResourceKind::RoutePlugin;

    fn id(&self) -> &str {
        &self.id
    }
}
