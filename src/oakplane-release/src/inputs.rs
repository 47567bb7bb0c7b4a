//! Operator supplied payloads and their static checks.
//!
//! Everything here runs before the store is touched; a failure is always a
//! [`ValidationError`].

use chrono::Utc;
use oakplane_core::{
    CertificateFacts, DEFAULT_ROUTE_PATH, IpType, LoadBalance, Method, NodeSpec, PluginType,
    Protocol, ROUTE_PLUGIN_ORDER_MAX, ROUTE_PLUGIN_ORDER_MIN, Timeouts, pem, sni, x509,
};
use oakplane_errors::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NAME_MAX_LEN: usize = 50;
pub const NODE_WEIGHT_MIN: u16 = 1;
pub const NODE_WEIGHT_MAX: u16 = 100;
pub const TIMEOUT_MAX_MS: u32 = 600_000;

fn def_true() -> bool {
    true
}

fn def_methods() -> Vec<Method> {
    vec![Method::ALL]
}

fn def_config() -> Value {
    Value::Object(Default::default())
}

fn check_name(field: &'static str, name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::empty(field));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(ValidationError::out_of_range(
            field,
            1,
            NAME_MAX_LEN as i64,
            name.chars().count() as i64,
        ));
    }
    Ok(())
}

fn check_config_object(field: &'static str, config: &Value) -> Result<(), ValidationError> {
    if !config.is_object() {
        return Err(ValidationError::invalid(field, config.to_string()));
    }
    Ok(())
}

// ---------- services ----------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInput {
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
    pub load_balance: LoadBalance,
    #[serde(default)]
    pub timeouts: Timeouts,
    pub domains: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub is_release: bool,
}

impl ServiceInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_name("name", &self.name)?;

        if self.domains.is_empty() {
            return Err(ValidationError::empty("domains"));
        }
        for domain in &self.domains {
            if !sni::is_valid_host(domain) {
                return Err(ValidationError::invalid("domain", domain.as_str()));
            }
        }

        for node in &self.nodes {
            if IpType::discern(&node.node_ip).is_none() {
                return Err(ValidationError::invalid("node_ip", node.node_ip.as_str()));
            }
            if node.node_port == 0 {
                return Err(ValidationError::out_of_range("node_port", 1, 65535, 0));
            }
            if !(NODE_WEIGHT_MIN..=NODE_WEIGHT_MAX).contains(&node.node_weight) {
                return Err(ValidationError::out_of_range(
                    "node_weight",
                    NODE_WEIGHT_MIN.into(),
                    NODE_WEIGHT_MAX.into(),
                    node.node_weight.into(),
                ));
            }
        }

        let t = &self.timeouts;
        for (field, value) in [
            ("connection_timeout", t.connection_timeout),
            ("read_timeout", t.read_timeout),
            ("send_timeout", t.send_timeout),
        ] {
            if value == 0 || value > TIMEOUT_MAX_MS {
                return Err(ValidationError::out_of_range(field, 1, TIMEOUT_MAX_MS.into(), value.into()));
            }
        }
        Ok(())
    }

    /// Normalised domains in input order.
    pub(crate) fn domains(&self) -> Vec<String> {
        self.domains.iter().map(|d| sni::normalize(d)).collect()
    }
}

// ---------- routes ----------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteInput {
    pub name: String,
    pub path: String,
    #[serde(default = "def_methods")]
    pub methods: Vec<Method>,
    #[serde(default = "def_true")]
    pub is_enable: bool,
    #[serde(default)]
    pub is_release: bool,
}

impl RouteInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_name("name", &self.name)?;
        let path = self.path.trim();
        if path.is_empty() {
            return Err(ValidationError::empty("path"));
        }
        if path == DEFAULT_ROUTE_PATH {
            return Err(ValidationError::DefaultRoutePath(path.to_string()));
        }
        if !path.starts_with('/') || path.chars().any(char::is_whitespace) {
            return Err(ValidationError::invalid("path", path));
        }
        if self.methods.is_empty() {
            return Err(ValidationError::empty("methods"));
        }
        Ok(())
    }

    /// `ALL` swallows every other method; duplicates are dropped.
    pub(crate) fn methods(&self) -> Vec<Method> {
        if self.methods.contains(&Method::ALL) {
            return vec![Method::ALL];
        }
        let mut methods = Vec::with_capacity(self.methods.len());
        for m in &self.methods {
            if !methods.contains(m) {
                methods.push(*m);
            }
        }
        methods
    }
}

// ---------- plugins ----------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInput {
    pub name: String,
    pub key: String,
    #[serde(rename = "type")]
    pub r#type: PluginType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "def_config")]
    pub config: Value,
    #[serde(default = "def_true")]
    pub is_enable: bool,
    #[serde(default)]
    pub is_release: bool,
}

impl PluginInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_name("name", &self.name)?;
        let key = self.key.trim();
        if key.is_empty() {
            return Err(ValidationError::empty("key"));
        }
        if !key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') {
            return Err(ValidationError::invalid("key", key));
        }
        check_config_object("config", &self.config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePluginInput {
    pub plugin_id: String,
    pub order: u8,
    #[serde(default = "def_config")]
    pub config: Value,
    #[serde(default = "def_true")]
    pub is_enable: bool,
}

impl RoutePluginInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.plugin_id.trim().is_empty() {
            return Err(ValidationError::empty("plugin_id"));
        }
        if !(ROUTE_PLUGIN_ORDER_MIN..=ROUTE_PLUGIN_ORDER_MAX).contains(&self.order) {
            return Err(ValidationError::out_of_range(
                "order",
                ROUTE_PLUGIN_ORDER_MIN.into(),
                ROUTE_PLUGIN_ORDER_MAX.into(),
                self.order.into(),
            ));
        }
        check_config_object("config", &self.config)
    }
}

// ---------- certificates ----------
/// Certificate upload. The SNI and expiry are read from the leaf certificate.
#[derive(Clone, Serialize, Deserialize)]
pub struct CertificateInput {
    pub certificate: String,
    pub private_key: String,
    #[serde(default = "def_true")]
    pub is_enable: bool,
    #[serde(default)]
    pub is_release: bool,
}

impl std::fmt::Debug for CertificateInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateInput")
            .field("is_enable", &self.is_enable)
            .field("is_release", &self.is_release)
            .finish_non_exhaustive()
    }
}

impl CertificateInput {
    /// Checks the PEM material and returns what the certificate states about itself.
    pub fn validate(&self) -> Result<CertificateFacts, ValidationError> {
        if !pem::is_certificate_pem(&self.certificate) {
            return Err(ValidationError::InvalidPem { field: "certificate" });
        }
        if !pem::is_private_key_pem(&self.private_key) {
            return Err(ValidationError::InvalidPem { field: "private_key" });
        }
        let facts = x509::discern(&self.certificate).map_err(ValidationError::InvalidCertificate)?;
        if !sni::is_valid_host(&facts.sni) {
            return Err(ValidationError::invalid("sni", facts.sni));
        }
        if facts.not_after <= Utc::now() {
            return Err(ValidationError::CertificateExpired(facts.not_after.to_rfc3339()));
        }
        Ok(facts)
    }
}
