//! Error taxonomy for control-plane operations.
//!
//! Every user-facing operation returns [`ControlError`], which tells the caller
//! which stage rejected the request:
//!
//! - [`ValidationError`]: the input violates a static constraint; fix the input.
//! - [`ConsistencyError`]: the input conflicts with current store state.
//! - [`StoreError`]: the transactional write failed; nothing was persisted.
//! - [`ControlError::Publish`]: the change is saved but the registry push failed; retryable.

use oakplane_core::ResourceKind;
use serde::Serialize;

/// Caller-visible status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    ParamsInvalid,
    ResourceNull,
    ResourceExists,
    SwitchNoChange,
    SwitchOnProhibitsOperation,
    ToReleaseProhibitsOperation,
    SwitchAlreadyPublished,
    DomainCertificateMissing,
    CertificateDomainExist,
    DependencyExists,
    DefaultRouteProtected,
    StoreFailure,
    PublishFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange { field: &'static str, min: i64, max: i64, value: i64 },

    #[error("invalid {field}: {value}")]
    Invalid { field: &'static str, value: String },

    #[error("duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },

    #[error("the default route path {0} is reserved")]
    DefaultRoutePath(String),

    #[error("{field} does not contain valid PEM data")]
    InvalidPem { field: &'static str },

    #[error("certificate cannot be read: {0}")]
    InvalidCertificate(String),

    #[error("certificate already expired at {0}")]
    CertificateExpired(String),
}

impl ValidationError {
    pub fn empty(field: &'static str) -> Self {
        Self::Empty { field }
    }

    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::Invalid { field, value: value.into() }
    }

    pub fn out_of_range(field: &'static str, min: i64, max: i64, value: i64) -> Self {
        Self::OutOfRange { field, min, max, value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsistencyError {
    #[error("{kind} {id} does not exist")]
    ResourceNull { kind: ResourceKind, id: String },

    #[error("{kind} already exists: {}", values.join(","))]
    ResourceExists { kind: ResourceKind, values: Vec<String> },

    #[error("switch state has not changed")]
    SwitchNoChange,

    #[error("{kind} {id} is published and enabled; disable it first")]
    SwitchOnProhibitsOperation { kind: ResourceKind, id: String },

    #[error("{kind} {id} has unreleased changes; release them first")]
    ToReleaseProhibitsOperation { kind: ResourceKind, id: String },

    #[error("{kind} {id} is already published")]
    SwitchAlreadyPublished { kind: ResourceKind, id: String },

    #[error("no certificate covers domains: {}", domains.join(","))]
    DomainCertificateMissing { domains: Vec<String> },

    #[error("domains already covered by another certificate: {}", domains.join(","))]
    CertificateDomainExist { domains: Vec<String> },

    #[error("{kind} is still referenced by {dependent}: {}", ids.join(","))]
    DependencyExists { kind: ResourceKind, dependent: ResourceKind, ids: Vec<String> },

    #[error("route {0} is the default route of its service")]
    DefaultRouteProtected(String),
}

impl ConsistencyError {
    pub fn null(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::ResourceNull { kind, id: id.into() }
    }

    pub fn code(&self) -> Code {
        match self {
            ConsistencyError::ResourceNull { .. } => Code::ResourceNull,
            ConsistencyError::ResourceExists { .. } => Code::ResourceExists,
            ConsistencyError::SwitchNoChange => Code::SwitchNoChange,
            ConsistencyError::SwitchOnProhibitsOperation { .. } => Code::SwitchOnProhibitsOperation,
            ConsistencyError::ToReleaseProhibitsOperation { .. } => Code::ToReleaseProhibitsOperation,
            ConsistencyError::SwitchAlreadyPublished { .. } => Code::SwitchAlreadyPublished,
            ConsistencyError::DomainCertificateMissing { .. } => Code::DomainCertificateMissing,
            ConsistencyError::CertificateDomainExist { .. } => Code::CertificateDomainExist,
            ConsistencyError::DependencyExists { .. } => Code::DependencyExists,
            ConsistencyError::DefaultRouteProtected(_) => Code::DefaultRouteProtected,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage engine error: {0}")]
    Engine(String),

    #[error("failed to encode {table} record: {message}")]
    Encode { table: String, message: String },

    #[error("failed to decode {table} record: {message}")]
    Decode { table: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn engine(message: impl std::fmt::Display) -> Self {
        Self::Engine(message.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("registry unreachable: {0}")]
    Transport(String),

    #[error("registry rejected {kind} {id} with status {status}: {body}")]
    Rejected { kind: ResourceKind, id: String, status: u16, body: String },

    #[error("failed to encode registry document: {0}")]
    Encode(String),

    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The data change is committed; only the release did not happen.
    #[error("{kind} {id} saved but not published: {source}")]
    Publish {
        kind: ResourceKind,
        id: String,
        #[source]
        source: PublishError,
    },
}

impl ControlError {
    pub fn publish(kind: ResourceKind, id: impl Into<String>, source: PublishError) -> Self {
        Self::Publish { kind, id: id.into(), source }
    }

    pub fn code(&self) -> Code {
        match self {
            ControlError::Validation(_) => Code::ParamsInvalid,
            ControlError::Consistency(e) => e.code(),
            ControlError::Store(_) => Code::StoreFailure,
            ControlError::Publish { .. } => Code::PublishFailure,
        }
    }

    /// Only publish failures are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ControlError::Publish { .. })
    }

    pub fn consistency(&self) -> Option<&ConsistencyError> {
        match self {
            ControlError::Consistency(e) => Some(e),
            _ => None,
        }
    }
}

pub type ControlResult<T> = Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_list_offending_values() {
        let e = ConsistencyError::ResourceExists {
            kind: ResourceKind::ServiceDomain,
            values: vec!["a.example.com".into(), "b.example.com".into()],
        };
        assert_eq!(e.to_string(), "service_domain already exists: a.example.com,b.example.com");
        assert_eq!(e.code(), Code::ResourceExists);
    }

    #[test]
    fn only_publish_failures_are_retryable() {
        let publish = ControlError::publish(
            ResourceKind::Service,
            "svc_1",
            PublishError::Transport("connection refused".into()),
        );
        assert!(publish.is_retryable());
        assert_eq!(publish.code(), Code::PublishFailure);

        let consistency: ControlError = ConsistencyError::SwitchNoChange.into();
        assert!(!consistency.is_retryable());
        assert_eq!(consistency.code(), Code::SwitchNoChange);
    }
}
