use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle tag tracking whether the last edit of a resource reached the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStatus {
    /// Never pushed.
    #[default]
    Unpublished,
    /// Edited after a publish, not yet re-pushed.
    PendingPublish,
    /// Last push succeeded.
    Published,
}

impl ReleaseStatus {
    pub fn is_published(&self) -> bool {
        *self == ReleaseStatus::Published
    }

    /// Status a resource takes when edited without being released.
    pub fn after_edit(self) -> ReleaseStatus {
        match self {
            ReleaseStatus::Unpublished => ReleaseStatus::Unpublished,
            ReleaseStatus::PendingPublish | ReleaseStatus::Published => ReleaseStatus::PendingPublish,
        }
    }

    /// Whether the registry may currently hold a document for the resource.
    pub fn in_registry(&self) -> bool {
        *self != ReleaseStatus::Unpublished
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReleaseStatus::Unpublished => "unpublished",
            ReleaseStatus::PendingPublish => "pending_publish",
            ReleaseStatus::Published => "published",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Service,
    ServiceDomain,
    ServiceNode,
    Route,
    RoutePlugin,
    Plugin,
    Certificate,
    ClusterNode,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::Service,
        ResourceKind::ServiceDomain,
        ResourceKind::ServiceNode,
        ResourceKind::Route,
        ResourceKind::RoutePlugin,
        ResourceKind::Plugin,
        ResourceKind::Certificate,
        ResourceKind::ClusterNode,
    ];

    pub fn id_prefix(&self) -> &'static str {
        match self {
            ResourceKind::Service => "svc",
            ResourceKind::ServiceDomain => "sdm",
            ResourceKind::ServiceNode => "snd",
            ResourceKind::Route => "rt",
            ResourceKind::RoutePlugin => "rpu",
            ResourceKind::Plugin => "plu",
            ResourceKind::Certificate => "cer",
            ResourceKind::ClusterNode => "cnd",
        }
    }

    /// Name of the store table holding rows of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            ResourceKind::Service => "services",
            ResourceKind::ServiceDomain => "service_domains",
            ResourceKind::ServiceNode => "service_nodes",
            ResourceKind::Route => "routes",
            ResourceKind::RoutePlugin => "route_plugins",
            ResourceKind::Plugin => "plugins",
            ResourceKind::Certificate => "certificates",
            ResourceKind::ClusterNode => "cluster_nodes",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Service => "service",
            ResourceKind::ServiceDomain => "service_domain",
            ResourceKind::ServiceNode => "service_node",
            ResourceKind::Route => "route",
            ResourceKind::RoutePlugin => "route_plugin",
            ResourceKind::Plugin => "plugin",
            ResourceKind::Certificate => "certificate",
            ResourceKind::ClusterNode => "cluster_node",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.to_string() == s || k.id_prefix() == s)
            .ok_or_else(|| format!("unknown resource kind `{s}`"))
    }
}

/// A stored row addressable by id.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    const KIND: ResourceKind;

    fn id(&self) -> &str;
}

/// Top-level resources that go through the release lifecycle.
pub trait Releasable: Record {
    fn is_enable(&self) -> bool;
    fn release_status(&self) -> ReleaseStatus;
    fn set_release_status(&mut self, status: ReleaseStatus);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_moves_released_resources_to_pending() {
        assert_eq!(ReleaseStatus::Unpublished.after_edit(), ReleaseStatus::Unpublished);
        assert_eq!(ReleaseStatus::Published.after_edit(), ReleaseStatus::PendingPublish);
        assert_eq!(ReleaseStatus::PendingPublish.after_edit(), ReleaseStatus::PendingPublish);
    }

    #[test]
    fn kind_parses_from_name_or_prefix() {
        assert_eq!("service".parse::<ResourceKind>(), Ok(ResourceKind::Service));
        assert_eq!("cer".parse::<ResourceKind>(), Ok(ResourceKind::Certificate));
        assert!("gateway".parse::<ResourceKind>().is_err());
    }
}
