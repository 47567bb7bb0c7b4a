//! Release and consistency engine of the OakPlane control plane.
//!
//! Every mutating operation follows the same path: static input checks,
//! consistency checks and the store commit inside one write section, then
//! (when a release is requested) a registry push outside of it.

pub mod inputs;
pub mod reconcile;
pub mod render;
pub mod saga;
pub mod validator;
pub mod watch;

mod certificate;
mod cluster_node;
mod plugin;
mod route;
mod service;

pub use certificate::CertificateInfo;
pub use inputs::*;
pub use route::RouteInfo;
pub use service::{ServiceInfo, ServiceSwitch};
pub use watch::{WatchWorker, spawn_watch_worker};

use oakplane_control_sync::RegistryPublisher;
use oakplane_core::{Certificate, Plugin, ResourceKind, Route, Service};
use oakplane_errors::{ControlResult, ValidationError};
use oakplane_memory::Store;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct ControlPlane {
    store: Arc<Store>,
    publisher: Arc<dyn RegistryPublisher>,
}

impl ControlPlane {
    pub fn new(store: Arc<Store>, publisher: Arc<dyn RegistryPublisher>) -> Self {
        Self { store, publisher }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn publisher(&self) -> &Arc<dyn RegistryPublisher> {
        &self.publisher
    }

    /// Release any top-level resource by kind.
    pub async fn release(&self, kind: ResourceKind, id: &str) -> ControlResult<()> {
        match kind {
            ResourceKind::Service => self.service_release(id).await,
            ResourceKind::Route => self.route_release(id).await,
            ResourceKind::Plugin => self.plugin_release(id).await,
            ResourceKind::Certificate => self.certificate_release(id).await,
            other => Err(ValidationError::invalid("kind", other.to_string()).into()),
        }
    }

    /// Current registry document of a resource, rendered from the store.
    pub fn document(&self, kind: ResourceKind, id: &str) -> ControlResult<Value> {
        let store = self.store.as_ref();
        match kind {
            ResourceKind::Service => {
                let service = validator::require::<Service>(store, id)?;
                render::service_document(store, &service)
            }
            ResourceKind::Route => {
                let route = validator::require::<Route>(store, id)?;
                render::route_document(store, &route)
            }
            ResourceKind::Plugin => Ok(render::plugin_document(&validator::require::<Plugin>(store, id)?)),
            ResourceKind::Certificate => {
                Ok(render::certificate_document(&validator::require::<Certificate>(store, id)?))
            }
            other => Err(ValidationError::invalid("kind", other.to_string()).into()),
        }
    }
}

/// Case-insensitive substring match of `search` against any field; an absent
/// or blank search matches everything.
pub(crate) fn matches_search(search: Option<&str>, fields: &[&str]) -> bool {
    match search.map(str::trim).filter(|s| !s.is_empty()) {
        None => true,
        Some(needle) => {
            let needle = needle.to_lowercase();
            fields.iter().any(|f| f.to_lowercase().contains(&needle))
        }
    }
}
