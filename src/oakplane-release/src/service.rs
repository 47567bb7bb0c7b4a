use crate::inputs::ServiceInput;
use crate::reconcile::reconcile;
use crate::saga::{DeleteSaga, RegistryEntry, ReleaseSaga};
use crate::{ControlPlane, matches_search, render, validator};
use chrono::Utc;
use oakplane_core::{
    DEFAULT_ROUTE_PATH, Method, Page, Paged, ReleaseStatus, ResourceKind, Route, RoutePlugin,
    Service, ServiceDomain, ServiceNode, new_id,
};
use oakplane_errors::{ConsistencyError, ControlResult};
use oakplane_memory::{StoreRead, WriteBatch};
use serde::Serialize;
use tracing::info;

const DEFAULT_ROUTE_NAME: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceSwitch {
    Enable,
    WebSocket,
    HealthCheck,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    #[serde(flatten)]
    pub service: Service,
    pub domains: Vec<String>,
    pub nodes: Vec<ServiceNode>,
}

fn service_info(store: &impl StoreRead, service: Service) -> ControlResult<ServiceInfo> {
    let domains = store.domains_of(&service.id)?.into_iter().map(|d: ServiceDomain| d.domain).collect();
    let nodes = store.nodes_of(&service.id)?;
    Ok(ServiceInfo { service, domains, nodes })
}

impl ControlPlane {
    /// Create a service with its domains, nodes and default route.
    pub async fn service_create(&self, input: ServiceInput) -> ControlResult<Service> {
        input.validate()?;
        let domains = input.domains();
        let now = Utc::now();
        let service = Service {
            id: new_id(ResourceKind::Service),
            name: input.name.trim().to_string(),
            protocol: input.protocol,
            health_check: input.health_check,
            web_socket: input.web_socket,
            is_enable: input.is_enable,
            release_status: ReleaseStatus::Unpublished,
            load_balance: input.load_balance,
            timeouts: input.timeouts,
            created_at: now,
            updated_at: now,
        };
        let default_route = Route {
            id: new_id(ResourceKind::Route),
            service_id: service.id.clone(),
            name: DEFAULT_ROUTE_NAME.to_string(),
            path: DEFAULT_ROUTE_PATH.to_string(),
            methods: vec![Method::ALL],
            is_enable: true,
            release_status: ReleaseStatus::Unpublished,
            created_at: now,
            updated_at: now,
        };

        let document = {
            let writer = self.store.writer().await;
            validator::domains_already_used(&writer, &domains, &[])?;
            if input.is_release {
                validator::https_domains_have_certificate(&writer, input.protocol, &domains)?;
            }

            let mut batch = WriteBatch::new();
            batch.put(&service)?;
            reconcile(&service.id, Vec::new(), &domains).stage(&mut batch)?;
            reconcile(&service.id, Vec::new(), &input.nodes).stage(&mut batch)?;
            batch.put(&default_route)?;
            writer.commit(batch)?;
            info!(id = %service.id, name = %service.name, domains = domains.len(), "service created");

            if input.is_release {
                Some(render::service_document(&writer, &service)?)
            } else {
                None
            }
        };

        if let Some(document) = document {
            ReleaseSaga::<Service>::new(self, &service.id, ReleaseStatus::Unpublished)
                .run(document)
                .await?;
        }
        validator::require(self.store.as_ref(), &service.id)
    }

    /// Replace attributes and reconcile domains and nodes against the request.
    pub async fn service_update(&self, id: &str, input: ServiceInput) -> ControlResult<Service> {
        input.validate()?;
        let domains = input.domains();

        let (document, fallback) = {
            let writer = self.store.writer().await;
            let prior = validator::require::<Service>(&writer, id)?;
            validator::domains_already_used(&writer, &domains, &[id])?;
            if input.is_release {
                validator::https_domains_have_certificate(&writer, input.protocol, &domains)?;
            }

            let status = prior.release_status.after_edit();
            let service = Service {
                id: prior.id.clone(),
                name: input.name.trim().to_string(),
                protocol: input.protocol,
                health_check: input.health_check,
                web_socket: input.web_socket,
                is_enable: input.is_enable,
                release_status: status,
                load_balance: input.load_balance,
                timeouts: input.timeouts,
                created_at: prior.created_at,
                updated_at: Utc::now(),
            };

            let domain_diff = reconcile(id, writer.domains_of(id)?, &domains);
            let node_diff = reconcile(id, writer.nodes_of(id)?, &input.nodes);
            let mut batch = WriteBatch::new();
            batch.put(&service)?;
            domain_diff.stage(&mut batch)?;
            node_diff.stage(&mut batch)?;
            writer.commit(batch)?;
            info!(
                id,
                status = %status,
                domains_added = domain_diff.to_add.len(),
                domains_removed = domain_diff.to_delete.len(),
                nodes_added = node_diff.to_add.len(),
                nodes_updated = node_diff.to_update.len(),
                nodes_removed = node_diff.to_delete.len(),
                "service updated"
            );

            let document = match input.is_release {
                true => Some(render::service_document(&writer, &service)?),
                false => None,
            };
            (document, status)
        };

        if let Some(document) = document {
            ReleaseSaga::<Service>::new(self, id, fallback).run(document).await?;
        }
        validator::require(self.store.as_ref(), id)
    }

    /// Delete a service together with its domains, nodes and routes.
    pub async fn service_delete(&self, id: &str) -> ControlResult<()> {
        let mut saga = DeleteSaga::new(self, ResourceKind::Service, id);
        {
            let writer = self.store.writer().await;
            let service = validator::require::<Service>(&writer, id)?;
            validator::releasable_deletable(&service)?;
            let routes = writer.routes_of(id)?;
            check_routes_removable(&routes)?;

            for route in routes.iter().filter(|r| r.is_default() && r.release_status.in_registry()) {
                saga = saga.with_entry(RegistryEntry {
                    kind: ResourceKind::Route,
                    id: route.id.clone(),
                    restore: render::route_document(&writer, route)?,
                });
            }
            if service.release_status.in_registry() {
                saga = saga.with_entry(RegistryEntry {
                    kind: ResourceKind::Service,
                    id: id.to_string(),
                    restore: render::service_document(&writer, &service)?,
                });
            }
        }

        saga.run(|writer| {
            let service = validator::require::<Service>(writer, id)?;
            validator::releasable_deletable(&service)?;
            let routes = writer.routes_of(id)?;
            check_routes_removable(&routes)?;

            let mut batch = WriteBatch::new();
            for route in &routes {
                for binding in writer.route_plugins_of_route(&route.id)? {
                    batch.delete::<RoutePlugin>(&binding.id);
                }
                batch.delete::<Route>(&route.id);
            }
            for domain in writer.domains_of(id)? {
                batch.delete::<ServiceDomain>(&domain.id);
            }
            for node in writer.nodes_of(id)? {
                batch.delete::<ServiceNode>(&node.id);
            }
            batch.delete::<Service>(id);
            Ok(batch)
        })
        .await
    }

    /// Push the current service configuration to the registry.
    pub async fn service_release(&self, id: &str) -> ControlResult<()> {
        let (document, fallback) = {
            let writer = self.store.writer().await;
            let service = validator::require::<Service>(&writer, id)?;
            validator::not_yet_published(&service)?;
            let domains: Vec<String> = writer.domains_of(id)?.into_iter().map(|d| d.domain).collect();
            validator::https_domains_have_certificate(&writer, service.protocol, &domains)?;
            (render::service_document(&writer, &service)?, service.release_status)
        };
        ReleaseSaga::<Service>::new(self, id, fallback).run(document).await
    }

    pub async fn service_switch(&self, id: &str, switch: ServiceSwitch, on: bool) -> ControlResult<Service> {
        let writer = self.store.writer().await;
        let mut service = validator::require::<Service>(&writer, id)?;
        let flag = match switch {
            ServiceSwitch::Enable => &mut service.is_enable,
            ServiceSwitch::WebSocket => &mut service.web_socket,
            ServiceSwitch::HealthCheck => &mut service.health_check,
        };
        validator::switch_changes(*flag, on)?;
        *flag = on;
        service.release_status = service.release_status.after_edit();
        service.updated_at = Utc::now();
        writer.put(&service)?;
        info!(id, ?switch, on, status = %service.release_status, "service switched");
        Ok(service)
    }

    pub fn service_info(&self, id: &str) -> ControlResult<ServiceInfo> {
        let store = self.store.as_ref();
        service_info(store, validator::require::<Service>(store, id)?)
    }

    /// Newest first; `search` matches id, name or any domain.
    pub fn service_list(&self, search: Option<&str>, page: Page) -> ControlResult<Paged<ServiceInfo>> {
        let store = self.store.as_ref();
        let mut services = store.list::<Service>()?;
        services.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));

        let mut infos = Vec::with_capacity(services.len());
        for service in services {
            let info = service_info(store, service)?;
            let mut fields = vec![info.service.id.as_str(), info.service.name.as_str()];
            fields.extend(info.domains.iter().map(String::as_str));
            if matches_search(search, &fields) {
                infos.push(info);
            }
        }
        Ok(Paged::from_vec(infos, page))
    }
}

/// Routes other than the default one must be withdrawn before the service goes.
fn check_routes_removable(routes: &[Route]) -> Result<(), ConsistencyError> {
    let live: Vec<String> = routes
        .iter()
        .filter(|r| !r.is_default() && r.release_status.in_registry())
        .map(|r| r.id.clone())
        .collect();
    if !live.is_empty() {
        return Err(ConsistencyError::DependencyExists {
            kind: ResourceKind::Service,
            dependent: ResourceKind::Route,
            ids: live,
        });
    }
    Ok(())
}
