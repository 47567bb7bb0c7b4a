use crate::inputs::{RouteInput, RoutePluginInput};
use crate::saga::{DeleteSaga, RegistryEntry, ReleaseSaga};
use crate::{ControlPlane, matches_search, render, validator};
use chrono::Utc;
use oakplane_core::{
    Page, Paged, Plugin, Releasable, ReleaseStatus, ResourceKind, Route, RoutePlugin, Service,
    new_id,
};
use oakplane_errors::{ConsistencyError, ControlResult};
use oakplane_memory::{StoreRead, StoreWriter, WriteBatch};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct RouteInfo {
    #[serde(flatten)]
    pub route: Route,
    pub plugins: Vec<RoutePlugin>,
}

fn editable(route: &Route) -> Result<(), ConsistencyError> {
    if route.is_default() {
        return Err(ConsistencyError::DefaultRouteProtected(route.id.clone()));
    }
    Ok(())
}

/// Binding changes alter the route document, so a released route becomes pending.
fn touch_route(writer: &StoreWriter<'_>, route_id: &str, batch: &mut WriteBatch) -> ControlResult<Route> {
    let mut route = validator::require::<Route>(writer, route_id)?;
    let status = route.release_status.after_edit();
    route.set_release_status(status);
    batch.put(&route)?;
    Ok(route)
}

fn binding_unique(
    writer: &StoreWriter<'_>,
    route_id: &str,
    plugin_id: &str,
    exclude_id: Option<&str>,
) -> ControlResult<()> {
    let taken = writer
        .route_plugins_of_route(route_id)?
        .into_iter()
        .any(|b| b.plugin_id == plugin_id && Some(b.id.as_str()) != exclude_id);
    if taken {
        return Err(ConsistencyError::ResourceExists {
            kind: ResourceKind::RoutePlugin,
            values: vec![plugin_id.to_string()],
        }
        .into());
    }
    Ok(())
}

impl ControlPlane {
    pub async fn route_create(&self, service_id: &str, input: RouteInput) -> ControlResult<Route> {
        input.validate()?;
        let now = Utc::now();
        let route = Route {
            id: new_id(ResourceKind::Route),
            service_id: service_id.to_string(),
            name: input.name.trim().to_string(),
            path: input.path.trim().to_string(),
            methods: input.methods(),
            is_enable: input.is_enable,
            release_status: ReleaseStatus::Unpublished,
            created_at: now,
            updated_at: now,
        };

        let document = {
            let writer = self.store.writer().await;
            validator::require::<Service>(&writer, service_id)?;
            validator::route_path_unique(&writer, service_id, &route.path, None)?;
            writer.put(&route)?;
            info!(id = %route.id, service_id, path = %route.path, "route created");
            match input.is_release {
                true => Some(render::route_document(&writer, &route)?),
                false => None,
            }
        };

        if let Some(document) = document {
            ReleaseSaga::<Route>::new(self, &route.id, ReleaseStatus::Unpublished)
                .run(document)
                .await?;
        }
        validator::require(self.store.as_ref(), &route.id)
    }

    pub async fn route_update(&self, id: &str, input: RouteInput) -> ControlResult<Route> {
        input.validate()?;
        let (document, fallback) = {
            let writer = self.store.writer().await;
            let prior = validator::require::<Route>(&writer, id)?;
            editable(&prior)?;
            let path = input.path.trim().to_string();
            validator::route_path_unique(&writer, &prior.service_id, &path, Some(id))?;

            let status = prior.release_status.after_edit();
            let route = Route {
                name: input.name.trim().to_string(),
                path,
                methods: input.methods(),
                is_enable: input.is_enable,
                release_status: status,
                updated_at: Utc::now(),
                ..prior
            };
            writer.put(&route)?;
            info!(id, path = %route.path, status = %status, "route updated");
            let document = match input.is_release {
                true => Some(render::route_document(&writer, &route)?),
                false => None,
            };
            (document, status)
        };

        if let Some(document) = document {
            ReleaseSaga::<Route>::new(self, id, fallback).run(document).await?;
        }
        validator::require(self.store.as_ref(), id)
    }

    pub async fn route_delete(&self, id: &str) -> ControlResult<()> {
        let mut saga = DeleteSaga::new(self, ResourceKind::Route, id);
        {
            let writer = self.store.writer().await;
            let route = validator::require::<Route>(&writer, id)?;
            editable(&route)?;
            validator::releasable_deletable(&route)?;
            if route.release_status.in_registry() {
                saga = saga.with_entry(RegistryEntry {
                    kind: ResourceKind::Route,
                    id: id.to_string(),
                    restore: render::route_document(&writer, &route)?,
                });
            }
        }

        saga.run(|writer| {
            let route = validator::require::<Route>(writer, id)?;
            validator::releasable_deletable(&route)?;
            let mut batch = WriteBatch::new();
            for binding in writer.route_plugins_of_route(id)? {
                batch.delete::<RoutePlugin>(&binding.id);
            }
            batch.delete::<Route>(id);
            Ok(batch)
        })
        .await
    }

    pub async fn route_release(&self, id: &str) -> ControlResult<()> {
        let (document, fallback) = {
            let writer = self.store.writer().await;
            let route = validator::require::<Route>(&writer, id)?;
            validator::not_yet_published(&route)?;
            (render::route_document(&writer, &route)?, route.release_status)
        };
        ReleaseSaga::<Route>::new(self, id, fallback).run(document).await
    }

    pub async fn route_switch_enable(&self, id: &str, on: bool) -> ControlResult<Route> {
        let writer = self.store.writer().await;
        let mut route = validator::require::<Route>(&writer, id)?;
        editable(&route)?;
        validator::switch_changes(route.is_enable, on)?;
        route.is_enable = on;
        let status = route.release_status.after_edit();
        route.set_release_status(status);
        writer.put(&route)?;
        info!(id, on, status = %status, "route switched");
        Ok(route)
    }

    pub fn route_info(&self, id: &str) -> ControlResult<RouteInfo> {
        let store = self.store.as_ref();
        let route = validator::require::<Route>(store, id)?;
        let plugins = store.route_plugins_of_route(id)?;
        Ok(RouteInfo { route, plugins })
    }

    /// Routes of a service, oldest first; `search` matches id, name or path.
    pub fn route_list(&self, service_id: &str, search: Option<&str>, page: Page) -> ControlResult<Paged<Route>> {
        let store = self.store.as_ref();
        validator::require::<Service>(store, service_id)?;
        let routes = store
            .routes_of(service_id)?
            .into_iter()
            .filter(|r| matches_search(search, &[r.id.as_str(), r.name.as_str(), r.path.as_str()]))
            .collect();
        Ok(Paged::from_vec(routes, page))
    }

    // ---------- route plugins ----------

    /// Attach a plugin to a route. A route binds each plugin at most once.
    pub async fn route_plugin_bind(&self, route_id: &str, input: RoutePluginInput) -> ControlResult<RoutePlugin> {
        input.validate()?;
        let writer = self.store.writer().await;
        validator::require::<Plugin>(&writer, &input.plugin_id)?;
        binding_unique(&writer, route_id, &input.plugin_id, None)?;

        let mut batch = WriteBatch::new();
        let route = touch_route(&writer, route_id, &mut batch)?;
        let binding = RoutePlugin {
            id: new_id(ResourceKind::RoutePlugin),
            route_id: route.id.clone(),
            plugin_id: input.plugin_id,
            order: input.order,
            config: input.config,
            is_enable: input.is_enable,
        };
        batch.put(&binding)?;
        writer.commit(batch)?;
        info!(id = %binding.id, route_id, plugin_id = %binding.plugin_id, order = binding.order, "plugin bound to route");
        Ok(binding)
    }

    pub async fn route_plugin_update(&self, id: &str, input: RoutePluginInput) -> ControlResult<RoutePlugin> {
        input.validate()?;
        let writer = self.store.writer().await;
        let prior = validator::require::<RoutePlugin>(&writer, id)?;
        if prior.plugin_id != input.plugin_id {
            validator::require::<Plugin>(&writer, &input.plugin_id)?;
            binding_unique(&writer, &prior.route_id, &input.plugin_id, Some(id))?;
        }

        let mut batch = WriteBatch::new();
        touch_route(&writer, &prior.route_id, &mut batch)?;
        let binding = RoutePlugin {
            plugin_id: input.plugin_id,
            order: input.order,
            config: input.config,
            is_enable: input.is_enable,
            ..prior
        };
        batch.put(&binding)?;
        writer.commit(batch)?;
        info!(id, route_id = %binding.route_id, "route plugin updated");
        Ok(binding)
    }

    pub async fn route_plugin_unbind(&self, id: &str) -> ControlResult<()> {
        let writer = self.store.writer().await;
        let binding = validator::require::<RoutePlugin>(&writer, id)?;
        let mut batch = WriteBatch::new();
        touch_route(&writer, &binding.route_id, &mut batch)?;
        batch.delete::<RoutePlugin>(id);
        writer.commit(batch)?;
        info!(id, route_id = %binding.route_id, plugin_id = %binding.plugin_id, "plugin unbound from route");
        Ok(())
    }
}
