use crate::inputs::PluginInput;
use crate::saga::{DeleteSaga, RegistryEntry, ReleaseSaga};
use crate::{ControlPlane, matches_search, render, validator};
use chrono::Utc;
use oakplane_core::{Page, Paged, Plugin, Releasable, ReleaseStatus, ResourceKind, new_id};
use oakplane_errors::{ConsistencyError, ControlResult};
use oakplane_memory::{StoreRead, StoreWriter, WriteBatch};
use tracing::info;

/// Plugin keys name data-plane handlers and must be unique.
fn key_unique(writer: &StoreWriter<'_>, key: &str, exclude_id: Option<&str>) -> ControlResult<()> {
    let taken = writer
        .list_where(|p: &Plugin| p.key == key && Some(p.id.as_str()) != exclude_id)?;
    if !taken.is_empty() {
        return Err(ConsistencyError::ResourceExists {
            kind: ResourceKind::Plugin,
            values: vec![key.to_string()],
        }
        .into());
    }
    Ok(())
}

impl ControlPlane {
    pub async fn plugin_create(&self, input: PluginInput) -> ControlResult<Plugin> {
        input.validate()?;
        let now = Utc::now();
        let plugin = Plugin {
            id: new_id(ResourceKind::Plugin),
            name: input.name.trim().to_string(),
            key: input.key.trim().to_string(),
            r#type: input.r#type,
            description: input.description,
            config: input.config,
            is_enable: input.is_enable,
            release_status: ReleaseStatus::Unpublished,
            created_at: now,
            updated_at: now,
        };

        {
            let writer = self.store.writer().await;
            key_unique(&writer, &plugin.key, None)?;
            writer.put(&plugin)?;
        }
        info!(id = %plugin.id, key = %plugin.key, plugin_type = plugin.r#type.display_name(), "plugin created");

        if input.is_release {
            ReleaseSaga::<Plugin>::new(self, &plugin.id, ReleaseStatus::Unpublished)
                .run(render::plugin_document(&plugin))
                .await?;
        }
        validator::require(self.store.as_ref(), &plugin.id)
    }

    pub async fn plugin_update(&self, id: &str, input: PluginInput) -> ControlResult<Plugin> {
        input.validate()?;
        let plugin = {
            let writer = self.store.writer().await;
            let prior = validator::require::<Plugin>(&writer, id)?;
            let key = input.key.trim().to_string();
            key_unique(&writer, &key, Some(id))?;

            let plugin = Plugin {
                name: input.name.trim().to_string(),
                key,
                r#type: input.r#type,
                description: input.description,
                config: input.config,
                is_enable: input.is_enable,
                release_status: prior.release_status.after_edit(),
                updated_at: Utc::now(),
                ..prior
            };
            writer.put(&plugin)?;
            plugin
        };
        info!(id, status = %plugin.release_status, "plugin updated");

        if input.is_release {
            ReleaseSaga::<Plugin>::new(self, id, plugin.release_status)
                .run(render::plugin_document(&plugin))
                .await?;
        }
        validator::require(self.store.as_ref(), id)
    }

    /// Only plugins no route binds may be deleted.
    pub async fn plugin_delete(&self, id: &str) -> ControlResult<()> {
        let mut saga = DeleteSaga::new(self, ResourceKind::Plugin, id);
        {
            let writer = self.store.writer().await;
            let plugin = validator::require::<Plugin>(&writer, id)?;
            validator::releasable_deletable(&plugin)?;
            validator::plugin_unbound(&writer, id)?;
            if plugin.release_status.in_registry() {
                saga = saga.with_entry(RegistryEntry {
                    kind: ResourceKind::Plugin,
                    id: id.to_string(),
                    restore: render::plugin_document(&plugin),
                });
            }
        }

        saga.run(|writer| {
            let plugin = validator::require::<Plugin>(writer, id)?;
            validator::releasable_deletable(&plugin)?;
            validator::plugin_unbound(writer, id)?;
            let mut batch = WriteBatch::new();
            batch.delete::<Plugin>(id);
            Ok(batch)
        })
        .await
    }

    pub async fn plugin_release(&self, id: &str) -> ControlResult<()> {
        let plugin = validator::require::<Plugin>(self.store.as_ref(), id)?;
        validator::not_yet_published(&plugin)?;
        ReleaseSaga::<Plugin>::new(self, id, plugin.release_status)
            .run(render::plugin_document(&plugin))
            .await
    }

    pub async fn plugin_switch_enable(&self, id: &str, on: bool) -> ControlResult<Plugin> {
        let writer = self.store.writer().await;
        let mut plugin = validator::require::<Plugin>(&writer, id)?;
        validator::switch_changes(plugin.is_enable, on)?;
        plugin.is_enable = on;
        let status = plugin.release_status.after_edit();
        plugin.set_release_status(status);
        writer.put(&plugin)?;
        info!(id, on, status = %status, "plugin switched");
        Ok(plugin)
    }

    pub fn plugin_info(&self, id: &str) -> ControlResult<Plugin> {
        validator::require(self.store.as_ref(), id)
    }

    /// Newest first; `search` matches id, name or key.
    pub fn plugin_list(&self, search: Option<&str>, page: Page) -> ControlResult<Paged<Plugin>> {
        let mut plugins = self
            .store
            .list_where(|p: &Plugin| matches_search(search, &[p.id.as_str(), p.name.as_str(), p.key.as_str()]))?;
        plugins.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
        Ok(Paged::from_vec(plugins, page))
    }
}
