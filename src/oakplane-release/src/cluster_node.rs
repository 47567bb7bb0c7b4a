use crate::{ControlPlane, matches_search, validator};
use chrono::Utc;
use oakplane_core::{ClusterNode, ClusterNodeWatch, IpType, NodeStatus, Page, Paged, ResourceKind, new_id};
use oakplane_errors::{ConsistencyError, ControlResult, ValidationError};
use oakplane_memory::{StoreRead, WriteBatch};
use serde_json::Value;
use tracing::{debug, info};

/// Decode a raw watch value: either the JSON object itself or a string holding it.
pub(crate) fn parse_watch(raw: Value) -> Result<ClusterNodeWatch, ValidationError> {
    let value = match raw {
        Value::String(text) => serde_json::from_str(&text)
            .map_err(|e| ValidationError::invalid("watch_value", e.to_string()))?,
        other => other,
    };
    serde_json::from_value(value).map_err(|e| ValidationError::invalid("watch_value", e.to_string()))
}

impl ControlPlane {
    /// Record a heartbeat from a gateway node, inserting it on first sight.
    pub async fn cluster_node_watch_add(&self, watch: ClusterNodeWatch) -> ControlResult<ClusterNode> {
        let node_ip = watch.node_ip.trim().to_string();
        let Some(ip_type) = IpType::discern(&node_ip) else {
            return Err(ValidationError::invalid("node_ip", node_ip).into());
        };

        let writer = self.store.writer().await;
        let node = match writer.cluster_node_by_ip(&node_ip)? {
            Some(existing) => ClusterNode {
                ip_type,
                node_status: NodeStatus::Healthy,
                is_enable: watch.is_enable,
                updated_at: Utc::now(),
                ..existing
            },
            None => {
                info!(node_ip = %node_ip, "new cluster node discovered");
                ClusterNode {
                    id: new_id(ResourceKind::ClusterNode),
                    node_ip,
                    ip_type,
                    node_status: NodeStatus::Healthy,
                    is_enable: watch.is_enable,
                    updated_at: Utc::now(),
                }
            }
        };
        writer.put(&node)?;
        debug!(id = %node.id, node_ip = %node.node_ip, enable = node.is_enable, "cluster node heartbeat");
        Ok(node)
    }

    pub async fn cluster_node_watch_add_value(&self, raw: Value) -> ControlResult<ClusterNode> {
        let watch = parse_watch(raw)?;
        self.cluster_node_watch_add(watch).await
    }

    pub async fn cluster_node_switch_enable(&self, id: &str, on: bool) -> ControlResult<ClusterNode> {
        let writer = self.store.writer().await;
        let mut node = validator::require::<ClusterNode>(&writer, id)?;
        validator::switch_changes(node.is_enable, on)?;
        node.is_enable = on;
        node.updated_at = Utc::now();
        writer.put(&node)?;
        info!(id, on, "cluster node switched");
        Ok(node)
    }

    /// Nodes must be disabled before they are forgotten.
    pub async fn cluster_node_delete(&self, id: &str) -> ControlResult<()> {
        let writer = self.store.writer().await;
        let node = validator::require::<ClusterNode>(&writer, id)?;
        if node.is_enable {
            return Err(ConsistencyError::SwitchOnProhibitsOperation {
                kind: ResourceKind::ClusterNode,
                id: id.to_string(),
            }
            .into());
        }
        let mut batch = WriteBatch::new();
        batch.delete::<ClusterNode>(id);
        writer.commit(batch)?;
        info!(id, node_ip = %node.node_ip, "cluster node deleted");
        Ok(())
    }

    /// Ordered by IP; `search` matches id or IP.
    pub fn cluster_node_list(&self, search: Option<&str>, page: Page) -> ControlResult<Paged<ClusterNode>> {
        let mut nodes = self
            .store
            .list_where(|n: &ClusterNode| matches_search(search, &[n.id.as_str(), n.node_ip.as_str()]))?;
        nodes.sort_by(|a, b| a.node_ip.cmp(&b.node_ip));
        Ok(Paged::from_vec(nodes, page))
    }
}
