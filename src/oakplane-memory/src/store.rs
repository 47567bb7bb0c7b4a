use crate::batch::WriteBatch;
use crate::engine::Memory;
use oakplane_core::{
    Certificate, ClusterNode, Plugin, Record, Route, RoutePlugin, Service, ServiceDomain,
    ServiceNode,
};
use oakplane_errors::StoreError;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Typed read access shared by the store and an open writer.
///
/// Validators take `&impl StoreRead` so that checks run against whatever view
/// the caller holds: a plain snapshot for reads, the writer for mutations.
pub trait StoreRead {
    fn memory(&self) -> &Memory;

    fn get<R: Record>(&self, id: &str) -> Result<Option<R>, StoreError> {
        self.memory().get(R::KIND.table(), id)
    }

    fn list<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        self.memory().all(R::KIND.table())
    }

    fn list_where<R, F>(&self, pred: F) -> Result<Vec<R>, StoreError>
    where
        R: Record,
        F: FnMut(&R) -> bool,
    {
        self.memory().filter(R::KIND.table(), pred)
    }

    fn service(&self, id: &str) -> Result<Option<Service>, StoreError> {
        self.get(id)
    }

    /// Domains of one service, ordered by name.
    fn domains_of(&self, service_id: &str) -> Result<Vec<ServiceDomain>, StoreError> {
        let mut domains = self.list_where(|d: &ServiceDomain| d.service_id == service_id)?;
        domains.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(domains)
    }

    fn all_domains(&self) -> Result<Vec<ServiceDomain>, StoreError> {
        self.list()
    }

    /// Upstream nodes of one service, ordered by address.
    fn nodes_of(&self, service_id: &str) -> Result<Vec<ServiceNode>, StoreError> {
        let mut nodes = self.list_where(|n: &ServiceNode| n.service_id == service_id)?;
        nodes.sort_by(|a, b| (&a.node_ip, a.node_port).cmp(&(&b.node_ip, b.node_port)));
        Ok(nodes)
    }

    fn route(&self, id: &str) -> Result<Option<Route>, StoreError> {
        self.get(id)
    }

    /// Routes of one service, oldest first.
    fn routes_of(&self, service_id: &str) -> Result<Vec<Route>, StoreError> {
        let mut routes = self.list_where(|r: &Route| r.service_id == service_id)?;
        routes.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(routes)
    }

    fn plugin(&self, id: &str) -> Result<Option<Plugin>, StoreError> {
        self.get(id)
    }

    /// Plugin bindings of one route in execution order.
    fn route_plugins_of_route(&self, route_id: &str) -> Result<Vec<RoutePlugin>, StoreError> {
        let mut bindings = self.list_where(|b: &RoutePlugin| b.route_id == route_id)?;
        bindings.sort_by(|a, b| (a.order, &a.id).cmp(&(b.order, &b.id)));
        Ok(bindings)
    }

    fn route_plugins_of_plugin(&self, plugin_id: &str) -> Result<Vec<RoutePlugin>, StoreError> {
        self.list_where(|b: &RoutePlugin| b.plugin_id == plugin_id)
    }

    fn certificate(&self, id: &str) -> Result<Option<Certificate>, StoreError> {
        self.get(id)
    }

    fn certificates(&self) -> Result<Vec<Certificate>, StoreError> {
        self.list()
    }

    fn cluster_node_by_ip(&self, node_ip: &str) -> Result<Option<ClusterNode>, StoreError> {
        Ok(self
            .list_where(|n: &ClusterNode| n.node_ip == node_ip)?
            .into_iter()
            .next())
    }
}

/// Resource store. Mutations go through [`Store::writer`], which serializes
/// writers so that validation and commit observe the same state.
pub struct Store {
    memory: Memory,
    write_gate: Mutex<()>,
}

impl Store {
    pub fn new(memory: Memory) -> Self {
        Self { memory, write_gate: Mutex::new(()) }
    }

    pub fn in_memory() -> Self {
        Self::new(Memory::memory())
    }

    /// Wait for exclusive write access.
    pub async fn writer(&self) -> StoreWriter<'_> {
        let guard = self.write_gate.lock().await;
        StoreWriter { store: self, _guard: guard }
    }
}

impl StoreRead for Store {
    fn memory(&self) -> &Memory {
        &self.memory
    }
}

/// Exclusive write handle. Dropping it lets the next writer in.
pub struct StoreWriter<'a> {
    store: &'a Store,
    _guard: MutexGuard<'a, ()>,
}

impl StoreWriter<'_> {
    /// Commit the batch in one transaction.
    pub fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.len();
        self.store.memory.apply(batch)?;
        debug!(ops, engine = self.store.memory.engine_name(), "store batch committed");
        Ok(())
    }

    pub fn put<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.put(record)?;
        self.commit(batch)
    }
}

impl StoreRead for StoreWriter<'_> {
    fn memory(&self) -> &Memory {
        &self.store.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use oakplane_core::{IpType, NodeStatus, Timeouts};
    use std::sync::Arc;

    fn service(id: &str) -> Service {
        Service {
            id: id.into(),
            name: format!("{id}-name"),
            protocol: Default::default(),
            health_check: false,
            web_socket: false,
            is_enable: true,
            release_status: Default::default(),
            load_balance: Default::default(),
            timeouts: Timeouts::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn node(id: &str, service_id: &str, ip: &str, port: u16) -> ServiceNode {
        ServiceNode {
            id: id.into(),
            service_id: service_id.into(),
            node_ip: ip.into(),
            ip_type: IpType::Ipv4,
            node_port: port,
            node_weight: 10,
        }
    }

    #[tokio::test]
    async fn batch_commits_parent_and_children_together() {
        let store = Store::in_memory();
        let writer = store.writer().await;
        let mut batch = WriteBatch::new();
        batch.put(&service("svc_1")).unwrap();
        batch
            .put_all(&[node("snd_b", "svc_1", "10.0.0.2", 80), node("snd_a", "svc_1", "10.0.0.1", 80)])
            .unwrap();
        writer.commit(batch).unwrap();
        drop(writer);

        assert!(store.service("svc_1").unwrap().is_some());
        let nodes = store.nodes_of("svc_1").unwrap();
        assert_eq!(
            nodes.iter().map(|n| n.node_ip.as_str()).collect::<Vec<_>>(),
            vec!["10.0.0.1", "10.0.0.2"]
        );
        assert!(store.nodes_of("svc_2").unwrap().is_empty());
    }

    #[tokio::test]
    async fn writers_are_serialized() {
        let store = Arc::new(Store::in_memory());
        let first = store.writer().await;

        let contender = {
            let store = store.clone();
            tokio::spawn(async move {
                let writer = store.writer().await;
                writer.put(&service("svc_late")).unwrap();
            })
        };
        tokio::task::yield_now().await;
        assert!(!contender.is_finished());

        first.put(&service("svc_early")).unwrap();
        drop(first);
        contender.await.unwrap();
        assert_eq!(store.list::<Service>().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cluster_nodes_are_found_by_ip() {
        let store = Store::in_memory();
        let writer = store.writer().await;
        writer
            .put(&ClusterNode {
                id: "cnd_1".into(),
                node_ip: "192.168.1.10".into(),
                ip_type: IpType::Ipv4,
                node_status: NodeStatus::Healthy,
                is_enable: true,
                updated_at: Utc::now(),
            })
            .unwrap();
        assert_eq!(writer.cluster_node_by_ip("192.168.1.10").unwrap().map(|n| n.id), Some("cnd_1".into()));
        assert!(writer.cluster_node_by_ip("192.168.1.11").unwrap().is_none());
    }
}
