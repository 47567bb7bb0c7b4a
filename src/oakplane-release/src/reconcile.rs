//! Natural-key diffing of owned child collections.
//!
//! Children are matched on what identifies them to an operator (the domain
//! string, a node's `{ip, port}`) rather than on row ids, so an update touches
//! only the rows that actually changed.

use oakplane_core::{
    IpType, NodeSpec, Record, ResourceKind, ServiceDomain, ServiceNode, new_id, sni,
};
use oakplane_errors::StoreError;
use oakplane_memory::WriteBatch;
use std::collections::BTreeMap;

/// A desired child as supplied by the caller.
pub trait DesiredChild {
    type Row: Record;
    type Key: Ord + Clone;

    fn key(&self) -> Self::Key;
    fn row_key(row: &Self::Row) -> Self::Key;
    fn create(&self, parent_id: &str) -> Self::Row;
    /// Updated copy of `row` when attributes outside the key differ.
    fn merge(&self, row: &Self::Row) -> Option<Self::Row>;
}

/// Disjoint operations turning the current children into the desired ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildDiff<T> {
    pub to_add: Vec<T>,
    pub to_update: Vec<T>,
    pub to_delete: Vec<String>,
}

impl<T> Default for ChildDiff<T> {
    fn default() -> Self {
        Self { to_add: Vec::new(), to_update: Vec::new(), to_delete: Vec::new() }
    }
}

impl<T: Record> ChildDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    pub fn stage(&self, batch: &mut WriteBatch) -> Result<(), StoreError> {
        batch.put_all(&self.to_add)?;
        batch.put_all(&self.to_update)?;
        for id in &self.to_delete {
            batch.delete::<T>(id);
        }
        Ok(())
    }
}

/// Diff `current` against `desired`. Repeated desired keys collapse to their
/// first occurrence; additions keep the desired order.
pub fn reconcile<D: DesiredChild>(
    parent_id: &str,
    current: Vec<D::Row>,
    desired: &[D],
) -> ChildDiff<D::Row> {
    let mut wanted: BTreeMap<D::Key, &D> = BTreeMap::new();
    let mut order: Vec<D::Key> = Vec::with_capacity(desired.len());
    for child in desired {
        let key = child.key();
        if !wanted.contains_key(&key) {
            order.push(key.clone());
            wanted.insert(key, child);
        }
    }

    let mut diff = ChildDiff::default();
    let mut existing: BTreeMap<D::Key, D::Row> = BTreeMap::new();
    for row in current {
        let key = D::row_key(&row);
        if !wanted.contains_key(&key) || existing.contains_key(&key) {
            diff.to_delete.push(row.id().to_string());
        } else {
            existing.insert(key, row);
        }
    }

    for key in &order {
        let child = wanted[key];
        match existing.get(key) {
            Some(row) => {
                if let Some(updated) = child.merge(row) {
                    diff.to_update.push(updated);
                }
            }
            None => diff.to_add.push(child.create(parent_id)),
        }
    }
    diff
}

impl DesiredChild for String {
    type Row = ServiceDomain;
    type Key = String;

    fn key(&self) -> String {
        sni::normalize(self)
    }

    fn row_key(row: &ServiceDomain) -> String {
        sni::normalize(&row.domain)
    }

    fn create(&self, parent_id: &str) -> ServiceDomain {
        ServiceDomain {
            id: new_id(ResourceKind::ServiceDomain),
            service_id: parent_id.to_string(),
            domain: self.key(),
        }
    }

    fn merge(&self, _row: &ServiceDomain) -> Option<ServiceDomain> {
        None
    }
}

impl DesiredChild for NodeSpec {
    type Row = ServiceNode;
    type Key = (String, u16);

    fn key(&self) -> (String, u16) {
        (self.node_ip.trim().to_ascii_lowercase(), self.node_port)
    }

    fn row_key(row: &ServiceNode) -> (String, u16) {
        (row.node_ip.trim().to_ascii_lowercase(), row.node_port)
    }

    fn create(&self, parent_id: &str) -> ServiceNode {
        let node_ip = self.node_ip.trim().to_string();
        ServiceNode {
            id: new_id(ResourceKind::ServiceNode),
            service_id: parent_id.to_string(),
            ip_type: IpType::discern(&node_ip).unwrap_or(IpType::Ipv4),
            node_ip,
            node_port: self.node_port,
            node_weight: self.node_weight,
        }
    }

    fn merge(&self, row: &ServiceNode) -> Option<ServiceNode> {
        if row.node_weight == self.node_weight {
            return None;
        }
        Some(ServiceNode { node_weight: self.node_weight, ..row.clone() })
    }
}
