use crate::publisher::{RegistryPublisher, registry_key};
use async_trait::async_trait;
use dashmap::DashMap;
use oakplane_core::ResourceKind;
use oakplane_errors::PublishError;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Put,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishCall {
    pub kind: ResourceKind,
    pub id: String,
    pub verb: Verb,
    pub ok: bool,
}

/// In-process registry. Used when no external registry is configured and as
/// the fault-injectable publisher in tests.
#[derive(Default)]
pub struct MemoryRegistry {
    documents: DashMap<String, Value>,
    failing_calls: AtomicUsize,
    unavailable: AtomicBool,
    calls: Mutex<Vec<PublishCall>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` publish calls.
    pub fn fail_next(&self, n: usize) {
        self.failing_calls.store(n, Ordering::SeqCst);
    }

    /// Fail every call until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn document(&self, kind: ResourceKind, id: &str) -> Option<Value> {
        self.documents.get(&registry_key("", kind, id)).map(|d| d.value().clone())
    }

    pub fn contains(&self, kind: ResourceKind, id: &str) -> bool {
        self.documents.contains_key(&registry_key("", kind, id))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn calls(&self) -> Vec<PublishCall> {
        self.calls.lock().clone()
    }

    fn should_fail(&self) -> bool {
        self.unavailable.load(Ordering::SeqCst)
            || self
                .failing_calls
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
    }
}

#[async_trait]
impl RegistryPublisher for MemoryRegistry {
    async fn publish(
        &self,
        kind: ResourceKind,
        id: &str,
        document: Option<&Value>,
    ) -> Result<(), PublishError> {
        let verb = if document.is_some() { Verb::Put } else { Verb::Delete };
        let fail = self.should_fail();
        self.calls.lock().push(PublishCall { kind, id: id.to_string(), verb, ok: !fail });
        if fail {
            warn!(%kind, id, ?verb, "memory registry refused call");
            return Err(PublishError::Unavailable("memory registry refused the call".into()));
        }

        let key = registry_key("", kind, id);
        match document {
            Some(doc) => {
                self.documents.insert(key, doc.clone());
            }
            None => {
                self.documents.remove(&key);
            }
        }
        debug!(%kind, id, ?verb, "memory registry updated");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stores_and_removes_documents() {
        let registry = MemoryRegistry::new();
        registry.publish(ResourceKind::Service, "svc_1", Some(&json!({"name": "a"}))).await.unwrap();
        assert_eq!(registry.document(ResourceKind::Service, "svc_1"), Some(json!({"name": "a"})));

        registry.publish(ResourceKind::Service, "svc_1", None).await.unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.calls().len(), 2);
    }

    #[tokio::test]
    async fn injected_failures_leave_documents_untouched() {
        let registry = MemoryRegistry::new();
        registry.publish(ResourceKind::Route, "rt_1", Some(&json!(1))).await.unwrap();

        registry.fail_next(1);
        assert!(registry.publish(ResourceKind::Route, "rt_1", None).await.is_err());
        assert!(registry.contains(ResourceKind::Route, "rt_1"));

        registry.publish(ResourceKind::Route, "rt_1", None).await.unwrap();
        assert!(!registry.contains(ResourceKind::Route, "rt_1"));
        assert_eq!(
            registry.calls().iter().map(|c| c.ok).collect::<Vec<_>>(),
            vec![true, false, true]
        );
    }
}
