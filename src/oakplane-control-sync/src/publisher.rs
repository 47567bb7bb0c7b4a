use async_trait::async_trait;
use oakplane_core::ResourceKind;
use oakplane_errors::PublishError;
use serde_json::Value;

/// Data-plane registry that gateway nodes read their configuration from.
///
/// `Some(doc)` stores or replaces the document of `(kind, id)`; `None` removes it.
/// An `Err` means the registry is not guaranteed to have changed.
#[async_trait]
pub trait RegistryPublisher: Send + Sync {
    async fn publish(
        &self,
        kind: ResourceKind,
        id: &str,
        document: Option<&Value>,
    ) -> Result<(), PublishError>;

    fn name(&self) -> &'static str;
}

/// Registry key of a resource document, e.g. `oakplane/service/svc_1`.
pub fn registry_key(prefix: &str, kind: ResourceKind, id: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", kind, id)
    } else {
        format!("{}/{}/{}", prefix, kind, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_ignore_surrounding_slashes() {
        assert_eq!(registry_key("/oakplane/", ResourceKind::Route, "rt_1"), "oakplane/route/rt_1");
        assert_eq!(registry_key("", ResourceKind::Plugin, "plu_1"), "plugin/plu_1");
    }
}
