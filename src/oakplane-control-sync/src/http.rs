use crate::publisher::{RegistryPublisher, registry_key};
use async_trait::async_trait;
use oakplane_core::ResourceKind;
use oakplane_errors::PublishError;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Publishes documents to a key/value registry over HTTP:
/// `PUT {base}/{prefix}/{kind}/{id}` with a JSON body, `DELETE` for removal.
pub struct HttpRegistryPublisher {
    client: Client,
    base: Url,
    key_prefix: String,
}

impl HttpRegistryPublisher {
    pub fn new(base_url: &str, key_prefix: &str, timeout: Duration) -> Result<Self, PublishError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| PublishError::Unavailable(format!("invalid registry url {base_url}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Transport(e.to_string()))?;
        Ok(Self { client, base, key_prefix: key_prefix.to_string() })
    }

    fn url_for(&self, kind: ResourceKind, id: &str) -> Result<Url, PublishError> {
        self.base
            .join(&registry_key(&self.key_prefix, kind, id))
            .map_err(|e| PublishError::Encode(e.to_string()))
    }
}

#[async_trait]
impl RegistryPublisher for HttpRegistryPublisher {
    async fn publish(
        &self,
        kind: ResourceKind,
        id: &str,
        document: Option<&Value>,
    ) -> Result<(), PublishError> {
        let url = self.url_for(kind, id)?;
        let request = match document {
            Some(doc) => self.client.put(url.clone()).json(doc),
            None => self.client.delete(url.clone()),
        };
        let resp = request
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = resp.status();
        // Deleting a key the registry never had leaves it in the desired state.
        if status.is_success() || (document.is_none() && status == StatusCode::NOT_FOUND) {
            debug!(%kind, id, %url, status = status.as_u16(), "registry accepted document");
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(PublishError::Rejected { kind, id: id.to_string(), status: status.as_u16(), body })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn puts_document_under_prefixed_key() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/kv/oakplane/service/svc_1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        let publisher =
            HttpRegistryPublisher::new(&format!("{}/v1/kv", server.uri()), "oakplane", Duration::from_secs(2)).unwrap();

        publisher
            .publish(ResourceKind::Service, "svc_1", Some(&json!({"id": "svc_1"})))
            .await
            .unwrap();

        let seen = server.received_requests().await.unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(serde_json::from_slice::<Value>(&seen[0].body).unwrap(), json!({"id": "svc_1"}));
    }

    #[tokio::test]
    async fn delete_of_missing_key_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/route/rt_1"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(1)
            .mount(&server)
            .await;
        let publisher = HttpRegistryPublisher::new(&server.uri(), "", Duration::from_secs(2)).unwrap();

        publisher.publish(ResourceKind::Route, "rt_1", None).await.unwrap();
    }

    #[tokio::test]
    async fn missing_key_on_put_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let publisher = HttpRegistryPublisher::new(&server.uri(), "gw", Duration::from_secs(2)).unwrap();

        let err = publisher.publish(ResourceKind::Route, "rt_1", Some(&json!({}))).await.unwrap_err();
        assert!(matches!(err, PublishError::Rejected { status: 404, .. }));
    }

    #[tokio::test]
    async fn non_success_status_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/gw/plugin/plu_1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("leader lost"))
            .mount(&server)
            .await;
        let publisher = HttpRegistryPublisher::new(&server.uri(), "gw", Duration::from_secs(2)).unwrap();

        let err = publisher
            .publish(ResourceKind::Plugin, "plu_1", Some(&json!({})))
            .await
            .unwrap_err();
        match err {
            PublishError::Rejected { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "leader lost");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn slow_registry_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        let publisher = HttpRegistryPublisher::new(&server.uri(), "gw", Duration::from_millis(100)).unwrap();

        let err = publisher.publish(ResourceKind::Certificate, "cer_1", None).await.unwrap_err();
        assert!(matches!(err, PublishError::Transport(_)));
    }

    #[tokio::test]
    async fn unreachable_registry_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let publisher = HttpRegistryPublisher::new(&format!("http://{addr}"), "gw", Duration::from_secs(2)).unwrap();
        let err = publisher.publish(ResourceKind::Certificate, "cer_1", None).await.unwrap_err();
        assert!(matches!(err, PublishError::Transport(_)));
    }
}
