use reqwest::Client;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tracing::{error, info};
use url::Url;

/// Polls the cluster watch endpoint over HTTPS and forwards every value it
/// returns into the watch worker channel.
pub struct WatchFeed {
    url: Url,
    interval: Duration,
    client: Client,
}

impl WatchFeed {
    /// `timeout` bounds each poll request end to end.
    pub fn new(url: Url, interval: Duration, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { url, interval, client })
    }

    /// Poll until the receiving side of `tx` is dropped.
    pub async fn run(&self, tx: mpsc::Sender<Value>) {
        info!(url = %self.url, interval_ms = self.interval.as_millis() as u64, "cluster watch feed started");
        loop {
            match self.pull_once().await {
                Ok(values) => {
                    for value in values {
                        if tx.send(value).await.is_err() {
                            info!("cluster watch channel closed, stopping feed");
                            return;
                        }
                    }
                }
                Err(e) => error!("cluster watch pull failed: {e}"),
            }
            if tx.is_closed() {
                return;
            }
            sleep(self.interval).await;
        }
    }

    /// One poll. An array response yields each element, anything else one value.
    pub async fn pull_once(&self) -> Result<Vec<Value>, reqwest::Error> {
        let body: Value = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(match body {
            Value::Array(values) => values,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn feed(server: &MockServer, timeout: Duration) -> WatchFeed {
        let url = Url::parse(&format!("{}/watch", server.uri())).unwrap();
        WatchFeed::new(url, Duration::from_millis(10), timeout).unwrap()
    }

    #[tokio::test]
    async fn forwards_each_watched_node() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/watch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"node_ip": "10.0.0.1", "is_enable": true},
                {"node_ip": "10.0.0.2"}
            ])))
            .mount(&server)
            .await;
        let feed = feed(&server, Duration::from_secs(2));

        let (tx, mut rx) = mpsc::channel(8);
        let handle = tokio::spawn(async move { feed.run(tx).await });

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first["node_ip"], "10.0.0.1");
        assert_eq!(second["node_ip"], "10.0.0.2");

        drop(rx);
        tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn single_object_and_null_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"node_ip": "10.0.0.3"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Null))
            .mount(&server)
            .await;
        let feed = feed(&server, Duration::from_secs(2));

        assert_eq!(feed.pull_once().await.unwrap(), vec![json!({"node_ip": "10.0.0.3"})]);
        assert!(feed.pull_once().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        assert!(feed(&server, Duration::from_secs(2)).pull_once().await.is_err());
    }

    #[tokio::test]
    async fn stalled_feed_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;
        let err = feed(&server, Duration::from_millis(100)).pull_once().await.unwrap_err();
        assert!(err.is_timeout());
    }
}
