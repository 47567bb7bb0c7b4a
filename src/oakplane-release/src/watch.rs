//! Background ingestion of gateway node heartbeats.
//!
//! Watch values arrive on a channel (from the HTTPS feed or anything else
//! holding the sender) and are upserted one at a time. Errors and panics stop
//! at this boundary: they are logged and the worker moves on.

use crate::ControlPlane;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub struct WatchWorker {
    plane: ControlPlane,
    rx: mpsc::Receiver<Value>,
}

impl WatchWorker {
    pub fn new(plane: ControlPlane, rx: mpsc::Receiver<Value>) -> Self {
        Self { plane, rx }
    }

    /// Run until every sender is dropped.
    pub async fn run(mut self) {
        info!("cluster watch worker started");
        while let Some(value) = self.rx.recv().await {
            self.ingest(value).await;
        }
        info!("cluster watch worker stopped");
    }

    async fn ingest(&self, value: Value) {
        let outcome = AssertUnwindSafe(self.plane.cluster_node_watch_add_value(value))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(node)) => debug!(id = %node.id, node_ip = %node.node_ip, "watch value applied"),
            Ok(Err(e)) => error!(code = ?e.code(), "cluster node watch add failed: {e}"),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!("cluster node watch add panicked: {reason}");
            }
        }
    }
}

/// Spawn a worker and return the sender feeding it.
pub fn spawn_watch_worker(plane: ControlPlane, capacity: usize) -> (mpsc::Sender<Value>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(WatchWorker::new(plane, rx).run());
    (tx, handle)
}
