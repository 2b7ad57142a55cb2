//! Messaging substrate used by the notifier and the dispatcher
//!
//! Sends are fire-and-forget: [`Transport::send_fire_and_forget`] only enqueues
//! the request on a background task and returns. The outcome of that task is
//! the transport's failure channel: it is logged and counted, never returned
//! to the caller and never retried.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

mod error;
pub mod frame;
mod local;
mod registry;
mod tcp;

pub use error::TransportError;
pub use local::LocalTransport;
pub use registry::HandlerRegistry;
pub use tcp::{TcpServer, TcpTransport};

/// Address of a cluster node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    id: String,
    address: String,
}

impl NodeHandle {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{{{}}}", self.id, self.address)
    }
}

/// Empty, content-free acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ack;

/// Handler bound to one endpoint
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handle one request payload
    async fn handle(&self, payload: Bytes) -> Result<Ack, TransportError>;
}

/// Send side of the messaging substrate
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit `payload` to `endpoint` on `target` without waiting for the outcome
    fn send_fire_and_forget(&self, target: &NodeHandle, endpoint: &str, payload: Bytes);

    /// Wait for sends already submitted to finish (delivered or failed)
    async fn flush(&self) {}

    /// Counters for submitted sends
    fn metrics(&self) -> SendMetrics {
        SendMetrics::default()
    }
}

/// Snapshot of send counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendMetrics {
    pub submitted: u64,
    pub acknowledged: u64,
    pub failed: u64,
    /// Failures where the remote node received the request and refused it
    pub rejected: u64,
}

/// Background send tracking shared by the concrete transports
#[derive(Debug, Clone, Default)]
pub(crate) struct InFlight {
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    submitted: Arc<AtomicU64>,
    acknowledged: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
}

impl InFlight {
    /// Spawn `send` and log its outcome against `target`/`endpoint`
    pub(crate) fn track<F>(&self, target: &NodeHandle, endpoint: &str, send: F)
    where
        F: Future<Output = Result<Ack, TransportError>> + Send + 'static,
    {
        self.submitted.fetch_add(1, Ordering::Relaxed);

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(node = %target, %endpoint, "failed to send request: {}", TransportError::NoRuntime);
                self.failed.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };

        let target = target.clone();
        let endpoint = endpoint.to_string();
        let acknowledged = self.acknowledged.clone();
        let failed = self.failed.clone();
        let rejected = self.rejected.clone();
        let task = runtime.spawn(async move {
            match send.await {
                Ok(Ack) => {
                    debug!(node = %target, %endpoint, "InFlight::track: acknowledged");
                    acknowledged.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!(node = %target, %endpoint, error = %e, "failed to send request");
                    failed.fetch_add(1, Ordering::Relaxed);
                    if e.is_request_failure() {
                        rejected.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Await every tracked task
    pub(crate) async fn drain(&self) {
        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::take(&mut *tasks)
        };
        debug!(count = tasks.len(), "InFlight::drain: called");
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "send task panicked or was cancelled");
            }
        }
    }

    pub(crate) fn metrics(&self) -> SendMetrics {
        SendMetrics {
            submitted: self.submitted.load(Ordering::Relaxed),
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_handle_display() {
        let node = NodeHandle::new("coord-1", "10.0.0.1:9340");
        assert_eq!(node.to_string(), "{coord-1}{10.0.0.1:9340}");
        assert_eq!(node.id(), "coord-1");
        assert_eq!(node.address(), "10.0.0.1:9340");
    }

    #[tokio::test]
    async fn test_in_flight_counts_outcomes() {
        let in_flight = InFlight::default();
        let node = NodeHandle::new("n", "local");

        in_flight.track(&node, "ep", async { Ok(Ack) });
        in_flight.track(&node, "ep", async { Err(TransportError::NodeNotConnected("n".to_string())) });
        in_flight.track(&node, "ep", async {
            Err(TransportError::Remote {
                node: "n".to_string(),
                message: "unknown resource [logs]".to_string(),
            })
        });
        in_flight.drain().await;

        assert_eq!(
            in_flight.metrics(),
            SendMetrics {
                submitted: 3,
                acknowledged: 1,
                failed: 2,
                rejected: 1,
            }
        );
    }

    #[test]
    fn test_in_flight_without_runtime_counts_failure() {
        let in_flight = InFlight::default();
        let node = NodeHandle::new("n", "local");

        in_flight.track(&node, "ep", async { Ok(Ack) });

        let metrics = in_flight.metrics();
        assert_eq!(metrics.submitted, 1);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.rejected, 0);
    }
}
