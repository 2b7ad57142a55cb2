//! In-process transport
//!
//! Connects named nodes living in the same process. Each send resolves the
//! target's registry on a background task and dispatches there, so the caller
//! returns before the handler runs, same as over the network.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Ack, HandlerRegistry, InFlight, NodeHandle, SendMetrics, Transport, TransportError};

/// Transport between nodes sharing one process
#[derive(Debug, Clone, Default)]
pub struct LocalTransport {
    nodes: Arc<RwLock<HashMap<String, Arc<HandlerRegistry>>>>,
    in_flight: InFlight,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `node_id` reachable, serving requests from `registry`
    pub async fn connect(&self, node_id: &str, registry: Arc<HandlerRegistry>) {
        debug!(%node_id, ?registry, "LocalTransport::connect: called");
        self.nodes.write().await.insert(node_id.to_string(), registry);
    }

    /// Make `node_id` unreachable; later sends to it fail
    pub async fn disconnect(&self, node_id: &str) {
        debug!(%node_id, "LocalTransport::disconnect: called");
        self.nodes.write().await.remove(node_id);
    }

    /// Send and wait for the acknowledgment
    pub async fn request(&self, target: &NodeHandle, endpoint: &str, payload: Bytes) -> Result<Ack, TransportError> {
        deliver(self.nodes.clone(), target.id().to_string(), endpoint.to_string(), payload).await
    }
}

async fn deliver(
    nodes: Arc<RwLock<HashMap<String, Arc<HandlerRegistry>>>>,
    node_id: String,
    endpoint: String,
    payload: Bytes,
) -> Result<Ack, TransportError> {
    let registry = nodes
        .read()
        .await
        .get(&node_id)
        .cloned()
        .ok_or_else(|| TransportError::NodeNotConnected(node_id.clone()))?;
    registry.dispatch(&endpoint, payload).await
}

#[async_trait]
impl Transport for LocalTransport {
    fn send_fire_and_forget(&self, target: &NodeHandle, endpoint: &str, payload: Bytes) {
        debug!(node = %target, %endpoint, "LocalTransport::send_fire_and_forget: called");
        let send = deliver(self.nodes.clone(), target.id().to_string(), endpoint.to_string(), payload);
        self.in_flight.track(target, endpoint, send);
    }

    async fn flush(&self) {
        self.in_flight.drain().await;
    }

    fn metrics(&self) -> SendMetrics {
        self.in_flight.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RequestHandler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RequestHandler for Echo {
        async fn handle(&self, _payload: Bytes) -> Result<Ack, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Ack)
        }
    }

    #[tokio::test]
    async fn test_fire_and_forget_reaches_connected_node() {
        let handler = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let mut registry = HandlerRegistry::new();
        registry.register("ep", handler.clone()).unwrap();

        let transport = LocalTransport::new();
        transport.connect("coord-1", Arc::new(registry)).await;

        let target = NodeHandle::new("coord-1", "local");
        transport.send_fire_and_forget(&target, "ep", Bytes::from_static(b"x"));
        transport.flush().await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.metrics().acknowledged, 1);
    }

    #[tokio::test]
    async fn test_send_to_unknown_node_is_counted_not_raised() {
        let transport = LocalTransport::new();
        let target = NodeHandle::new("gone", "local");

        transport.send_fire_and_forget(&target, "ep", Bytes::new());
        transport.flush().await;

        let metrics = transport.metrics();
        assert_eq!(metrics.submitted, 1);
        assert_eq!(metrics.failed, 1);
    }

    #[tokio::test]
    async fn test_request_after_disconnect_fails() {
        let transport = LocalTransport::new();
        transport.connect("n1", Arc::new(HandlerRegistry::new())).await;
        transport.disconnect("n1").await;

        let err = transport
            .request(&NodeHandle::new("n1", "local"), "ep", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NodeNotConnected(ref id) if id == "n1"));
    }
}
