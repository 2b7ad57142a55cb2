//! Endpoint name → handler table
//!
//! Built once while a node starts up, then shared read-only behind an `Arc`
//! by whichever server accepts requests for that node.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use super::{Ack, RequestHandler, TransportError};

/// Handlers registered on one node, keyed by endpoint name
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn RequestHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `endpoint`; an endpoint can be bound only once
    pub fn register(&mut self, endpoint: &str, handler: Arc<dyn RequestHandler>) -> Result<(), TransportError> {
        debug!(%endpoint, "HandlerRegistry::register: called");
        if self.handlers.contains_key(endpoint) {
            return Err(TransportError::DuplicateEndpoint(endpoint.to_string()));
        }
        self.handlers.insert(endpoint.to_string(), handler);
        info!(%endpoint, "Registered request handler");
        Ok(())
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.handlers.contains_key(endpoint)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route `payload` to the handler for `endpoint`, running it inline
    pub async fn dispatch(&self, endpoint: &str, payload: Bytes) -> Result<Ack, TransportError> {
        debug!(%endpoint, len = payload.len(), "HandlerRegistry::dispatch: called");
        let handler = self
            .handlers
            .get(endpoint)
            .ok_or_else(|| TransportError::UnknownEndpoint(endpoint.to_string()))?;
        handler.handle(payload).await
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut endpoints: Vec<&String> = self.handlers.keys().collect();
        endpoints.sort();
        f.debug_struct("HandlerRegistry").field("endpoints", &endpoints).finish()
    }
}
