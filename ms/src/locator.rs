//! Coordinator discovery seam
//!
//! Election and discovery happen elsewhere; the notifier only asks "who is
//! the coordinator right now", and the answer may be nobody.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::transport::NodeHandle;

/// Supplies the current coordinator, if one is known
pub trait CoordinatorLocator: Send + Sync {
    fn current_coordinator(&self) -> Option<NodeHandle>;
}

/// Locator with a fixed answer, e.g. from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticLocator {
    coordinator: Option<NodeHandle>,
}

impl StaticLocator {
    pub fn new(coordinator: Option<NodeHandle>) -> Self {
        Self { coordinator }
    }
}

impl CoordinatorLocator for StaticLocator {
    fn current_coordinator(&self) -> Option<NodeHandle> {
        self.coordinator.clone()
    }
}

/// Locator updated by whatever tracks elections
///
/// Clones share the same view. Interested parties can [`subscribe`] to learn
/// when the coordinator changes.
///
/// [`subscribe`]: SharedLocator::subscribe
#[derive(Debug, Clone)]
pub struct SharedLocator {
    tx: Arc<watch::Sender<Option<NodeHandle>>>,
}

impl Default for SharedLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedLocator {
    /// Start with no coordinator known
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_coordinator(&self, coordinator: NodeHandle) {
        info!(node = %coordinator, "Coordinator elected");
        self.tx.send_replace(Some(coordinator));
    }

    pub fn clear(&self) {
        debug!("SharedLocator::clear: called");
        if self.tx.send_replace(None).is_some() {
            info!("Coordinator lost");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<NodeHandle>> {
        self.tx.subscribe()
    }
}

impl CoordinatorLocator for SharedLocator {
    fn current_coordinator(&self) -> Option<NodeHandle> {
        self.tx.borrow().clone()
    }
}
