//! Reconciliation collaborator contract
//!
//! The coordinator's reconciliation routine lives outside this crate's core.
//! The dispatcher only ever calls [`ReconciliationService::refresh`], which is
//! expected to enqueue work and return quickly.

use async_trait::async_trait;
use thiserror::Error;

/// Errors a reconciliation routine can report back to the sender
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    #[error("unknown resource [{0}]")]
    UnknownResource(String),

    #[error("stale instance [{received}] for resource [{resource}], current instance is [{current}]")]
    StaleInstance {
        resource: String,
        received: String,
        current: String,
    },

    #[error("reconciliation queue is full")]
    QueueFull,

    #[error("reconciliation queue is closed")]
    QueueClosed,

    #[error("reconciliation failed: {0}")]
    Failed(String),
}

/// Entry point the coordinator exposes for mapping refresh requests
#[async_trait]
pub trait ReconciliationService: Send + Sync {
    /// Request reconciliation of `resource_name`'s mapping for the given instance
    async fn refresh(&self, resource_name: &str, resource_instance_id: &str) -> Result<(), ReconciliationError>;
}
