//! Coordinator reconciliation queue
//!
//! [`RefreshQueue`] is the coordinator's cheap entry point: it validates the
//! request against the resource catalog and enqueues it without blocking.
//! [`RefreshWorker`] drains the queue in batches, collapses duplicates within
//! a batch, drops tasks whose resource instance was replaced after enqueueing,
//! and hands the rest to a [`Reconciler`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};

use crate::notification::INSTANCE_ID_NA;
use crate::reconciliation::{ReconciliationError, ReconciliationService};

/// Most tasks processed in one batch
const MAX_BATCH: usize = 256;

/// Known resources and their current instance ids
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    resources: Arc<RwLock<HashMap<String, String>>>,
}

impl ResourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a catalog from name → instance id pairs
    pub fn from_map(resources: &BTreeMap<String, String>) -> Self {
        let map = resources.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        Self {
            resources: Arc::new(RwLock::new(map)),
        }
    }

    /// Create or recreate a resource
    pub async fn upsert(&self, name: &str, instance_id: &str) {
        debug!(%name, %instance_id, "ResourceCatalog::upsert: called");
        self.resources
            .write()
            .await
            .insert(name.to_string(), instance_id.to_string());
    }

    pub async fn remove(&self, name: &str) -> Option<String> {
        debug!(%name, "ResourceCatalog::remove: called");
        self.resources.write().await.remove(name)
    }

    pub async fn current_instance(&self, name: &str) -> Option<String> {
        self.resources.read().await.get(name).cloned()
    }

    /// Check `instance_id` against the current incarnation of `name`
    ///
    /// The "not applicable" instance id matches any incarnation.
    async fn validate(&self, name: &str, instance_id: &str) -> Result<(), ReconciliationError> {
        let current = self
            .current_instance(name)
            .await
            .ok_or_else(|| ReconciliationError::UnknownResource(name.to_string()))?;
        if instance_id != INSTANCE_ID_NA && instance_id != current {
            return Err(ReconciliationError::StaleInstance {
                resource: name.to_string(),
                received: instance_id.to_string(),
                current,
            });
        }
        Ok(())
    }
}

/// One pending mapping refresh
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefreshTask {
    pub resource_name: String,
    pub resource_instance_id: String,
}

/// Performs the actual reconciliation of one resource's mapping
#[async_trait]
pub trait Reconciler: Send + Sync {
    async fn reconcile(&self, task: &RefreshTask) -> Result<(), ReconciliationError>;
}

/// Counters reported when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub received: u64,
    pub collapsed: u64,
    pub stale: u64,
    pub reconciled: u64,
    pub failed: u64,
}

/// Enqueueing side, used as the dispatcher's reconciliation service
#[derive(Debug, Clone)]
pub struct RefreshQueue {
    catalog: ResourceCatalog,
    tx: mpsc::Sender<RefreshTask>,
}

impl RefreshQueue {
    /// Create a queue holding at most `capacity` pending tasks
    pub fn new(catalog: ResourceCatalog, capacity: usize) -> (Self, RefreshWorker) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            catalog: catalog.clone(),
            tx,
        };
        (queue, RefreshWorker { catalog, rx })
    }
}

#[async_trait]
impl ReconciliationService for RefreshQueue {
    async fn refresh(&self, resource_name: &str, resource_instance_id: &str) -> Result<(), ReconciliationError> {
        debug!(%resource_name, %resource_instance_id, "RefreshQueue::refresh: called");
        self.catalog.validate(resource_name, resource_instance_id).await?;

        let task = RefreshTask {
            resource_name: resource_name.to_string(),
            resource_instance_id: resource_instance_id.to_string(),
        };
        self.tx.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ReconciliationError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => ReconciliationError::QueueClosed,
        })
    }
}

/// Draining side of the queue
#[derive(Debug)]
pub struct RefreshWorker {
    catalog: ResourceCatalog,
    rx: mpsc::Receiver<RefreshTask>,
}

impl RefreshWorker {
    /// Process batches until shutdown or until every queue handle is dropped
    pub async fn run(mut self, reconciler: Arc<dyn Reconciler>, mut shutdown_rx: mpsc::Receiver<()>) -> RefreshStats {
        info!("Refresh worker started");
        let mut stats = RefreshStats::default();

        loop {
            tokio::select! {
                first = self.rx.recv() => {
                    let Some(first) = first else {
                        debug!("RefreshWorker::run: queue closed");
                        break;
                    };
                    let batch = self.collect_batch(first);
                    self.process_batch(batch, reconciler.as_ref(), &mut stats).await;
                }

                _ = shutdown_rx.recv() => {
                    debug!("RefreshWorker::run: shutdown signal received");
                    break;
                }
            }
        }

        info!(?stats, "Refresh worker stopped");
        stats
    }

    fn collect_batch(&mut self, first: RefreshTask) -> Vec<RefreshTask> {
        let mut batch = vec![first];
        while batch.len() < MAX_BATCH {
            match self.rx.try_recv() {
                Ok(task) => batch.push(task),
                Err(_) => break,
            }
        }
        batch
    }

    async fn process_batch(&self, batch: Vec<RefreshTask>, reconciler: &dyn Reconciler, stats: &mut RefreshStats) {
        debug!(size = batch.len(), "RefreshWorker::process_batch: called");
        let mut seen = HashSet::new();

        for task in batch {
            stats.received += 1;
            if !seen.insert(task.clone()) {
                stats.collapsed += 1;
                continue;
            }

            if let Err(e) = self
                .catalog
                .validate(&task.resource_name, &task.resource_instance_id)
                .await
            {
                debug!(resource = %task.resource_name, reason = %e, "Ignoring refresh for replaced resource");
                stats.stale += 1;
                continue;
            }

            match reconciler.reconcile(&task).await {
                Ok(()) => stats.reconciled += 1,
                Err(e) => {
                    warn!(resource = %task.resource_name, error = %e, "Mapping reconciliation failed");
                    stats.failed += 1;
                }
            }
        }
    }
}
