//! Worker-side sender of mapping refresh notifications
//!
//! At most once, best effort. With no coordinator the notification is dropped
//! with a warning; otherwise it is handed to the transport and the call
//! returns immediately. Nothing is queued, retried or awaited here. Higher
//! level state sync is expected to notice the stale mapping again later.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::locator::CoordinatorLocator;
use crate::notification::{MAPPING_REFRESH_ENDPOINT, Notification};
use crate::transport::{NodeHandle, Transport};

/// Sends mapping refresh notifications toward the coordinator
#[derive(Clone)]
pub struct MappingRefreshNotifier {
    transport: Arc<dyn Transport>,
}

impl MappingRefreshNotifier {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send `notification` to `coordinator` without waiting for the outcome
    pub fn notify(&self, coordinator: Option<&NodeHandle>, notification: Notification) {
        debug!(
            resource = %notification.resource_name(),
            instance = %notification.resource_instance_id(),
            "MappingRefreshNotifier::notify: called"
        );

        let Some(coordinator) = coordinator else {
            warn!(
                "can't send mapping refresh for [{}], no coordinator known.",
                notification.resource_name()
            );
            return;
        };

        let payload = match notification.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(resource = %notification.resource_name(), error = %e, "Failed to encode mapping refresh");
                return;
            }
        };

        self.transport
            .send_fire_and_forget(coordinator, MAPPING_REFRESH_ENDPOINT, payload);
    }

    /// Resolve the coordinator through `locator` at call time, then [`notify`](Self::notify)
    pub fn notify_current(&self, locator: &dyn CoordinatorLocator, notification: Notification) {
        let coordinator = locator.current_coordinator();
        self.notify(coordinator.as_ref(), notification);
    }
}
