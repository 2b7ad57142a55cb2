//! Coordinator-side handler for mapping refresh notifications
//!
//! Stateless pass-through: decode, hand the pair to the reconciliation
//! service on the receiving task, acknowledge. Safe to run concurrently for
//! any number of notifications; per-resource serialization is the service's
//! job.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::notification::{MAPPING_REFRESH_ENDPOINT, Notification};
use crate::reconciliation::ReconciliationService;
use crate::transport::{Ack, HandlerRegistry, RequestHandler, TransportError};

/// Dispatches decoded notifications to the reconciliation service
pub struct ReconciliationDispatcher {
    service: Arc<dyn ReconciliationService>,
}

impl ReconciliationDispatcher {
    pub fn new(service: Arc<dyn ReconciliationService>) -> Self {
        Self { service }
    }

    /// Register a dispatcher for `service` under the mapping refresh endpoint
    ///
    /// Call once per coordinator lifetime; a second registration on the same
    /// registry fails with [`TransportError::DuplicateEndpoint`].
    pub fn register(registry: &mut HandlerRegistry, service: Arc<dyn ReconciliationService>) -> Result<(), TransportError> {
        debug!("ReconciliationDispatcher::register: called");
        registry.register(MAPPING_REFRESH_ENDPOINT, Arc::new(Self::new(service)))
    }
}

#[async_trait]
impl RequestHandler for ReconciliationDispatcher {
    async fn handle(&self, payload: Bytes) -> Result<Ack, TransportError> {
        let notification = Notification::decode(payload).map_err(|e| {
            warn!(error = %e, "Rejecting malformed mapping refresh notification");
            e
        })?;

        debug!(
            resource = %notification.resource_name(),
            instance = %notification.resource_instance_id(),
            from = %notification.originating_node_id(),
            any_instance = notification.instance_id_is_na(),
            "ReconciliationDispatcher::handle: refreshing mapping"
        );

        self.service
            .refresh(notification.resource_name(), notification.resource_instance_id())
            .await?;

        Ok(Ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::ReconciliationError;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<(String, String)>>,
        fail_with: Option<ReconciliationError>,
    }

    #[async_trait]
    impl ReconciliationService for RecordingService {
        async fn refresh(&self, resource_name: &str, resource_instance_id: &str) -> Result<(), ReconciliationError> {
            self.calls
                .lock()
                .await
                .push((resource_name.to_string(), resource_instance_id.to_string()));
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    fn payload(name: &str, instance: &str) -> Bytes {
        Notification::new(name, "worker-1")
            .unwrap()
            .with_instance_id(instance)
            .encode()
            .unwrap()
    }

    #[tokio::test]
    async fn test_refresh_called_once_then_ack() {
        let service = Arc::new(RecordingService::default());
        let dispatcher = ReconciliationDispatcher::new(service.clone());

        let ack = dispatcher.handle(payload("R1", "abc")).await.unwrap();

        assert_eq!(ack, Ack);
        assert_eq!(*service.calls.lock().await, vec![("R1".to_string(), "abc".to_string())]);
    }

    #[tokio::test]
    async fn test_truncated_payload_skips_refresh() {
        let service = Arc::new(RecordingService::default());
        let dispatcher = ReconciliationDispatcher::new(service.clone());

        let err = dispatcher.handle(Bytes::from_static(&[0x85])).await.unwrap_err();

        assert!(matches!(err, TransportError::Decode(_)));
        assert!(service.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_reconciliation_error_propagates() {
        let service = Arc::new(RecordingService {
            fail_with: Some(ReconciliationError::UnknownResource("R9".to_string())),
            ..Default::default()
        });
        let dispatcher = ReconciliationDispatcher::new(service.clone());

        let err = dispatcher.handle(payload("R9", "x")).await.unwrap_err();

        assert!(matches!(
            err,
            TransportError::Reconciliation(ReconciliationError::UnknownResource(ref r)) if r == "R9"
        ));
        assert_eq!(service.calls.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_register_binds_fixed_endpoint_once() {
        let mut registry = HandlerRegistry::new();
        let service: Arc<dyn ReconciliationService> = Arc::new(RecordingService::default());

        ReconciliationDispatcher::register(&mut registry, service.clone()).unwrap();
        assert!(registry.contains(MAPPING_REFRESH_ENDPOINT));

        let err = ReconciliationDispatcher::register(&mut registry, service).unwrap_err();
        assert!(matches!(err, TransportError::DuplicateEndpoint(_)));
    }

    #[tokio::test]
    async fn test_registry_survives_malformed_payload() {
        let service = Arc::new(RecordingService::default());
        let mut registry = HandlerRegistry::new();
        ReconciliationDispatcher::register(&mut registry, service.clone()).unwrap();

        assert!(registry.dispatch(MAPPING_REFRESH_ENDPOINT, Bytes::from_static(&[0xFF])).await.is_err());
        registry
            .dispatch(MAPPING_REFRESH_ENDPOINT, payload("R1", "abc"))
            .await
            .unwrap();

        assert_eq!(service.calls.lock().await.len(), 1);
    }
}
