//! Mapsync - mapping refresh notifications for coordinator-led clusters
//!
//! A worker that suspects its local copy of a resource's mapping is stale
//! tells the current coordinator, which reconciles the authoritative mapping.
//!
//! # Core Concepts
//!
//! - **At most once**: notifications are fire-and-forget, never retried
//! - **No coordinator, no send**: with nobody elected the notification is dropped
//! - **Instance tagging**: each notification names the resource incarnation it saw
//! - **Stateless dispatch**: the coordinator decodes, hands off, acknowledges
//!
//! # Modules
//!
//! - [`notification`] - The message and its wire layout
//! - [`notifier`] - Worker-side sender
//! - [`dispatcher`] - Coordinator-side handler
//! - [`transport`] - Handler registry, in-process and TCP transports
//! - [`refresh_queue`] - Coordinator reconciliation queue
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod locator;
pub mod notification;
pub mod notifier;
pub mod reconciliation;
pub mod refresh_queue;
pub mod transport;

// Re-export commonly used types
pub use codec::MessageError;
pub use config::Config;
pub use dispatcher::ReconciliationDispatcher;
pub use locator::{CoordinatorLocator, SharedLocator, StaticLocator};
pub use notification::{INSTANCE_ID_NA, MAPPING_REFRESH_ENDPOINT, Notification};
pub use notifier::MappingRefreshNotifier;
pub use reconciliation::{ReconciliationError, ReconciliationService};
pub use refresh_queue::{Reconciler, RefreshQueue, RefreshStats, RefreshTask, RefreshWorker, ResourceCatalog};
pub use transport::{
    Ack, HandlerRegistry, LocalTransport, NodeHandle, RequestHandler, SendMetrics, TcpServer, TcpTransport, Transport,
    TransportError,
};
