//! TCP transport
//!
//! One request per connection: the client connects, writes a request frame,
//! reads a response frame and closes. The server accepts connections on its
//! own task and dispatches each request inline through the node's
//! [`HandlerRegistry`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::frame::{DEFAULT_MAX_FRAME_SIZE, RequestFrame, ResponseFrame, read_frame, write_frame};
use super::{Ack, HandlerRegistry, InFlight, NodeHandle, SendMetrics, Transport, TransportError};

/// Default timeout for connect, write and read
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client side of the TCP transport
#[derive(Debug, Clone)]
pub struct TcpTransport {
    timeout: Duration,
    max_frame_size: usize,
    in_flight: InFlight,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpTransport {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            in_flight: InFlight::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Send a request and wait for the acknowledgment
    pub async fn request(&self, target: &NodeHandle, endpoint: &str, payload: Bytes) -> Result<Ack, TransportError> {
        send_request(target.clone(), endpoint.to_string(), payload, self.timeout, self.max_frame_size).await
    }
}

async fn send_request(
    target: NodeHandle,
    endpoint: String,
    payload: Bytes,
    timeout: Duration,
    max_frame_size: usize,
) -> Result<Ack, TransportError> {
    debug!(node = %target, %endpoint, "send_request: called");
    let body = RequestFrame { endpoint, payload }.encode()?;

    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(target.address()))
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
        .map_err(|e| TransportError::ConnectionFailed {
            address: target.address().to_string(),
            reason: e.to_string(),
        })?;

    tokio::time::timeout(timeout, write_frame(&mut stream, &body, max_frame_size))
        .await
        .map_err(|_| TransportError::Timeout(timeout))??;

    let response = tokio::time::timeout(timeout, read_frame(&mut stream, max_frame_size))
        .await
        .map_err(|_| TransportError::Timeout(timeout))??;

    match ResponseFrame::decode(response)? {
        ResponseFrame::Ack => {
            debug!(node = %target, "send_request: acknowledged");
            Ok(Ack)
        }
        ResponseFrame::Failure(message) => Err(TransportError::Remote {
            node: target.id().to_string(),
            message,
        }),
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn send_fire_and_forget(&self, target: &NodeHandle, endpoint: &str, payload: Bytes) {
        debug!(node = %target, %endpoint, "TcpTransport::send_fire_and_forget: called");
        let send = send_request(
            target.clone(),
            endpoint.to_string(),
            payload,
            self.timeout,
            self.max_frame_size,
        );
        self.in_flight.track(target, endpoint, send);
    }

    async fn flush(&self) {
        self.in_flight.drain().await;
    }

    fn metrics(&self) -> SendMetrics {
        self.in_flight.metrics()
    }
}

/// Server side of the TCP transport
pub struct TcpServer {
    listener: TcpListener,
    registry: Arc<HandlerRegistry>,
    timeout: Duration,
    max_frame_size: usize,
}

impl TcpServer {
    /// Bind a listener serving requests from `registry`
    pub async fn bind(addr: &str, registry: Arc<HandlerRegistry>) -> Result<Self, TransportError> {
        debug!(%addr, ?registry, "TcpServer::bind: called");
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Transport listening");
        Ok(Self {
            listener,
            registry,
            timeout: DEFAULT_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until a shutdown signal arrives
    pub async fn run(self, mut shutdown_rx: mpsc::Receiver<()>) {
        debug!("TcpServer::run: called");
        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            debug!(%peer, "TcpServer::run: connection accepted");
                            let registry = self.registry.clone();
                            let timeout = self.timeout;
                            let max_frame_size = self.max_frame_size;
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, registry, timeout, max_frame_size).await {
                                    warn!(%peer, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "Accept error");
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Transport shutting down");
                    break;
                }
            }
        }
    }
}

/// Serve a single request on `stream`
async fn handle_connection(
    mut stream: TcpStream,
    registry: Arc<HandlerRegistry>,
    timeout: Duration,
    max_frame_size: usize,
) -> Result<(), TransportError> {
    let body = tokio::time::timeout(timeout, read_frame(&mut stream, max_frame_size))
        .await
        .map_err(|_| TransportError::Timeout(timeout))??;

    let outcome = match RequestFrame::decode(body) {
        Ok(request) => {
            debug!(endpoint = %request.endpoint, "handle_connection: dispatching");
            registry.dispatch(&request.endpoint, request.payload).await
        }
        Err(e) => Err(e),
    };

    let response = match outcome {
        Ok(Ack) => ResponseFrame::Ack,
        Err(e) => {
            debug!(error = %e, "handle_connection: request failed");
            ResponseFrame::Failure(e.to_string())
        }
    };

    let encoded = response.encode()?;
    tokio::time::timeout(timeout, write_frame(&mut stream, &encoded, max_frame_size))
        .await
        .map_err(|_| TransportError::Timeout(timeout))??;
    Ok(())
}
