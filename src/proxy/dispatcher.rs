//! Per-connection dispatch.
//!
//! # Responsibilities
//! - Read the priming chunk with a bounded wait
//! - Classify it and pick the backend
//! - Hand HTTP to the gateway; replay the chunk and relay raw TCP sessions
//! - Abort promptly when the session is cancelled by shutdown
//!
//! # Design Decisions
//! - The priming bytes are always written to the backend before any other
//!   client byte is read
//! - Errors end the session only; nothing is retried

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::config::{BackendsConfig, ProxyConfig};
use crate::http::gateway::{handle_http, GatewaySettings};
use crate::net::connection::SessionGuard;
use crate::net::relay::{relay, RelayError};
use crate::observability::metrics;
use crate::routing::{Backend, Classifier, LengthHeuristic, Protocol};

/// Session-ending failures, logged at the session boundary.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("reading from client failed: {0}")]
    ClientRead(#[source] std::io::Error),
    #[error("writing to client failed: {0}")]
    ClientWrite(#[source] std::io::Error),
    #[error("connecting to {backend} backend at {addr} timed out")]
    ConnectTimeout { backend: Backend, addr: String },
    #[error("connecting to {backend} backend at {addr} failed: {source}")]
    Connect {
        backend: Backend,
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("replaying priming bytes to backend failed: {0}")]
    BackendWrite(#[source] std::io::Error),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// Routes each accepted connection to the right backend.
#[derive(Debug)]
pub struct Dispatcher {
    backends: BackendsConfig,
    classifier: Arc<dyn Classifier>,
    gateway: GatewaySettings,
    sniff_bytes: usize,
    relay_chunk: usize,
    initial_read: Duration,
    connect_timeout: Duration,
}

impl Dispatcher {
    /// Dispatcher using the length heuristic with the configured threshold.
    pub fn new(config: &ProxyConfig) -> Self {
        let classifier = LengthHeuristic::new(config.classifier.login_length_threshold);
        Self::with_classifier(config, Arc::new(classifier))
    }

    pub fn with_classifier(config: &ProxyConfig, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            backends: config.backends.clone(),
            classifier,
            gateway: GatewaySettings::from_config(config),
            sniff_bytes: config.buffers.sniff_bytes,
            relay_chunk: config.buffers.relay_chunk_bytes,
            initial_read: config.timeouts.initial_read(),
            connect_timeout: config.timeouts.connect(),
        }
    }

    /// Serve one client connection to completion or cancellation.
    ///
    /// The session is deregistered when `session` drops at the end of this
    /// call, after both sockets have been closed.
    pub async fn dispatch(&self, client: TcpStream, peer: SocketAddr, session: SessionGuard) {
        let span = tracing::info_span!("session", id = %session.id(), peer = %peer);

        async {
            let cancel = session.cancellation().clone();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Session cancelled by shutdown");
                }
                res = self.serve(client, &session) => match res {
                    Ok(()) => tracing::debug!("Session finished"),
                    Err(DispatchError::Relay(e)) => tracing::warn!(
                        error = %e,
                        client_to_backend = e.transferred.0,
                        backend_to_client = e.transferred.1,
                        "Relay failed"
                    ),
                    Err(e) => tracing::warn!(error = %e, "Session terminated"),
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn serve(&self, mut client: TcpStream, session: &SessionGuard) -> Result<(), DispatchError> {
        let mut prefix = vec![0u8; self.sniff_bytes];
        let n = match tokio::time::timeout(self.initial_read, client.read(&mut prefix)).await {
            Err(_) => {
                tracing::info!(timeout_ms = self.initial_read.as_millis() as u64, "No data received, closing");
                return Ok(());
            }
            Ok(Err(e)) => return Err(DispatchError::ClientRead(e)),
            Ok(Ok(0)) => {
                tracing::debug!("Client closed before sending data");
                return Ok(());
            }
            Ok(Ok(n)) => n,
        };
        prefix.truncate(n);

        let protocol = self.classifier.classify(&prefix);
        let backend = Backend::for_protocol(protocol);
        session.set_protocol(protocol);
        metrics::record_classification(protocol);

        if protocol == Protocol::Indeterminate {
            tracing::debug!(bytes = n, "Too few bytes to classify, routing to game backend");
        }
        tracing::info!(protocol = %protocol, backend = %backend, bytes = n, "Connection classified");

        match backend {
            Backend::HttpLogin => {
                handle_http(&prefix, &mut client, &self.gateway)
                    .await
                    .map_err(DispatchError::ClientWrite)?;
                Ok(())
            }
            Backend::Login | Backend::Game => self.relay_to(backend, client, &prefix).await,
        }
    }

    async fn relay_to(&self, backend: Backend, client: TcpStream, prefix: &[u8]) -> Result<(), DispatchError> {
        let addr = backend.address(&self.backends);
        let mut upstream = self.connect(backend, addr).await?;
        let _ = client.set_nodelay(true);
        let _ = upstream.set_nodelay(true);

        tracing::debug!(backend = %backend, address = %addr, "Connected to backend");

        upstream.write_all(prefix).await.map_err(DispatchError::BackendWrite)?;

        let stats = relay(client, upstream, self.relay_chunk).await?;
        tracing::info!(
            backend = %backend,
            client_to_backend = stats.client_to_backend + prefix.len() as u64,
            backend_to_client = stats.backend_to_client,
            closed_by = stats.closed_by.as_str(),
            "Relay closed"
        );
        Ok(())
    }

    async fn connect(&self, backend: Backend, addr: &str) -> Result<TcpStream, DispatchError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => {
                metrics::record_connect_failure(backend);
                Err(DispatchError::Connect {
                    backend,
                    addr: addr.to_string(),
                    source,
                })
            }
            Err(_) => {
                metrics::record_connect_failure(backend);
                Err(DispatchError::ConnectTimeout {
                    backend,
                    addr: addr.to_string(),
                })
            }
        }
    }
}
