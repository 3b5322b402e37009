//! Accept loop for the public port.
//!
//! # Responsibilities
//! - Accept connections until the shutdown token fires
//! - Register each session before its task is spawned
//! - On shutdown: stop accepting, cancel sessions, drain, drop the listener

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::net::connection::{ConnectionRegistry, DrainTimeout};
use crate::net::listener::{Incoming, Listener, ListenerError};
use crate::proxy::dispatcher::Dispatcher;
use crate::routing::Classifier;

/// Pause after a failed accept before trying again.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// The single-port proxy: one listener, one dispatcher, one registry.
pub struct ProxyServer {
    dispatcher: Arc<Dispatcher>,
    registry: Arc<ConnectionRegistry>,
    drain_deadline: Option<Duration>,
}

impl ProxyServer {
    /// Create a new server with the given configuration.
    pub fn new(config: &ProxyConfig) -> Self {
        Self::from_dispatcher(config, Dispatcher::new(config))
    }

    /// Create a server that classifies connections with `classifier`.
    pub fn with_classifier(config: &ProxyConfig, classifier: Arc<dyn Classifier>) -> Self {
        Self::from_dispatcher(config, Dispatcher::with_classifier(config, classifier))
    }

    fn from_dispatcher(config: &ProxyConfig, dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            registry: Arc::new(ConnectionRegistry::new()),
            drain_deadline: config.timeouts.shutdown_drain(),
        }
    }

    /// Registry of live sessions, shared with the accept loop.
    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Run the server until `shutdown` is cancelled and every session drained.
    ///
    /// The listener is dropped only after the drain completes (or its
    /// deadline passes).
    pub async fn run(self, listener: Listener, shutdown: CancellationToken) -> Result<(), DrainTimeout> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Proxy accepting connections");
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                res = listener.accept() => match res {
                    Ok(Incoming { stream, peer, slot }) => {
                        let session = self.registry.register(peer, slot);
                        let dispatcher = Arc::clone(&self.dispatcher);
                        tokio::spawn(async move {
                            dispatcher.dispatch(stream, peer, session).await;
                        });
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        accept_backoff(&shutdown).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Listener stopped");
                        break;
                    }
                },
            }
        }

        let drained = self.registry.shutdown(self.drain_deadline).await;
        match &drained {
            Ok(()) => tracing::info!("All client sessions closed"),
            Err(e) => tracing::warn!(remaining = e.remaining, "Drain deadline passed with sessions still open"),
        }

        drop(listener);
        tracing::info!("Listener closed");
        drained
    }
}

/// Pause before the next accept so a persistent failure (EMFILE) does not
/// spin. Returns early once shutdown begins.
async fn accept_backoff(shutdown: &CancellationToken) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[tokio::test]
    async fn failed_accept_waits_before_retrying() {
        let shutdown = CancellationToken::new();
        let started = Instant::now();
        accept_backoff(&shutdown).await;
        assert!(started.elapsed() >= ACCEPT_RETRY_DELAY);
    }

    #[tokio::test]
    async fn backoff_ends_early_on_shutdown() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        tokio::time::timeout(ACCEPT_RETRY_DELAY / 2, accept_backoff(&shutdown))
            .await
            .expect("backoff ignored shutdown");
    }
}
