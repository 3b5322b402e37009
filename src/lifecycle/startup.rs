//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize metrics when enabled
//! - Bind the public listener
//! - Run the proxy until a signal arrives, then shut it down in order
//!
//! # Design Decisions
//! - Fail fast: a bind failure is fatal
//! - Listener starts last (traffic only when ready)

use std::net::SocketAddr;

use crate::config::ProxyConfig;
use crate::lifecycle::{signals, Shutdown};
use crate::net::connection::DrainTimeout;
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics;
use crate::proxy::ProxyServer;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("cannot listen on {address}: {source}")]
    Listen {
        address: String,
        #[source]
        source: ListenerError,
    },
    #[error("invalid metrics address {0}")]
    MetricsAddress(String),
    #[error("proxy task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Drain(#[from] DrainTimeout),
}

/// Run the proxy with `config` until SIGINT/SIGTERM, then shut down.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr);
    }

    let listener = Listener::bind(&config.listener)
        .await
        .map_err(|source| StartupError::Listen {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    tracing::info!(
        login = %config.backends.login,
        game = %config.backends.game,
        http = %config.backends.http,
        "Backends configured"
    );

    let shutdown = Shutdown::new();
    let server = ProxyServer::new(&config);
    let mut task = tokio::spawn(server.run(listener, shutdown.token()));

    tokio::select! {
        _ = signals::wait_for_signal() => {
            shutdown.trigger();
            task.await??;
        }
        res = &mut task => {
            res??;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
