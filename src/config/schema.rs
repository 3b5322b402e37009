//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the game traffic proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Addresses of the three backends.
    pub backends: BackendsConfig,

    /// Protocol classification settings.
    pub classifier: ClassifierConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Buffer and chunk sizes.
    pub buffers: BufferConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7170").
    pub bind_address: String,

    /// Maximum concurrent client sessions (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7170".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Backend addresses, each as `host:port`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// Login handshake service.
    pub login: String,

    /// Game session service.
    pub game: String,

    /// HTTP login endpoint (serves `POST /login.php`).
    pub http: String,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            login: "127.0.0.1:7171".to_string(),
            game: "127.0.0.1:7172".to_string(),
            http: "127.0.0.1:8090".to_string(),
        }
    }
}

/// Classification heuristics.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Length headers strictly below this value are routed to the login backend.
    pub login_length_threshold: u16,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            login_length_threshold: 150,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long to wait for the priming chunk of a new connection.
    pub initial_read_ms: u64,

    /// Backend connection establishment timeout.
    pub connect_ms: u64,

    /// Per-read timeout while reassembling an HTTP request from the client.
    pub client_read_ms: u64,

    /// Per-read timeout while reading the HTTP backend response.
    pub backend_read_ms: u64,

    /// Quiet period that ends a response without `Content-Length`.
    pub response_idle_ms: u64,

    /// Upper bound on the shutdown drain. Zero waits indefinitely.
    pub shutdown_drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            initial_read_ms: 5_000,
            connect_ms: 5_000,
            client_read_ms: 5_000,
            backend_read_ms: 10_000,
            response_idle_ms: 100,
            shutdown_drain_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn initial_read(&self) -> Duration {
        Duration::from_millis(self.initial_read_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn client_read(&self) -> Duration {
        Duration::from_millis(self.client_read_ms)
    }

    pub fn backend_read(&self) -> Duration {
        Duration::from_millis(self.backend_read_ms)
    }

    pub fn response_idle(&self) -> Duration {
        Duration::from_millis(self.response_idle_ms)
    }

    /// `None` means the drain has no deadline.
    pub fn shutdown_drain(&self) -> Option<Duration> {
        (self.shutdown_drain_secs > 0).then(|| Duration::from_secs(self.shutdown_drain_secs))
    }
}

/// Buffer sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Size of the priming read used for classification.
    pub sniff_bytes: usize,

    /// Chunk size of each relay pump.
    pub relay_chunk_bytes: usize,

    /// Largest HTTP request or response the gateway will buffer.
    pub max_http_message_bytes: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            sniff_bytes: 1024,
            relay_chunk_bytes: 8192,
            max_http_message_bytes: 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
