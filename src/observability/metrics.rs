//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_total` (counter): accepted client sessions
//! - `proxy_active_sessions` (gauge): sessions currently registered
//! - `proxy_classified_total` (counter): sessions by detected protocol
//! - `proxy_http_responses_total` (counter): gateway responses by status
//! - `proxy_backend_connect_failures_total` (counter): failed backend dials
//! - `proxy_relay_bytes_total` (counter): relayed bytes by direction
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus endpoint is optional and off by default

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::net::relay::Direction;
use crate::routing::{Backend, Protocol};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn session_opened() {
    metrics::counter!("proxy_connections_total").increment(1);
    metrics::gauge!("proxy_active_sessions").increment(1.0);
}

pub fn session_closed() {
    metrics::gauge!("proxy_active_sessions").decrement(1.0);
}

pub fn record_classification(protocol: Protocol) {
    metrics::counter!("proxy_classified_total", "protocol" => protocol.as_str()).increment(1);
}

pub fn record_http_response(status: u16) {
    metrics::counter!("proxy_http_responses_total", "status" => status.to_string()).increment(1);
}

pub fn record_connect_failure(backend: Backend) {
    metrics::counter!("proxy_backend_connect_failures_total", "backend" => backend.as_str()).increment(1);
}

pub fn record_relay_bytes(direction: Direction, bytes: u64) {
    metrics::counter!("proxy_relay_bytes_total", "direction" => direction.as_str()).increment(bytes);
}
