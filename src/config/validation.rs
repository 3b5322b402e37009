//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate address shapes (`host:port`, non-zero port)
//! - Validate value ranges (timeouts > 0, buffers > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `backends.login`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting every problem.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be at least 1"));
    }

    check_host_port(&mut errors, "backends.login", &config.backends.login);
    check_host_port(&mut errors, "backends.game", &config.backends.game);
    check_host_port(&mut errors, "backends.http", &config.backends.http);

    if config.classifier.login_length_threshold == 0 {
        errors.push(ValidationError::new(
            "classifier.login_length_threshold",
            "must be greater than 0 or no connection can reach the login backend",
        ));
    }

    let timeouts = [
        ("timeouts.initial_read_ms", config.timeouts.initial_read_ms),
        ("timeouts.connect_ms", config.timeouts.connect_ms),
        ("timeouts.client_read_ms", config.timeouts.client_read_ms),
        ("timeouts.backend_read_ms", config.timeouts.backend_read_ms),
        ("timeouts.response_idle_ms", config.timeouts.response_idle_ms),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if config.buffers.sniff_bytes < 2 {
        errors.push(ValidationError::new(
            "buffers.sniff_bytes",
            "must be at least 2 to read the length header",
        ));
    }
    if config.buffers.relay_chunk_bytes == 0 {
        errors.push(ValidationError::new("buffers.relay_chunk_bytes", "must be greater than 0"));
    }
    if config.buffers.max_http_message_bytes < config.buffers.sniff_bytes {
        errors.push(ValidationError::new(
            "buffers.max_http_message_bytes",
            "must not be smaller than buffers.sniff_bytes",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Backend addresses may be host names, so only the shape is checked here.
fn check_host_port(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    match value.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => match port.parse::<u16>() {
            Ok(0) => errors.push(ValidationError::new(field, "port must not be 0")),
            Ok(_) => {}
            Err(_) => errors.push(ValidationError::new(field, format!("invalid port in '{}'", value))),
        },
        _ => errors.push(ValidationError::new(field, format!("'{}' is not host:port", value))),
    }
}
