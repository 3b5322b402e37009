//! Crystal proxy
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────┐
//!                        │              CRYSTAL PROXY               │
//!   Client               │  ┌──────────┐   ┌────────────┐           │
//!   ─────────────────────┼─▶│ listener │──▶│ dispatcher │           │
//!                        │  └──────────┘   └─────┬──────┘           │
//!                        │        ┌──────────────┼─────────────┐    │
//!                        │        ▼              ▼             ▼    │
//!                        │  ┌──────────┐   ┌──────────┐  ┌──────────┐
//!                        │  │ gateway  │   │  relay   │  │  relay   │──▶ game
//!                        │  └────┬─────┘   └────┬─────┘  └──────────┘
//!                        │       ▼              ▼                   │
//!                        │   http login      login                  │
//!                        └──────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use crystal_proxy::config::{read_config, validate_config, ConfigError, ProxyConfig};
use crystal_proxy::lifecycle;
use crystal_proxy::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "crystal-proxy", version, about = "Single-port login/game traffic router")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Public port to listen on (all interfaces)
    #[arg(long)]
    proxy_port: Option<u16>,

    #[arg(long)]
    login_host: Option<String>,
    #[arg(long)]
    login_port: Option<u16>,

    #[arg(long)]
    game_host: Option<String>,
    #[arg(long)]
    game_port: Option<u16>,

    /// Web server handling /login.php
    #[arg(long)]
    http_host: Option<String>,
    #[arg(long)]
    http_port: Option<u16>,

    /// Debug logging for the proxy
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Layer the flags over `base` and validate the merged result.
    fn resolve(&self, mut base: ProxyConfig) -> Result<ProxyConfig, ConfigError> {
        self.apply(&mut base);
        validate_config(&base).map_err(ConfigError::Validation)?;
        Ok(base)
    }

    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(port) = self.proxy_port {
            config.listener.bind_address = format!("0.0.0.0:{port}");
        }
        override_backend(&mut config.backends.login, &self.login_host, self.login_port);
        override_backend(&mut config.backends.game, &self.game_host, self.game_port);
        override_backend(&mut config.backends.http, &self.http_host, self.http_port);
    }
}

/// Replace the host and/or port of a `host:port` backend address.
fn override_backend(address: &mut String, host: &Option<String>, port: Option<u16>) {
    if host.is_none() && port.is_none() {
        return;
    }
    let (current_host, current_port) = match address.rsplit_once(':') {
        Some((h, p)) => (h.to_string(), p.to_string()),
        None => (address.clone(), String::new()),
    };
    let host = host.clone().unwrap_or(current_host);
    let port = port.map(|p| p.to_string()).unwrap_or(current_port);
    *address = format!("{host}:{port}");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };
    let config = cli.resolve(base)?;

    logging::init_logging(&config.observability.log_level, cli.verbose);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "crystal-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        login_threshold = config.classifier.login_length_threshold,
        "Configuration loaded"
    );

    lifecycle::run(config).await?;
    Ok(())
}
