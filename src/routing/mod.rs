//! Connection routing subsystem.
//!
//! # Data Flow
//! ```text
//! Priming chunk (up to buffers.sniff_bytes)
//!     → classifier.rs (method token? length header?)
//!     → Protocol::{Http, Login, Game, Indeterminate}
//!     → Backend (dispatcher picks the address)
//! ```
//!
//! # Design Decisions
//! - Classification is a pure function so it can be tested without sockets
//! - Indeterminate prefixes are routed to the game backend, never dropped

pub mod classifier;

use std::fmt;

use crate::config::BackendsConfig;

pub use classifier::{classify, Classifier, LengthHeuristic, Protocol};

/// One of the three downstream services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    HttpLogin,
    Login,
    Game,
}

impl Backend {
    /// Backend chosen for a classification result.
    pub fn for_protocol(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Http => Backend::HttpLogin,
            Protocol::Login => Backend::Login,
            Protocol::Game | Protocol::Indeterminate => Backend::Game,
        }
    }

    /// Configured `host:port` of this backend.
    pub fn address<'a>(&self, backends: &'a BackendsConfig) -> &'a str {
        match self {
            Backend::HttpLogin => &backends.http,
            Backend::Login => &backends.login,
            Backend::Game => &backends.game,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::HttpLogin => "http_login",
            Backend::Login => "login",
            Backend::Game => "game",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indeterminate_goes_to_game() {
        assert_eq!(Backend::for_protocol(Protocol::Indeterminate), Backend::Game);
        assert_eq!(Backend::for_protocol(Protocol::Login), Backend::Login);
        assert_eq!(Backend::for_protocol(Protocol::Http), Backend::HttpLogin);
    }

    #[test]
    fn address_lookup() {
        let backends = BackendsConfig::default();
        assert_eq!(Backend::Login.address(&backends), "127.0.0.1:7171");
        assert_eq!(Backend::Game.address(&backends), "127.0.0.1:7172");
        assert_eq!(Backend::HttpLogin.address(&backends), "127.0.0.1:8090");
    }
}
