//! Single-port game traffic router.
//!
//! Accepts every client on one TCP port, sniffs the first bytes and routes
//! the connection to the HTTP login gateway, the login server or the game
//! server.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
pub use proxy::ProxyServer;
