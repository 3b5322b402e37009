//! Connection dispatcher subsystem.
//!
//! # Data Flow
//! ```text
//! server.rs (accept loop)
//!     → register session
//!     → dispatcher.rs (priming read → classify)
//!         → HTTP:        http::gateway
//!         → LOGIN/GAME:  connect backend → replay prefix → net::relay
//! ```

pub mod dispatcher;
pub mod server;

pub use dispatcher::{DispatchError, Dispatcher};
pub use server::ProxyServer;
