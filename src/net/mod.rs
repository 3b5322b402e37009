//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (session registry, cancellation, drain)
//!     → Hand off to the dispatcher
//!     → relay.rs (raw TCP sessions: bidirectional pump)
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each session tracked for graceful shutdown
//! - TLS is out of scope; bytes pass through untouched

pub mod connection;
pub mod listener;
pub mod relay;

pub use connection::{ConnectionId, ConnectionRegistry, DrainTimeout, SessionGuard, SessionSnapshot};
pub use listener::{Incoming, Listener, ListenerError, SessionSlot};
pub use relay::{relay, Direction, RelayError, RelayStats};
