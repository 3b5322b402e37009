//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Metrics (optional) → Bind listener → Start accept loop
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Cancel sessions → Drain → Close listener
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then the listener
//! - Ordered shutdown: stop accept, cancel, drain, close
//! - Drain has an optional deadline; past it the process exits anyway

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
