//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every session produces:
//!     → logging.rs (structured events inside a per-session span)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
