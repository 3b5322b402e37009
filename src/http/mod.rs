//! HTTP login gateway subsystem.
//!
//! # Data Flow
//! ```text
//! Priming chunk classified as HTTP
//!     → gateway.rs (reassemble request, route)
//!     → message.rs (framing: terminator + Content-Length)
//!     → POST /login.php: raw replay to the HTTP login backend
//!     → anything else: response.rs (local 404)
//!     → backend failure: response.rs (local 500)
//! ```

pub mod gateway;
pub mod message;
pub mod response;

pub use gateway::{handle_http, GatewayError, GatewayOutcome, GatewaySettings, Rejection};
pub use message::{Framing, MessageBuffer, MessageError, RequestLine};
pub use response::{LocalResponse, INTERNAL_SERVER_ERROR, NOT_FOUND};
