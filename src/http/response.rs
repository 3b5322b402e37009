//! Locally generated responses.
//!
//! The gateway answers on its own only for unrouted requests (404) and for
//! backend failures (500). Everything else is the backend's response,
//! relayed verbatim.

/// A fixed plain-text response written straight to the client socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalResponse {
    pub status: u16,
    pub reason: &'static str,
    pub body: &'static str,
}

pub const NOT_FOUND: LocalResponse = LocalResponse {
    status: 404,
    reason: "Not Found",
    body: "Not Found",
};

pub const INTERNAL_SERVER_ERROR: LocalResponse = LocalResponse {
    status: 500,
    reason: "Internal Server Error",
    body: "Internal Server Error",
};

impl LocalResponse {
    /// Serialize as an HTTP/1.1 message that closes the connection.
    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            self.reason,
            self.body.len(),
            self.body
        )
        .into_bytes()
    }
}
