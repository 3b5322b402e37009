//! Protocol classification from the first bytes of a connection.
//!
//! # Responsibilities
//! - Recognize HTTP request lines by their method token
//! - Split binary traffic into login handshakes and game sessions
//!
//! # Design Decisions
//! - Pure functions over a byte slice: no socket, no state
//! - The length header is a routing hint only and is never validated
//!   against the payload that follows it

use std::fmt;

/// Request-line method tokens, each including the trailing space.
pub const HTTP_METHODS: [&[u8]; 6] = [
    b"GET ",
    b"POST ",
    b"PUT ",
    b"DELETE ",
    b"HEAD ",
    b"OPTIONS ",
];

/// Length headers below this value are treated as login handshakes.
pub const DEFAULT_LOGIN_THRESHOLD: u16 = 150;

/// Result of sniffing a connection prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Login,
    Game,
    /// Not enough bytes to read the length header.
    Indeterminate,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Login => "login",
            Protocol::Game => "game",
            Protocol::Indeterminate => "indeterminate",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy used by the dispatcher to classify new connections.
pub trait Classifier: Send + Sync + fmt::Debug {
    fn classify(&self, prefix: &[u8]) -> Protocol;
}

/// Method-token check followed by the little-endian length heuristic.
#[derive(Debug, Clone, Copy)]
pub struct LengthHeuristic {
    login_threshold: u16,
}

impl LengthHeuristic {
    pub fn new(login_threshold: u16) -> Self {
        Self { login_threshold }
    }

    pub fn login_threshold(&self) -> u16 {
        self.login_threshold
    }
}

impl Default for LengthHeuristic {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_THRESHOLD)
    }
}

impl Classifier for LengthHeuristic {
    fn classify(&self, prefix: &[u8]) -> Protocol {
        classify(prefix, self.login_threshold)
    }
}

/// Returns true if `prefix` starts with a recognized method token.
pub fn is_http_request(prefix: &[u8]) -> bool {
    HTTP_METHODS.iter().any(|method| prefix.starts_with(method))
}

/// Reads the leading u16 little-endian length header, if present.
pub fn length_header(prefix: &[u8]) -> Option<u16> {
    match prefix {
        [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}

/// Classify a connection prefix.
pub fn classify(prefix: &[u8], login_threshold: u16) -> Protocol {
    if is_http_request(prefix) {
        return Protocol::Http;
    }

    match length_header(prefix) {
        None => Protocol::Indeterminate,
        Some(len) if len < login_threshold => Protocol::Login,
        Some(_) => Protocol::Game,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_every_method_token() {
        for method in HTTP_METHODS {
            let mut request = method.to_vec();
            request.extend_from_slice(b"/login.php HTTP/1.1\r\n");
            assert_eq!(classify(&request, 150), Protocol::Http, "{:?}", method);
        }
    }

    #[test]
    fn method_without_space_is_not_http() {
        // "GE" reads as length 0x4547, far above the threshold.
        assert_eq!(classify(b"GET/", 150), Protocol::Game);
        assert_eq!(classify(b"POSTX", 150), Protocol::Game);
    }

    #[test]
    fn small_length_is_login() {
        assert_eq!(classify(&[0x04, 0x00, 1, 2, 3, 4], 150), Protocol::Login);
        assert_eq!(classify(&[149, 0x00], 150), Protocol::Login);
        assert_eq!(classify(&[0x00, 0x00], 150), Protocol::Login);
    }

    #[test]
    fn threshold_and_above_is_game() {
        assert_eq!(classify(&[150, 0x00], 150), Protocol::Game);
        assert_eq!(classify(&[0xC8, 0x00], 150), Protocol::Game);

        let mut packet = vec![0x00, 0xC8];
        packet.extend(std::iter::repeat(0).take(200));
        assert_eq!(classify(&packet, 150), Protocol::Game);
    }

    #[test]
    fn length_is_little_endian() {
        // 0x0100 = 256 when read little-endian.
        assert_eq!(length_header(&[0x00, 0x01]), Some(256));
        assert_eq!(classify(&[0x00, 0x01], 150), Protocol::Game);
    }

    #[test]
    fn short_prefix_is_indeterminate() {
        assert_eq!(classify(&[], 150), Protocol::Indeterminate);
        assert_eq!(classify(&[0x04], 150), Protocol::Indeterminate);
        assert_eq!(classify(b"G", 150), Protocol::Indeterminate);
    }

    #[test]
    fn two_byte_prefix_is_enough() {
        assert_eq!(classify(&[0x04, 0x00], 150), Protocol::Login);
    }

    #[test]
    fn strategy_uses_configured_threshold() {
        let classifier = LengthHeuristic::new(10);
        assert_eq!(classifier.classify(&[9, 0]), Protocol::Login);
        assert_eq!(classifier.classify(&[10, 0]), Protocol::Game);
        assert_eq!(LengthHeuristic::default().login_threshold(), 150);
    }
}
