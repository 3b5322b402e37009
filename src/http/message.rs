//! HTTP message reassembly.
//!
//! # Responsibilities
//! - Accumulate raw bytes of a request or response
//! - Locate the header terminator and the declared `Content-Length`
//! - Parse the request line (method, path, version)
//!
//! # Design Decisions
//! - Bytes are kept verbatim so the gateway can replay them unmodified
//! - A message is never reported complete before its declared body arrived
//! - Only `Content-Length` framing is understood; chunked bodies are not
//!   decoded (responses without a length fall back to an idle rule in the
//!   gateway)

/// End of the header block.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Where a buffered message stands with respect to its framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Header terminator not seen yet.
    AwaitingHeaders,
    /// Headers complete, `remaining` body bytes still missing.
    AwaitingBody { remaining: usize },
    /// Headers and the declared body are present; the message spans `len` bytes.
    Complete { len: usize },
    /// Headers complete but no `Content-Length`: the end is unknown.
    Unbounded,
}

/// Errors raised while interpreting buffered bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("invalid Content-Length header: {0:?}")]
    InvalidContentLength(String),
    #[error("message exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Accumulator for one HTTP message.
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    data: Vec<u8>,
    limit: usize,
    /// Cached offset of the header terminator, once found.
    header_end: Option<usize>,
}

impl MessageBuffer {
    /// Create an empty buffer that refuses to grow past `limit` bytes.
    pub fn new(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
            header_end: None,
        }
    }

    /// Create a buffer seeded with bytes that were already read.
    pub fn with_initial(initial: &[u8], limit: usize) -> Result<Self, MessageError> {
        let mut buffer = Self::new(limit);
        buffer.extend(initial)?;
        Ok(buffer)
    }

    /// Append bytes.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<(), MessageError> {
        if self.data.len() + bytes.len() > self.limit {
            return Err(MessageError::TooLarge { limit: self.limit });
        }
        // Resume the terminator search just before the old end, in case it
        // straddles the boundary.
        let search_from = self.data.len().saturating_sub(HEADER_TERMINATOR.len() - 1);
        self.data.extend_from_slice(bytes);
        if self.header_end.is_none() {
            self.header_end = find(&self.data[search_from..], HEADER_TERMINATOR).map(|pos| search_from + pos);
        }
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset just past the header terminator.
    pub fn body_start(&self) -> Option<usize> {
        self.header_end.map(|end| end + HEADER_TERMINATOR.len())
    }

    /// Header block, without the terminator.
    pub fn head(&self) -> Option<&[u8]> {
        self.header_end.map(|end| &self.data[..end])
    }

    /// Value of the first `Content-Length` header, matched case-insensitively.
    pub fn content_length(&self) -> Result<Option<usize>, MessageError> {
        let Some(head) = self.head() else {
            return Ok(None);
        };

        for line in head.split(|b| *b == b'\n').skip(1) {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let Some(colon) = line.iter().position(|b| *b == b':') else {
                continue;
            };
            let (name, value) = line.split_at(colon);
            if name.eq_ignore_ascii_case(b"content-length") {
                let value = String::from_utf8_lossy(&value[1..]).trim().to_string();
                return value
                    .parse::<usize>()
                    .map(Some)
                    .map_err(|_| MessageError::InvalidContentLength(value));
            }
        }
        Ok(None)
    }

    /// Current framing state.
    pub fn framing(&self) -> Result<Framing, MessageError> {
        let Some(body_start) = self.body_start() else {
            return Ok(Framing::AwaitingHeaders);
        };

        match self.content_length()? {
            None => Ok(Framing::Unbounded),
            Some(declared) => {
                let received = self.data.len() - body_start;
                if received >= declared {
                    Ok(Framing::Complete {
                        len: body_start + declared,
                    })
                } else {
                    Ok(Framing::AwaitingBody {
                        remaining: declared - received,
                    })
                }
            }
        }
    }

    /// Body bytes received so far.
    pub fn body(&self) -> &[u8] {
        match self.body_start() {
            Some(start) => &self.data[start..],
            None => &[],
        }
    }

    /// Drop anything past `len` (bytes pipelined behind a complete message).
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Parse the first line as a request line.
    pub fn request_line(&self) -> Option<RequestLine> {
        let end = find(&self.data, b"\r\n")?;
        RequestLine::parse(&self.data[..end])
    }
}

/// Method, path and version of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub path: String,
    pub version: String,
}

impl RequestLine {
    /// Parse `METHOD SP PATH SP VERSION`. Anything else is rejected.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let line = std::str::from_utf8(line).ok()?;
        let mut parts = line.split(' ');
        let (method, path, version) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() || method.is_empty() || path.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self {
            method: method.to_string(),
            path: path.to_string(),
            version: version.to_string(),
        })
    }

    /// The single route the gateway forwards.
    pub fn is_login(&self) -> bool {
        self.method == "POST" && self.path == "/login.php"
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}
