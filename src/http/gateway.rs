//! HTTP login gateway.
//!
//! # Responsibilities
//! - Reassemble the client's request from the priming chunk and the stream
//! - Route `POST /login.php` to the HTTP login backend, 404 everything else
//! - Read the backend response until it is completely framed
//! - Answer backend failures with a local 500
//!
//! # Design Decisions
//! - Raw replay: the request bytes are forwarded exactly as received
//! - One request per connection; the client side is closed afterwards
//! - No retries; a failed login call is the client's to repeat

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::ProxyConfig;
use crate::http::message::{Framing, MessageBuffer, MessageError, RequestLine};
use crate::http::response::{LocalResponse, INTERNAL_SERVER_ERROR, NOT_FOUND};
use crate::observability::metrics;
use crate::routing::Backend;

const READ_CHUNK: usize = 8192;

/// Settings the gateway needs from the proxy configuration.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// `host:port` of the HTTP login backend.
    pub backend: String,
    pub connect_timeout: Duration,
    pub client_read_timeout: Duration,
    pub backend_read_timeout: Duration,
    /// Quiet period that ends a response without `Content-Length`.
    pub response_idle: Duration,
    pub max_message_bytes: usize,
}

impl GatewaySettings {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            backend: config.backends.http.clone(),
            connect_timeout: config.timeouts.connect(),
            client_read_timeout: config.timeouts.client_read(),
            backend_read_timeout: config.timeouts.backend_read(),
            response_idle: config.timeouts.response_idle(),
            max_message_bytes: config.buffers.max_http_message_bytes,
        }
    }
}

/// Failures while talking to the HTTP login backend.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("connecting to {addr} timed out")]
    ConnectTimeout { addr: String },
    #[error("connecting to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sending request to backend failed: {0}")]
    Send(#[source] std::io::Error),
    #[error("reading backend response failed: {0}")]
    Receive(#[source] std::io::Error),
    #[error("backend response timed out")]
    ReceiveTimeout,
    #[error("backend closed the connection after {received} bytes of an incomplete response")]
    Incomplete { received: usize },
    #[error("malformed backend response: {0}")]
    Message(#[from] MessageError),
}

/// Why a request was answered locally instead of forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Client closed before the request was complete.
    ClientClosed,
    /// Client stalled longer than the read timeout.
    ClientTimeout,
    Message(MessageError),
    MalformedRequestLine,
    NoRoute { method: String, path: String },
}

/// What happened to one HTTP connection.
#[derive(Debug)]
pub enum GatewayOutcome {
    /// The backend response was relayed; `status` is its status code if parsable.
    Forwarded { status: Option<u16>, bytes: usize },
    /// Answered with a local 404.
    Rejected(Rejection),
    /// Answered with a local 500.
    Failed(GatewayError),
}

/// Serve one HTTP request whose first bytes were already read by the dispatcher.
///
/// Returns an error only if writing to the client fails; every other problem
/// is answered on the wire.
pub async fn handle_http<S>(
    initial: &[u8],
    client: &mut S,
    settings: &GatewaySettings,
) -> std::io::Result<GatewayOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let outcome = match read_request(initial, client, settings).await {
        Err(rejection) => GatewayOutcome::Rejected(rejection),
        Ok(request) => match route(&request) {
            Err(rejection) => GatewayOutcome::Rejected(rejection),
            Ok(()) => match forward(request.as_bytes(), settings).await {
                Ok(response) => {
                    client.write_all(&response).await?;
                    GatewayOutcome::Forwarded {
                        status: status_code(&response),
                        bytes: response.len(),
                    }
                }
                Err(e) => GatewayOutcome::Failed(e),
            },
        },
    };

    match &outcome {
        GatewayOutcome::Forwarded { status, bytes } => {
            tracing::info!(status = ?status, bytes, "Forwarded HTTP login request");
            metrics::record_http_response(status.unwrap_or(0));
        }
        GatewayOutcome::Rejected(rejection) => {
            tracing::info!(reason = ?rejection, "Answering HTTP request with 404");
            send_local(client, &NOT_FOUND).await?;
        }
        GatewayOutcome::Failed(e) => {
            tracing::warn!(backend = %settings.backend, error = %e, "HTTP login backend failed");
            send_local(client, &INTERNAL_SERVER_ERROR).await?;
        }
    }

    client.shutdown().await?;
    Ok(outcome)
}

async fn send_local<S>(client: &mut S, response: &LocalResponse) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    client.write_all(&response.to_bytes()).await?;
    metrics::record_http_response(response.status);
    Ok(())
}

/// Accumulate the request until its headers and declared body are present.
async fn read_request<S>(
    initial: &[u8],
    client: &mut S,
    settings: &GatewaySettings,
) -> Result<MessageBuffer, Rejection>
where
    S: AsyncRead + Unpin,
{
    let mut request =
        MessageBuffer::with_initial(initial, settings.max_message_bytes).map_err(Rejection::Message)?;
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        match request.framing().map_err(Rejection::Message)? {
            Framing::Complete { .. } | Framing::Unbounded => return Ok(request),
            Framing::AwaitingHeaders | Framing::AwaitingBody { .. } => {}
        }

        let n = match tokio::time::timeout(settings.client_read_timeout, client.read(&mut chunk)).await {
            Err(_) => return Err(Rejection::ClientTimeout),
            Ok(Err(_)) | Ok(Ok(0)) => return Err(Rejection::ClientClosed),
            Ok(Ok(n)) => n,
        };
        request.extend(&chunk[..n]).map_err(Rejection::Message)?;
    }
}

fn route(request: &MessageBuffer) -> Result<(), Rejection> {
    let line: RequestLine = request.request_line().ok_or(Rejection::MalformedRequestLine)?;
    tracing::debug!(method = %line.method, path = %line.path, version = %line.version, "HTTP request");

    if line.is_login() {
        Ok(())
    } else {
        Err(Rejection::NoRoute {
            method: line.method,
            path: line.path,
        })
    }
}

/// Send `request` to the login backend and return its complete response.
async fn forward(request: &[u8], settings: &GatewaySettings) -> Result<Vec<u8>, GatewayError> {
    let mut backend = match tokio::time::timeout(settings.connect_timeout, TcpStream::connect(&settings.backend)).await {
        Err(_) => {
            metrics::record_connect_failure(Backend::HttpLogin);
            return Err(GatewayError::ConnectTimeout {
                addr: settings.backend.clone(),
            })
        }
        Ok(Err(source)) => {
            metrics::record_connect_failure(Backend::HttpLogin);
            return Err(GatewayError::Connect {
                addr: settings.backend.clone(),
                source,
            });
        }
        Ok(Ok(stream)) => stream,
    };

    backend.write_all(request).await.map_err(GatewayError::Send)?;
    let response = read_response(&mut backend, settings).await?;
    // Dropping the stream closes the backend connection.
    drop(backend);
    Ok(response)
}

/// Read a response using `Content-Length` framing, or the idle rule when the
/// length is absent.
async fn read_response<R>(backend: &mut R, settings: &GatewaySettings) -> Result<Vec<u8>, GatewayError>
where
    R: AsyncRead + Unpin,
{
    let mut response = MessageBuffer::new(settings.max_message_bytes);
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let framing = response.framing()?;
        if let Framing::Complete { len } = framing {
            response.truncate(len);
            return Ok(response.into_bytes());
        }

        let wait = match framing {
            Framing::Unbounded => settings.response_idle,
            _ => settings.backend_read_timeout,
        };

        let n = match tokio::time::timeout(wait, backend.read(&mut chunk)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(GatewayError::Receive(e)),
            Err(_) if framing == Framing::Unbounded => {
                tracing::debug!(
                    bytes = response.len(),
                    "Response without Content-Length went idle, assuming complete"
                );
                return Ok(response.into_bytes());
            }
            Err(_) => return Err(GatewayError::ReceiveTimeout),
        };

        if n == 0 {
            return match framing {
                Framing::Unbounded => Ok(response.into_bytes()),
                _ => Err(GatewayError::Incomplete {
                    received: response.len(),
                }),
            };
        }
        response.extend(&chunk[..n])?;
    }
}

/// Status code from an `HTTP/x.y NNN ...` status line.
fn status_code(response: &[u8]) -> Option<u16> {
    let line_end = response.iter().position(|b| *b == b'\r')?;
    let line = std::str::from_utf8(&response[..line_end]).ok()?;
    line.split(' ').nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tokio::net::TcpListener;

    fn settings(backend: String) -> GatewaySettings {
        GatewaySettings {
            backend,
            connect_timeout: Duration::from_secs(1),
            client_read_timeout: Duration::from_millis(200),
            backend_read_timeout: Duration::from_secs(1),
            response_idle: Duration::from_millis(50),
            max_message_bytes: 64 * 1024,
        }
    }

    /// Backend that reads one request and writes `response` verbatim.
    async fn one_shot_backend(response: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response).await;
            // Keep the socket open so only framing can end the read.
            tokio::time::sleep(Duration::from_secs(2)).await;
        });
        addr
    }

    async fn run(initial: &[u8], rest: &[u8], settings: &GatewaySettings) -> (GatewayOutcome, Vec<u8>) {
        let (mut outer, mut inner) = duplex(64 * 1024);
        outer.write_all(rest).await.unwrap();
        let outcome = handle_http(initial, &mut inner, settings).await.unwrap();
        drop(inner);
        let mut reply = Vec::new();
        outer.read_to_end(&mut reply).await.unwrap();
        (outcome, reply)
    }

    #[test]
    fn status_line_parsing() {
        assert_eq!(status_code(b"HTTP/1.1 200 OK\r\n\r\n"), Some(200));
        assert_eq!(status_code(b"HTTP/1.0 302 Found\r\n"), Some(302));
        assert_eq!(status_code(b"garbage"), None);
    }

    #[tokio::test]
    async fn unrouted_path_gets_local_404() {
        // Port 9 on localhost is not listening; it must never be contacted.
        let settings = settings("127.0.0.1:9".into());
        let (outcome, reply) = run(b"GET /status HTTP/1.1\r\nHost: x\r\n\r\n", b"", &settings).await;

        assert!(matches!(
            outcome,
            GatewayOutcome::Rejected(Rejection::NoRoute { ref path, .. }) if path == "/status"
        ));
        assert_eq!(reply, NOT_FOUND.to_bytes());
    }

    #[tokio::test]
    async fn malformed_request_line_gets_404() {
        let settings = settings("127.0.0.1:9".into());
        let (outcome, reply) = run(b"POST /login.php\r\n\r\n", b"", &settings).await;
        assert!(matches!(outcome, GatewayOutcome::Rejected(Rejection::MalformedRequestLine)));
        assert_eq!(reply, NOT_FOUND.to_bytes());
    }

    #[tokio::test]
    async fn login_response_is_bounded_by_content_length() {
        let backend = one_shot_backend(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello").await;
        let settings = settings(backend);

        let (outcome, reply) = run(
            b"POST /login.php HTTP/1.1\r\nContent-Length: 4\r\n\r\n",
            b"user",
            &settings,
        )
        .await;

        assert!(matches!(outcome, GatewayOutcome::Forwarded { status: Some(200), bytes: 43 }));
        assert_eq!(reply, b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello");
    }

    #[tokio::test]
    async fn response_without_length_ends_on_idle() {
        let backend = one_shot_backend(b"HTTP/1.0 200 OK\r\n\r\n{\"ok\":true}").await;
        let settings = settings(backend);

        let (outcome, reply) = run(b"POST /login.php HTTP/1.1\r\n\r\n", b"", &settings).await;
        assert!(matches!(outcome, GatewayOutcome::Forwarded { status: Some(200), .. }));
        assert_eq!(reply, b"HTTP/1.0 200 OK\r\n\r\n{\"ok\":true}");
    }

    #[tokio::test]
    async fn unreachable_backend_gets_500() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let settings = settings(addr);
        let (outcome, reply) = run(b"POST /login.php HTTP/1.1\r\n\r\n", b"", &settings).await;
        assert!(matches!(outcome, GatewayOutcome::Failed(GatewayError::Connect { .. })));
        assert_eq!(reply, INTERNAL_SERVER_ERROR.to_bytes());
    }

    #[tokio::test]
    async fn stalled_client_gets_404() {
        let settings = settings("127.0.0.1:9".into());
        let (mut outer, mut inner) = duplex(1024);
        let outcome = handle_http(b"POST /login.php HTTP/1.1\r\nContent-", &mut inner, &settings)
            .await
            .unwrap();
        assert!(matches!(outcome, GatewayOutcome::Rejected(Rejection::ClientTimeout)));

        drop(inner);
        let mut reply = Vec::new();
        outer.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, NOT_FOUND.to_bytes());
    }
}
