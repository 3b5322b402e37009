//! Bidirectional byte relay between a client and a backend.
//!
//! # Responsibilities
//! - Pump bytes client → backend and backend → client concurrently
//! - Stop both directions as soon as either one ends
//! - Shut down both write sides so no half-open socket is left behind
//!
//! # Design Decisions
//! - No payload inspection; this layer knows nothing about protocols
//! - No retry: a transport error on either leg ends the relay
//! - Byte order per direction is preserved (single reader, single writer)

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::observability::metrics;

/// Default chunk size for each pump.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Which pump finished first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToBackend,
    BackendToClient,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToBackend => "client_to_backend",
            Direction::BackendToClient => "backend_to_client",
        }
    }
}

/// Summary of a finished relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub client_to_backend: u64,
    pub backend_to_client: u64,
    /// The direction whose pump ended the relay.
    pub closed_by: Direction,
}

/// Error type for relay failures.
#[derive(Debug)]
pub struct RelayError {
    pub direction: Direction,
    pub source: std::io::Error,
    /// Bytes moved before the failure, as (client→backend, backend→client).
    pub transferred: (u64, u64),
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "relay {} failed: {}", self.direction.as_str(), self.source)
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Relay bytes between `client` and `backend` until either side stops.
///
/// When one pump finishes (peer EOF or I/O error) the other is dropped
/// mid-flight and both write sides are shut down.
pub async fn relay<C, B>(client: C, backend: B, chunk_size: usize) -> Result<RelayStats, RelayError>
where
    C: AsyncRead + AsyncWrite + Send,
    B: AsyncRead + AsyncWrite + Send,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut backend_read, mut backend_write) = tokio::io::split(backend);
    let mut upstream = 0u64;
    let mut downstream = 0u64;

    let (direction, result) = {
        let client_to_backend = pump(&mut client_read, &mut backend_write, chunk_size, &mut upstream);
        let backend_to_client = pump(&mut backend_read, &mut client_write, chunk_size, &mut downstream);
        tokio::pin!(client_to_backend);
        tokio::pin!(backend_to_client);

        tokio::select! {
            res = &mut client_to_backend => (Direction::ClientToBackend, res),
            res = &mut backend_to_client => (Direction::BackendToClient, res),
        }
    };

    let _ = backend_write.shutdown().await;
    let _ = client_write.shutdown().await;

    metrics::record_relay_bytes(Direction::ClientToBackend, upstream);
    metrics::record_relay_bytes(Direction::BackendToClient, downstream);

    match result {
        Ok(()) => Ok(RelayStats {
            client_to_backend: upstream,
            backend_to_client: downstream,
            closed_by: direction,
        }),
        Err(source) => Err(RelayError {
            direction,
            source,
            transferred: (upstream, downstream),
        }),
    }
}

/// Copy from `reader` to `writer` until EOF, counting into `transferred`.
async fn pump<R, W>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    transferred: &mut u64,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *transferred += n as u64;
    }
}
