//! The public port.
//!
//! Every protocol arrives on this one socket. The number of concurrent
//! client sessions is capped: each accepted stream comes with a
//! [`SessionSlot`], and once all slots are taken the accept loop parks and
//! further clients queue in the kernel backlog until a session ends.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

#[derive(Debug)]
pub enum ListenerError {
    /// `bind_address` is not a socket address.
    InvalidAddress(String),
    Bind(std::io::Error),
    /// A single accept failed; the socket itself is still usable.
    Accept(std::io::Error),
    /// The slot pool was closed; no further sessions can be admitted.
    Closed,
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::InvalidAddress(addr) => write!(f, "Invalid listen address '{}'", addr),
            ListenerError::Bind(e) => write!(f, "Cannot bind public port: {}", e),
            ListenerError::Accept(e) => write!(f, "Accept failed: {}", e),
            ListenerError::Closed => write!(f, "Session slots closed"),
        }
    }
}

impl std::error::Error for ListenerError {}

/// One admitted client connection.
#[derive(Debug)]
pub struct Incoming {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    /// Hand this to the registry; the slot frees when the session ends.
    pub slot: SessionSlot,
}

/// A claim on one of the `max_connections` session slots.
#[derive(Debug)]
pub struct SessionSlot {
    _permit: OwnedSemaphorePermit,
}

impl SessionSlot {
    pub(crate) fn new(permit: OwnedSemaphorePermit) -> Self {
        Self { _permit: permit }
    }
}

/// The bound public socket plus its session slot pool.
pub struct Listener {
    socket: TcpListener,
    slots: Arc<Semaphore>,
}

impl Listener {
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|_| ListenerError::InvalidAddress(config.bind_address.clone()))?;

        let socket = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let bound = socket.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %bound, session_slots = config.max_connections, "Public port bound");

        Ok(Self {
            socket,
            slots: Arc::new(Semaphore::new(config.max_connections)),
        })
    }

    /// Wait for a free slot, then for the next client.
    pub async fn accept(&self) -> Result<Incoming, ListenerError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, peer) = self.socket.accept().await.map_err(ListenerError::Accept)?;
        tracing::trace!(peer_addr = %peer, free_slots = self.slots.available_permits(), "Client admitted");

        Ok(Incoming {
            stream,
            peer,
            slot: SessionSlot::new(permit),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
