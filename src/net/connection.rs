//! Session registry and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track every live client session with its peer and classification
//! - Hand each session a cancellation token derived from the registry
//! - Let shutdown cancel all sessions and wait for them to drain

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::net::listener::SessionSlot;
use crate::observability::metrics;
use crate::routing::Protocol;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Registry entry for one client session.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub peer: SocketAddr,
    pub accepted_at: Instant,
    /// Unset until the priming chunk has been sniffed.
    pub protocol: Option<Protocol>,
}

/// Read-only view of a session, used for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub protocol: Option<Protocol>,
    pub age: Duration,
}

/// Returned by [`ConnectionRegistry::wait_for_drain`] when sessions outlive the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainTimeout {
    pub remaining: usize,
}

impl std::fmt::Display for DrainTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} sessions still open after drain deadline", self.remaining)
    }
}

impl std::error::Error for DrainTimeout {}

/// Tracks open client sessions for graceful shutdown.
///
/// The live count is published through a watch channel so waiting for drain
/// does not poll.
#[derive(Debug)]
pub struct ConnectionRegistry {
    sessions: DashMap<ConnectionId, SessionInfo>,
    /// Parent of every session token.
    root: CancellationToken,
    live_tx: watch::Sender<usize>,
}

impl ConnectionRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        let (live_tx, _) = watch::channel(0);
        Self {
            sessions: DashMap::new(),
            root: CancellationToken::new(),
            live_tx,
        }
    }

    /// Record a new client session. The returned guard owns `slot` and
    /// deregisters on drop, freeing the slot at the same moment.
    ///
    /// Sessions registered after [`cancel_all`](Self::cancel_all) receive an
    /// already-cancelled token.
    pub fn register(self: &Arc<Self>, peer: SocketAddr, slot: SessionSlot) -> SessionGuard {
        let id = ConnectionId::new();
        let cancel = self.root.child_token();
        self.sessions.insert(
            id,
            SessionInfo {
                peer,
                accepted_at: Instant::now(),
                protocol: None,
            },
        );
        self.live_tx.send_modify(|live| *live += 1);
        metrics::session_opened();

        tracing::trace!(connection_id = %id, peer_addr = %peer, "Session registered");

        SessionGuard {
            registry: Arc::clone(self),
            id,
            cancel,
            _slot: slot,
        }
    }

    fn deregister(&self, id: ConnectionId) {
        if self.sessions.remove(&id).is_some() {
            self.live_tx.send_modify(|live| *live -= 1);
            metrics::session_closed();
            tracing::trace!(connection_id = %id, "Session deregistered");
        }
    }

    /// Record the classification result for a session.
    pub fn set_protocol(&self, id: ConnectionId, protocol: Protocol) {
        if let Some(mut entry) = self.sessions.get_mut(&id) {
            entry.protocol = Some(protocol);
        }
    }

    /// Get current active session count.
    pub fn active_count(&self) -> usize {
        *self.live_tx.borrow()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Current sessions, oldest first.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let mut sessions: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| SessionSnapshot {
                id: *entry.key(),
                peer: entry.peer,
                protocol: entry.protocol,
                age: entry.accepted_at.elapsed(),
            })
            .collect();
        sessions.sort_by_key(|s| std::cmp::Reverse(s.age));
        sessions
    }

    /// Cancel every registered session and any registered later.
    pub fn cancel_all(&self) {
        self.root.cancel();
    }

    /// Wait until every session has deregistered, optionally bounded.
    pub async fn wait_for_drain(&self, deadline: Option<Duration>) -> Result<(), DrainTimeout> {
        let mut live_rx = self.live_tx.subscribe();
        let drained = live_rx.wait_for(|live| *live == 0);

        match deadline {
            None => {
                // The sender lives in `self`, so the channel cannot close here.
                let _ = drained.await;
                Ok(())
            }
            Some(limit) => match tokio::time::timeout(limit, drained).await {
                Ok(_) => Ok(()),
                Err(_) => Err(DrainTimeout {
                    remaining: self.active_count(),
                }),
            },
        }
    }

    /// Cancel all sessions, then wait for them to drain.
    pub async fn shutdown(&self, deadline: Option<Duration>) -> Result<(), DrainTimeout> {
        let active = self.active_count();
        tracing::info!(active_sessions = active, "Cancelling client sessions");
        for session in self.snapshot() {
            tracing::debug!(
                connection_id = %session.id,
                peer_addr = %session.peer,
                protocol = ?session.protocol,
                age_ms = session.age.as_millis() as u64,
                "Cancelling session"
            );
        }

        self.cancel_all();
        self.wait_for_drain(deadline).await
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a session's lifetime.
/// Removes the session from the registry and returns its listener slot when
/// dropped.
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
    cancel: CancellationToken,
    _slot: SessionSlot,
}

impl SessionGuard {
    /// Get this session's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Token cancelled when shutdown begins.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn set_protocol(&self, protocol: Protocol) {
        self.registry.set_protocol(self.id, protocol);
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Semaphore;

    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn slot() -> SessionSlot {
        SessionSlot::new(Arc::new(Semaphore::new(1)).try_acquire_owned().unwrap())
    }

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn registry_counts() {
        let registry = Arc::new(ConnectionRegistry::new());
        assert_eq!(registry.active_count(), 0);

        let guard1 = registry.register(peer(), slot());
        assert_eq!(registry.active_count(), 1);

        let guard2 = registry.register(peer(), slot());
        assert_eq!(registry.active_count(), 2);

        drop(guard1);
        assert_eq!(registry.active_count(), 1);

        drop(guard2);
        assert_eq!(registry.active_count(), 0);
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn dropping_guard_frees_listener_slot() {
        let registry = Arc::new(ConnectionRegistry::new());
        let pool = Arc::new(Semaphore::new(1));
        let slot = SessionSlot::new(Arc::clone(&pool).try_acquire_owned().unwrap());

        let guard = registry.register(peer(), slot);
        assert_eq!(pool.available_permits(), 0);

        drop(guard);
        assert_eq!(pool.available_permits(), 1);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn classification_is_recorded() {
        let registry = Arc::new(ConnectionRegistry::new());
        let guard = registry.register(peer(), slot());
        assert_eq!(registry.snapshot()[0].protocol, None);

        guard.set_protocol(Protocol::Login);
        let snapshot = registry.snapshot();
        assert_eq!(snapshot[0].id, guard.id());
        assert_eq!(snapshot[0].protocol, Some(Protocol::Login));
    }

    #[test]
    fn cancel_all_reaches_existing_and_future_sessions() {
        let registry = Arc::new(ConnectionRegistry::new());
        let before = registry.register(peer(), slot());
        assert!(!before.cancellation().is_cancelled());

        registry.cancel_all();
        assert!(registry.is_shutting_down());
        assert!(before.cancellation().is_cancelled());

        let after = registry.register(peer(), slot());
        assert!(after.cancellation().is_cancelled());
    }

    #[tokio::test]
    async fn drain_completes_when_guards_drop() {
        let registry = Arc::new(ConnectionRegistry::new());
        let guards: Vec<_> = (0..3).map(|_| registry.register(peer(), slot())).collect();

        for guard in guards {
            let token = guard.cancellation().clone();
            tokio::spawn(async move {
                token.cancelled().await;
                drop(guard);
            });
        }

        registry
            .shutdown(Some(Duration::from_secs(2)))
            .await
            .expect("sessions should drain");
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn drain_times_out_with_stuck_session() {
        let registry = Arc::new(ConnectionRegistry::new());
        let _stuck = registry.register(peer(), slot());

        let err = registry
            .shutdown(Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert_eq!(err.remaining, 1);
    }

    #[tokio::test]
    async fn empty_registry_drains_immediately() {
        let registry = ConnectionRegistry::new();
        registry.wait_for_drain(None).await.unwrap();
    }
}
