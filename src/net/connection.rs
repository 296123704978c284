//! Connection lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count live connections
//! - Broadcast the drain signal to every connection task
//! - Let the server wait until the last connection is gone

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::observability::metrics;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

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

/// Tracks live connections for graceful shutdown.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<watch::Sender<usize>>,
    drain: Arc<watch::Sender<bool>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (active, _) = watch::channel(0);
        let (drain, _) = watch::channel(false);
        Self {
            active: Arc::new(active),
            drain: Arc::new(drain),
        }
    }

    /// Record a new connection. The returned guard un-records it on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active.send_modify(|count| *count += 1);
        metrics::set_active_connections(*self.active.borrow());
        ConnectionGuard {
            active: Arc::clone(&self.active),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> usize {
        *self.active.borrow()
    }

    /// Ask every connection to finish its in-flight requests and close.
    pub fn drain(&self) {
        self.drain.send_replace(true);
    }

    pub fn is_draining(&self) -> bool {
        *self.drain.borrow()
    }

    pub fn drain_signal(&self) -> DrainSignal {
        DrainSignal {
            rx: self.drain.subscribe(),
        }
    }

    /// Resolve once no connection is tracked.
    pub async fn wait_idle(&self) {
        let mut rx = self.active.subscribe();
        // the sender lives in `self`, so this cannot fail while we wait
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-connection view of the drain signal.
#[derive(Debug, Clone)]
pub struct DrainSignal {
    rx: watch::Receiver<bool>,
}

impl DrainSignal {
    /// Resolve once draining has started.
    pub async fn recv(&mut self) {
        if self.rx.wait_for(|draining| *draining).await.is_err() {
            // tracker dropped: nothing will ever drain this connection
            std::future::pending::<()>().await;
        }
    }
}

/// Guard that tracks a connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<watch::Sender<usize>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|count| *count = count.saturating_sub(1));
        metrics::set_active_connections(*self.active.borrow());
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
