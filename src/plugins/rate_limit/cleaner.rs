//! Background eviction of expired limiter entries.
//!
//! # Responsibilities
//! - Track every store created by limiter plugins
//! - Sweep them on a fixed period with at most one task
//! - Stop on shutdown
//!
//! # Design Decisions
//! - The sweep task holds a weak reference, dropping the cleaner ends it
//! - Stores are held weakly: a store lives as long as its route's limiter,
//!   dropped stores are pruned on the next sweep
//! - Stores are snapshotted before a sweep so registration never waits on it

use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::interval_at;

use crate::observability::metrics;
use crate::plugins::rate_limit::store::{MemoryStore, SweepStats};

pub const DEFAULT_CLEANUP_PERIOD: Duration = Duration::from_secs(60);

struct Inner {
    stores: Mutex<Vec<Weak<MemoryStore>>>,
    period: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    /// Live stores, forgetting the ones that were dropped.
    fn live_stores(&self) -> Vec<Arc<MemoryStore>> {
        let mut stores = self.stores.lock().expect("cleaner lock poisoned");
        let before = stores.len();
        stores.retain(|store| store.strong_count() > 0);
        if stores.len() < before {
            tracing::debug!(pruned = before - stores.len(), "Dropped limiter stores pruned");
        }
        stores.iter().filter_map(Weak::upgrade).collect()
    }

    fn sweep_all(&self) -> Vec<SweepStats> {
        let stores = self.live_stores();
        let count = stores.len();

        stores
            .iter()
            .enumerate()
            .map(|(idx, store)| {
                let started = Instant::now();
                let stats = store.sweep();
                let elapsed = started.elapsed();

                tracing::info!(
                    store = %format!("{}/{}", idx + 1, count),
                    deleted = stats.deleted,
                    total = stats.total,
                    elapsed = ?elapsed,
                    "Limiter store swept"
                );
                metrics::record_cleanup(idx, stats.deleted, stats.total - stats.deleted, elapsed);
                stats
            })
            .collect()
    }
}

/// Shared handle to the limiter store cleaner.
#[derive(Clone)]
pub struct Cleaner {
    inner: Arc<Inner>,
}

impl Cleaner {
    pub fn new() -> Self {
        Self::with_period(DEFAULT_CLEANUP_PERIOD)
    }

    pub fn with_period(period: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                stores: Mutex::new(Vec::new()),
                period,
                task: Mutex::new(None),
            }),
        }
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }

    /// Track `store` without keeping it alive. Returns false if it was
    /// already tracked.
    pub fn register(&self, store: Arc<MemoryStore>) -> bool {
        let store = Arc::downgrade(&store);
        let mut stores = self.inner.stores.lock().expect("cleaner lock poisoned");
        if stores.iter().any(|s| Weak::ptr_eq(s, &store)) {
            tracing::debug!("Limiter store already tracked by cleaner");
            return false;
        }
        stores.push(store);
        true
    }

    /// Number of tracked stores that are still alive.
    pub fn store_count(&self) -> usize {
        self.inner
            .stores
            .lock()
            .expect("cleaner lock poisoned")
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .expect("cleaner lock poisoned")
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Spawn the sweep task. Returns false if one is already running.
    pub fn start(&self, mut shutdown: broadcast::Receiver<()>) -> bool {
        let mut task = self.inner.task.lock().expect("cleaner lock poisoned");
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            tracing::debug!("Cleaner already running");
            return false;
        }

        let period = self.inner.period;
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => match inner.upgrade() {
                        Some(inner) => {
                            inner.sweep_all();
                        }
                        None => break,
                    },
                    _ = shutdown.recv() => {
                        tracing::info!("Cleaner received shutdown");
                        break;
                    }
                }
            }
        }));

        tracing::info!(period = ?period, "Cleaner started");
        true
    }

    pub fn stop(&self) {
        if let Some(task) = self.inner.task.lock().expect("cleaner lock poisoned").take() {
            task.abort();
            tracing::info!("Cleaner stopped");
        }
    }

    /// Sweep every tracked store once.
    pub fn sweep_all(&self) -> Vec<SweepStats> {
        self.inner.sweep_all()
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cleaner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cleaner")
            .field("period", &self.inner.period)
            .field("stores", &self.store_count())
            .finish()
    }
}
