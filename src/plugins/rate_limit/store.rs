//! In-memory quota store.
//!
//! # Design Decisions
//! - One `RwLock` per store; reads (`get`, `len`) share it
//! - The whole allow/deny decision happens under a single write lock, so two
//!   requests racing on an expired window cannot both start a new one
//! - Expired entries stay until the cleaner sweeps them

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::time::Instant;

use crate::plugins::rate_limit::limit::{Limit, Period};

/// Result of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    /// Quota left in the current window, never negative.
    pub remaining: i64,
}

/// Outcome of one sweep over a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub deleted: usize,
    pub total: usize,
}

#[derive(Debug)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Limit>>,
    quota: i64,
    period: Period,
}

impl MemoryStore {
    /// A non-positive `quota` is replaced by the period's default.
    pub fn new(quota: i64, period: Period) -> Self {
        let quota = if quota <= 0 { period.default_quota() } else { quota };
        Self {
            entries: RwLock::new(HashMap::new()),
            quota,
            period,
        }
    }

    pub fn quota(&self) -> i64 {
        self.quota
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn get(&self, key: &str) -> Option<Limit> {
        self.entries
            .read()
            .expect("limiter store lock poisoned")
            .get(key)
            .copied()
    }

    pub fn upsert(&self, key: impl Into<String>, limit: Limit) {
        self.entries
            .write()
            .expect("limiter store lock poisoned")
            .insert(key.into(), limit);
    }

    pub fn is_allowed(&self, key: &str) -> Verdict {
        self.is_allowed_at(key, Instant::now())
    }

    /// Consume one unit of `key`'s quota, opening a new window when there is
    /// none or the current one is over.
    pub fn is_allowed_at(&self, key: &str, now: Instant) -> Verdict {
        let mut entries = self.entries.write().expect("limiter store lock poisoned");

        match entries.get_mut(key) {
            Some(limit) if !limit.is_expired_at(now) => {
                if limit.is_exhausted() {
                    return Verdict {
                        allowed: false,
                        remaining: limit.left.max(0),
                    };
                }
                limit.left -= 1;
                Verdict {
                    allowed: true,
                    remaining: limit.left,
                }
            }
            _ => {
                let mut limit = Limit::starting_at(now, self.period, self.quota);
                limit.left -= 1;
                entries.insert(key.to_string(), limit);
                Verdict {
                    allowed: true,
                    remaining: limit.left,
                }
            }
        }
    }

    pub fn sweep(&self) -> SweepStats {
        self.sweep_at(Instant::now())
    }

    /// Delete every entry whose window is over.
    pub fn sweep_at(&self, now: Instant) -> SweepStats {
        let mut entries = self.entries.write().expect("limiter store lock poisoned");
        let total = entries.len();
        entries.retain(|_, limit| !limit.is_expired_at(now));
        SweepStats {
            deleted: total - entries.len(),
            total,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("limiter store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
