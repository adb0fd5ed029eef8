//! Per-order mutual exclusion.
//!
//! Locks live in a `moka` cache keyed by the order's storage key. Entries
//! idle for longer than [`LOCK_IDLE_TTL`] are evicted; a guard keeps its
//! mutex alive through its own `Arc`, and the TTL is far longer than any
//! gateway round trip, so eviction never races a held lock in practice.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// How long an unused lock entry is kept.
const LOCK_IDLE_TTL: Duration = Duration::from_secs(10 * 60);

/// Upper bound on tracked lock entries.
const MAX_LOCK_ENTRIES: u64 = 100_000;

/// Exclusive access to one order, released on drop.
pub type OrderGuard = OwnedMutexGuard<()>;

pub(super) struct OrderLocks {
    locks: Cache<String, Arc<Mutex<()>>>,
}

impl OrderLocks {
    pub(super) fn new() -> Self {
        Self {
            locks: Cache::builder()
                .max_capacity(MAX_LOCK_ENTRIES)
                .time_to_idle(LOCK_IDLE_TTL)
                .build(),
        }
    }

    pub(super) async fn acquire(&self, key: &str) -> OrderGuard {
        let mutex = self
            .locks
            .get_with(key.to_owned(), || Arc::new(Mutex::new(())));
        mutex.lock_owned().await
    }
}
