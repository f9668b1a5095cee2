//! Bounded memo of verb results.
//!
//! Entries are kept in an [`LruCache`] behind a single mutex. Inserting a new
//! key into a full cache evicts the least recently used entry, where both
//! lookups and inserts count as uses. Recency is a total order, so the victim
//! is always well defined. Independently of capacity, [`ResultCache::evict`]
//! drops entries older than the configured time-to-live.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::debug;

use crate::dispatch::Outcome;

const CACHE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cache");

#[derive(Debug, Clone)]
struct CachedOutcome {
    outcome: Outcome,
    inserted_at: Instant,
}

/// Capacity-limited, thread-safe result memo.
#[derive(Debug)]
pub struct ResultCache {
    entries: Mutex<LruCache<Vec<u8>, CachedOutcome>>,
    ttl: Duration,
}

impl ResultCache {
    /// Creates a cache holding at most `capacity` entries for up to `ttl`.
    ///
    /// A zero capacity is treated as one.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Returns the memoised outcome for `key`, marking it recently used.
    pub fn get(&self, key: &[u8]) -> Option<Outcome> {
        self.entries()
            .get(key)
            .map(|cached| cached.outcome.clone())
    }

    /// Stores `outcome` under `key`.
    ///
    /// Returns the key evicted to make room, if any. Replacing the value of an
    /// existing key evicts nothing.
    pub fn insert(&self, key: Vec<u8>, outcome: Outcome) -> Option<Vec<u8>> {
        let cached = CachedOutcome {
            outcome,
            inserted_at: Instant::now(),
        };
        let mut entries = self.entries();
        let replaced = entries.push(key.clone(), cached);
        drop(entries);

        let evicted = replaced
            .map(|(old_key, _)| old_key)
            .filter(|old_key| *old_key != key);
        if let Some(old_key) = &evicted {
            debug!(
                target: CACHE_TARGET,
                key = %String::from_utf8_lossy(old_key),
                "evicted least recently used entry"
            );
        }
        evicted
    }

    /// Drops every entry older than the time-to-live.
    ///
    /// Returns the number of entries removed.
    pub fn evict(&self) -> usize {
        self.evict_at(Instant::now())
    }

    pub(crate) fn evict_at(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let expired: Vec<Vec<u8>> = entries
            .iter()
            .filter(|(_, cached)| now.saturating_duration_since(cached.inserted_at) >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Number of memoised entries.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns true when nothing is memoised.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.entries().cap().get()
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<Vec<u8>, CachedOutcome>> {
        // Every mutation completes under the lock, so a poisoned guard still
        // holds a consistent map.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
