//! Memoized scan results
//!
//! Keyed by `(store identity, pattern, batch size)`. Results are served as-is
//! until evicted, so cached context is eventually consistent with the store,
//! never live. Wrapped in a Mutex because `LruCache` needs exclusive access
//! even for reads (to update LRU order); the lock is never held across I/O.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Retrieved `(key, value)` pairs in scan order
pub type Entries = Arc<Vec<(String, String)>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanKey {
    pub store: String,
    pub pattern: String,
    pub batch_size: usize,
}

impl ScanKey {
    pub fn new(store: &str, pattern: &str, batch_size: usize) -> Self {
        Self {
            store: store.to_string(),
            pattern: pattern.to_string(),
            batch_size,
        }
    }
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Bounded LRU cache of scan results
pub struct ScanCache {
    inner: Mutex<LruCache<ScanKey, Entries>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ScanCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Build a cache, or `None` when `capacity` is zero (memoization off).
    pub fn with_capacity(capacity: usize) -> Option<Self> {
        NonZeroUsize::new(capacity).map(Self::new)
    }

    /// Look up and mark as most recently used
    pub fn get(&self, key: &ScanKey) -> Option<Entries> {
        let found = self.inner.lock().get(key).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Insert, evicting the least recently used entry when full.
    /// A concurrent insert for the same key simply replaces the value.
    pub fn insert(&self, key: ScanKey, entries: Entries) {
        self.inner.lock().put(key, entries);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.len(),
            capacity: inner.cap().get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
