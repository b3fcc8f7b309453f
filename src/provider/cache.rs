//! LRU cache of providers known to have verified data.
//!
//! Verified records are only ever added by the external verification pipeline,
//! so a positive lookup stays valid and can skip the verified-store read on
//! later submissions. Negative lookups are never cached.

use super::types::ProviderId;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default cache capacity (100,000 entries, roughly 3.2MB).
pub const DEFAULT_CACHE_CAPACITY: usize = 100_000;

/// Cache of provider ids found in the verified store.
///
/// Clones share entries and counters. A capacity of zero disables caching;
/// lookups are then always misses.
#[derive(Clone)]
pub struct KnownProviderCache {
    entries: Option<Arc<Mutex<LruCache<ProviderId, ()>>>>,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    additions: AtomicU64,
}

/// Snapshot of cache counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that fell through to the verified store.
    pub misses: u64,
    /// Providers remembered.
    pub additions: u64,
}

impl CacheStats {
    /// Share of lookups answered from the cache, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            total => self.hits as f64 * 100.0 / total as f64,
        }
    }
}

impl KnownProviderCache {
    /// Cache with [`DEFAULT_CACHE_CAPACITY`] entries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Cache holding at most `capacity` providers.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity)
                .map(|cap| Arc::new(Mutex::new(LruCache::new(cap)))),
            counters: Arc::default(),
        }
    }

    /// Whether the provider is known to have verified data.
    pub fn contains(&self, provider: &ProviderId) -> bool {
        let found = self
            .entries
            .as_ref()
            .is_some_and(|entries| entries.lock().get(provider).is_some());

        let counter = if found {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);

        found
    }

    /// Remember a provider that was found in the verified store.
    pub fn insert(&self, provider: ProviderId) {
        if let Some(entries) = &self.entries {
            entries.lock().put(provider, ());
            self.counters.additions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            additions: self.counters.additions.load(Ordering::Relaxed),
        }
    }

    /// Number of cached providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |entries| entries.lock().len())
    }

    /// Whether no provider is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for KnownProviderCache {
    fn default() -> Self {
        Self::new()
    }
}
