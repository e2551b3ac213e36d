//! Memoizing cache for expensive, idempotent computations.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::fingerprint::FingerprintBuilder;
use crate::store::ExpiringStore;
use crate::Fingerprint;

/// Hit and miss counters shared between cache handles.
#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Memoizes the results of computations keyed by a fingerprint.
///
/// On a miss the computation runs on the caller's task and its successful
/// result is stored. Failed computations are returned unchanged and never
/// cached.
///
/// There is no single-flight deduplication: when two callers miss on the
/// same key at the same time both run the computation and the last write
/// wins. Callers are therefore never blocked behind a slow peer, and the
/// cached computations are expected to be idempotent.
pub struct Cache<V> {
    store: ExpiringStore<String, V>,
    counters: Arc<Counters>,
    config: CacheConfig,
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            store: ExpiringStore::new(config.default_ttl),
            counters: Arc::new(Counters::default()),
            config,
        }
    }

    /// Get the cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Start a fingerprint for `function` using this cache's key prefix.
    pub fn fingerprint(&self, function: impl Into<String>) -> FingerprintBuilder {
        Fingerprint::builder(function).prefix(self.config.key_prefix.clone())
    }

    /// Return the cached value for `key`, or run `compute` and cache its
    /// result for `ttl` (the configured default when `None`).
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: impl AsRef<str>,
        ttl: Option<Duration>,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let key = key.as_ref();

        if let Some(value) = self.store.get(key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Cache hit");
            return Ok(value);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Cache miss, computing");

        let value = compute().await?;
        self.store.set(key.to_string(), value.clone(), ttl);
        Ok(value)
    }

    /// Get a live cached value.
    pub fn get(&self, key: impl AsRef<str>) -> Option<V> {
        self.store.get(key.as_ref())
    }

    /// Store a value directly.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        self.store.set(key.into(), value, ttl);
    }

    /// Drop a cached value. Returns whether it was present.
    pub fn invalidate(&self, key: impl AsRef<str>) -> bool {
        self.store.delete(key.as_ref())
    }

    /// Drop every cached value.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Number of live cached values (compacts the store).
    pub fn size(&self) -> usize {
        self.store.size()
    }

    /// Evict expired values and return how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let purged = self.store.purge_expired();
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
        }
        purged
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.store.raw_len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            counters: Arc::clone(&self.counters),
            config: self.config.clone(),
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Stored entries, including expired ones not yet evicted.
    pub size: usize,

    /// Lookups answered from the cache.
    pub hits: u64,

    /// Lookups that had to compute.
    pub misses: u64,
}
