//! Built-in in-process cache store.
//!
//! # Responsibilities
//! - Map keys to JSON values with an expiry instant
//! - Evict expired entries lazily on read and in a background sweep
//! - Implement get-or-compute for the cache gate
//!
//! # Design Decisions
//! - `DashMap` shards locking, so concurrent requests never block each other
//!   for longer than one map operation
//! - Concurrent misses on the same key each run the factory; the last write
//!   wins (no single-flight)
//! - The sweep task starts on the first write, stops once the map is empty,
//!   and only holds a weak reference so dropping the store ends it
//! - Times come from `tokio::time` so tests can pause the clock

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;

use crate::error::HttpError;
use crate::observability::metrics;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires
    }
}

#[derive(Debug)]
struct Store {
    entries: DashMap<String, CacheEntry>,
    sweeping: AtomicBool,
    cleanup_interval: Duration,
}

/// Shared handle to the in-process cache. Clones share the same entries.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<Store>,
}

impl MemoryCache {
    pub fn new(cleanup_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Store {
                entries: DashMap::new(),
                sweeping: AtomicBool::new(false),
                cleanup_interval,
            }),
        }
    }

    /// Live value for `key`. An expired entry is evicted and reported as absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        {
            let entry = self.inner.entries.get(key)?;
            if entry.is_live(now) {
                return Some(entry.value.clone());
            }
        }
        self.inner.entries.remove_if(key, |_, entry| !entry.is_live(now));
        None
    }

    /// True if `key` holds a live value. Expired entries are evicted here too.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Store `value` for `ttl_secs` seconds. Non-positive TTLs store nothing.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl_secs: f64) {
        let Some(ttl) = ttl_duration(ttl_secs) else {
            return;
        };
        let now = Instant::now();
        // A TTL too large for the clock never expires in practice.
        let expires = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + Duration::from_secs(u32::MAX as u64));
        self.inner
            .entries
            .insert(key.into(), CacheEntry { value, expires });
        self.ensure_sweeper();
    }

    /// Remove `key`, returning whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.inner.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        purge(&self.inner)
    }

    /// Whether the background sweep is currently scheduled.
    pub fn is_sweeping(&self) -> bool {
        self.inner.sweeping.load(Ordering::Acquire)
    }

    /// Return the live value for `key`, or run `factory`, store its result
    /// and return it. With a non-positive TTL the store is bypassed.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, factory: F, ttl_secs: f64) -> Result<Value, HttpError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, HttpError>>,
    {
        if ttl_duration(ttl_secs).is_none() {
            metrics::record_cache_lookup("bypass");
            return factory().await;
        }

        if let Some(value) = self.get(key) {
            tracing::debug!(key, "Cache hit");
            metrics::record_cache_lookup("hit");
            return Ok(value);
        }

        tracing::debug!(key, "Cache miss");
        metrics::record_cache_lookup("miss");
        let value = factory().await?;
        self.set(key, value.clone(), ttl_secs);
        Ok(value)
    }

    fn ensure_sweeper(&self) {
        if self
            .inner
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // No runtime: rely on lazy eviction only.
            self.inner.sweeping.store(false, Ordering::Release);
            return;
        };

        let store = Arc::downgrade(&self.inner);
        let interval = self.inner.cleanup_interval;
        handle.spawn(sweep(store, interval));
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

async fn sweep(store: Weak<Store>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        let Some(store) = store.upgrade() else {
            return;
        };

        let removed = purge(&store);
        if removed > 0 {
            tracing::debug!(removed, remaining = store.entries.len(), "Swept expired cache entries");
        }

        if store.entries.is_empty() {
            store.sweeping.store(false, Ordering::Release);
            // A write may have raced the flag reset; take the sweep back if so.
            if store.entries.is_empty()
                || store
                    .sweeping
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
            {
                return;
            }
        }
    }
}

fn purge(store: &Store) -> usize {
    let now = Instant::now();
    let before = store.entries.len();
    store.entries.retain(|_, entry| entry.is_live(now));
    before.saturating_sub(store.entries.len())
}

fn ttl_duration(ttl_secs: f64) -> Option<Duration> {
    if ttl_secs.is_finite() && ttl_secs > 0.0 {
        Duration::try_from_secs_f64(ttl_secs).ok()
    } else {
        None
    }
}
