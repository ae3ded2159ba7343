//! Generic TTL-keyed cache with background eviction and usage counters.
//!
//! TTL rather than LRU: catalog metadata changes rarely, so staleness is
//! the dominant concern, not memory pressure. A fixed sweep interval
//! trades a little CPU for bounded memory without a size-based policy.
//!
//! Expiry is lazy on read — an entry past its TTL is treated as absent
//! (and counted as a miss) even before the sweeper has physically removed
//! it. The sweeper is a tokio task owned by the cache and aborted on drop,
//! so it never outlives the cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

/// Snapshot of cache counters. Counters are monotonic between calls to
/// [`MetadataCache::clear`], which resets them to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries physically removed, whether by the sweeper or lazily on read.
    pub evictions: u64,
    /// Current entry count, including not-yet-swept expired entries.
    pub entries: usize,
}

struct Entry<V> {
    value: V,
    inserted: Instant,
}

struct Inner<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V> Inner<V> {
    fn sweep(&self) {
        let mut entries = match self.entries.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = entries.len();
        let ttl = self.ttl;
        let now = Instant::now();
        entries.retain(|_, e| now.duration_since(e.inserted) < ttl);
        let removed = before - entries.len();
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            log::debug!("cache sweep evicted {removed} expired entries");
        }
    }
}

/// Key→value store with per-entry expiry and a background sweeper.
///
/// Must be constructed inside a tokio runtime (the sweeper is spawned at
/// construction). Clones of the handed-out values are cheap for the usage
/// here (ranked candidate lists), so `get` clones.
pub struct MetadataCache<V> {
    inner: Arc<Inner<V>>,
    sweeper: JoinHandle<()>,
}

impl<V: Clone + Send + 'static> MetadataCache<V> {
    /// Build a cache with an explicit TTL and sweep interval. The sweep
    /// interval is clamped to at most the TTL.
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        let inner = Arc::new(Inner {
            entries: Mutex::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        });

        let sweep_every = sweep_interval.min(ttl).max(Duration::from_millis(1));
        let sweep_target = Arc::downgrade(&inner);
        let sweeper = tokio::spawn(async move {
            let mut tick = tokio::time::interval(sweep_every);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; skip it.
            tick.tick().await;
            loop {
                tick.tick().await;
                match sweep_target.upgrade() {
                    Some(inner) => inner.sweep(),
                    None => break,
                }
            }
        });

        Self { inner, sweeper }
    }

    /// Build a cache with the conventional sweep cadence of TTL/6.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self::new(ttl, ttl / 6)
    }

    /// Look up a key. Expired entries are removed, counted as an eviction
    /// and a miss, and reported absent.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock_entries();
        match entries.get(key) {
            Some(e) if e.inserted.elapsed() < self.inner.ttl => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                Some(e.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.inner.evictions.fetch_add(1, Ordering::Relaxed);
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or replace a value, resetting its timestamp to now.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.lock_entries().insert(
            key.into(),
            Entry {
                value,
                inserted: Instant::now(),
            },
        );
    }

    /// Drop all entries and reset every counter to zero. The configured
    /// TTL is unchanged.
    pub fn clear(&self) {
        self.lock_entries().clear();
        self.inner.hits.store(0, Ordering::Relaxed);
        self.inner.misses.store(0, Ordering::Relaxed);
        self.inner.evictions.store(0, Ordering::Relaxed);
    }

    /// Counter snapshot reflecting all operations ordered before the call.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            entries: self.lock_entries().len(),
        }
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry<V>>> {
        match self.inner.entries.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<V> Drop for MetadataCache<V> {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get_hits() {
        let cache: MetadataCache<String> = MetadataCache::with_ttl(TTL);
        cache.set("k", "v".to_string());
        assert_eq!(cache.get("k"), Some("v".to_string()));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_set_is_miss() {
        let cache: MetadataCache<String> = MetadataCache::with_ttl(TTL);
        assert_eq!(cache.get("absent"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_miss_before_sweep() {
        // Sweep far out so only lazy expiry can fire.
        let cache: MetadataCache<u32> = MetadataCache::new(TTL, Duration::from_secs(3600));
        cache.set("k", 1);
        tokio::time::advance(TTL).await;
        assert_eq!(cache.get("k"), None);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_resets_timestamp() {
        let cache: MetadataCache<u32> = MetadataCache::new(TTL, Duration::from_secs(3600));
        cache.set("k", 1);
        tokio::time::advance(TTL / 2).await;
        cache.set("k", 2);
        tokio::time::advance(TTL / 2).await;
        // Half a TTL after the replace: still fresh.
        assert_eq!(cache.get("k"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_removes_without_reads() {
        let cache: MetadataCache<u32> = MetadataCache::new(TTL, TTL / 6);
        cache.set("k", 1);
        tokio::time::advance(TTL + TTL / 6).await;
        // Let the sweeper task run.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.evictions, 1);
        // Never read: no hit or miss recorded.
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_zeroes_stats_and_drops_keys() {
        let cache: MetadataCache<u32> = MetadataCache::with_ttl(TTL);
        cache.set("a", 1);
        cache.get("a");
        cache.get("b");
        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
        assert_eq!(cache.get("a"), None);
    }
}
