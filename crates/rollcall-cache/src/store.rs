//! Response store with lazy TTL eviction.
//!
//! [`ResponseStore`] abstracts the store so request handlers can run against
//! the in-memory [`LocalResponseCache`] or, when caching is disabled, the
//! always-missing [`NoOpResponseCache`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use rollcall_core::Clock;
use serde::Serialize;
use serde_json::Value;

use crate::entry::CacheEntry;
use crate::error::CacheError;
use crate::pattern::GlobPattern;
use crate::ttl::Ttl;

/// Default maximum number of cached responses.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

const CACHE_HITS_TOTAL: &str = "cache_hits_total";
const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
const CACHE_INVALIDATIONS_TOTAL: &str = "cache_invalidations_total";
const CACHE_ENTRIES: &str = "cache_entries";

/// Process-wide response store shared by request handlers.
///
/// Every operation is atomic on its own. `delete_matching` may interleave
/// with other operations key by key; a reader can observe a sweep in
/// progress.
pub trait ResponseStore: Send + Sync {
    /// Get a live value. Expired entries behave as absent and are removed.
    fn get(&self, key: &str) -> Option<Arc<Value>>;

    /// Insert or overwrite unconditionally (last write wins).
    fn set(&self, key: String, value: Arc<Value>, ttl: Ttl);

    /// Remove a single key. Returns whether it was present.
    fn delete(&self, key: &str) -> bool;

    /// Remove every key matching `pattern`. Returns the number removed.
    fn delete_matching(&self, pattern: &GlobPattern) -> usize;

    /// Compile `pattern` and remove every matching key.
    ///
    /// A malformed pattern is a caller bug and is reported, not ignored.
    fn delete_matching_str(&self, pattern: &str) -> Result<usize, CacheError> {
        let compiled = GlobPattern::compile(pattern)?;
        Ok(self.delete_matching(&compiled))
    }

    /// Drop every entry. Returns the number removed.
    fn clear(&self) -> usize;

    /// Eagerly remove expired entries.
    ///
    /// Called by the background sweeper; reads already evict lazily.
    fn cleanup_expired(&self) -> usize {
        0
    }

    /// Number of physically present entries, expired ones included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> CacheStats;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub enabled: bool,
    /// Number of entries currently in the cache.
    pub size: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because they expired.
    pub evictions: u64,
    /// Entries removed by explicit or pattern deletion.
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// In-memory response cache backed by `DashMap`.
pub struct LocalResponseCache {
    entries: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl LocalResponseCache {
    /// Create a cache holding at most `max_entries` responses.
    ///
    /// `clock` drives expiry; pass the same clock the calendar uses.
    pub fn new(clock: Arc<dyn Clock>, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            max_entries: max_entries.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    fn record_invalidations(&self, removed: usize) {
        if removed > 0 {
            self.invalidations
                .fetch_add(removed as u64, Ordering::Relaxed);
            metrics::counter!(CACHE_INVALIDATIONS_TOTAL).increment(removed as u64);
        }
    }
}

impl ResponseStore for LocalResponseCache {
    fn get(&self, key: &str) -> Option<Arc<Value>> {
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired_at(now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(CACHE_HITS_TOTAL).increment(1);
                tracing::debug!(key = %key, "cache hit");
                return Some(entry.value().value());
            }
            // Entry expired, remove it unless a concurrent set replaced it
            drop(entry);
            if self
                .entries
                .remove_if(key, |_, e| e.is_expired_at(now))
                .is_some()
            {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(CACHE_MISSES_TOTAL).increment(1);
        tracing::debug!(key = %key, "cache miss");
        None
    }

    fn set(&self, key: String, value: Arc<Value>, ttl: Ttl) {
        let now = self.clock.now();

        // Check size limit and cleanup if needed; overwrites are always allowed
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.cleanup_expired();

            if self.entries.len() >= self.max_entries {
                tracing::warn!(
                    max_entries = self.max_entries,
                    key = %key,
                    "response cache at capacity, skipping insertion"
                );
                return;
            }
        }

        tracing::debug!(key = %key, ttl_secs = ttl.as_secs(), "cache set");
        self.entries.insert(key, CacheEntry::new(value, now, ttl));
        metrics::gauge!(CACHE_ENTRIES).set(self.entries.len() as f64);
    }

    fn delete(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        self.record_invalidations(usize::from(removed));
        tracing::debug!(key = %key, removed, "cache delete");
        removed
    }

    fn delete_matching(&self, pattern: &GlobPattern) -> usize {
        if let Some(key) = pattern.literal_key() {
            return usize::from(self.delete(key));
        }

        let mut removed = 0;
        self.entries.retain(|key, _| {
            if pattern.is_match(key) {
                removed += 1;
                false
            } else {
                true
            }
        });

        self.record_invalidations(removed);
        metrics::gauge!(CACHE_ENTRIES).set(self.entries.len() as f64);
        tracing::debug!(pattern = %pattern, removed, "cache pattern delete");
        removed
    }

    fn clear(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, _| {
            removed += 1;
            false
        });
        self.record_invalidations(removed);
        metrics::gauge!(CACHE_ENTRIES).set(0.0);
        removed
    }

    fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            if entry.is_expired_at(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            metrics::gauge!(CACHE_ENTRIES).set(self.entries.len() as f64);
        }

        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: true,
            size: self.entries.len(),
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }
}

/// A no-op store for when caching is disabled: every read misses.
#[derive(Debug, Default)]
pub struct NoOpResponseCache;

impl ResponseStore for NoOpResponseCache {
    fn get(&self, _key: &str) -> Option<Arc<Value>> {
        None
    }

    fn set(&self, _key: String, _value: Arc<Value>, _ttl: Ttl) {}

    fn delete(&self, _key: &str) -> bool {
        false
    }

    fn delete_matching(&self, _pattern: &GlobPattern) -> usize {
        0
    }

    fn clear(&self) -> usize {
        0
    }

    fn len(&self) -> usize {
        0
    }

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Create the shared response store.
///
/// Returns the no-op store when caching is disabled so callers never need to
/// branch on configuration.
pub fn create_response_cache(
    enabled: bool,
    max_entries: usize,
    clock: Arc<dyn Clock>,
) -> Arc<dyn ResponseStore> {
    if enabled {
        Arc::new(LocalResponseCache::new(clock, max_entries))
    } else {
        tracing::info!("response cache disabled, every read goes to the store");
        Arc::new(NoOpResponseCache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::ManualClock;
    use serde_json::json;
    use std::time::Duration;
    use time::macros::datetime;

    fn setup() -> (Arc<ManualClock>, LocalResponseCache) {
        let clock = Arc::new(ManualClock::new(datetime!(2025-09-07 08:00:00 UTC)));
        let cache = LocalResponseCache::new(clock.clone(), 100);
        (clock, cache)
    }

    fn ttl(secs: u64) -> Ttl {
        Ttl::from_secs(secs).unwrap()
    }

    #[test]
    fn test_set_and_get() {
        let (_, cache) = setup();
        cache.set("k".into(), Arc::new(json!({"count": 1})), ttl(30));

        let value = cache.get("k").unwrap();
        assert_eq!(*value, json!({"count": 1}));

        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_hits_share_the_stored_body() {
        let (_, cache) = setup();
        let body = Arc::new(json!({"entries": []}));
        cache.set("k".into(), Arc::clone(&body), ttl(30));

        let first = cache.get("k").unwrap();
        let second = cache.get("k").unwrap();
        assert!(Arc::ptr_eq(&first, &body));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_miss() {
        let (_, cache) = setup();
        assert!(cache.get("nonexistent").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_expired_entry_is_lazily_evicted() {
        let (clock, cache) = setup();
        cache.set("k".into(), Arc::new(json!(1)), ttl(30));

        clock.advance(Duration::from_secs(29));
        assert!(cache.get("k").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_takes_new_ttl() {
        let (clock, cache) = setup();
        cache.set("k".into(), Arc::new(json!("v1")), ttl(300));
        cache.set("k".into(), Arc::new(json!("v2")), ttl(10));

        assert_eq!(*cache.get("k").unwrap(), json!("v2"));
        clock.advance(Duration::from_secs(10));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_, cache) = setup();
        cache.set("k".into(), Arc::new(json!(1)), ttl(30));

        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn test_delete_matching_counts_removed() {
        let (_, cache) = setup();
        for key in ["a:1", "a:2", "b:1"] {
            cache.set(key.into(), Arc::new(json!(key)), ttl(30));
        }

        let pattern = GlobPattern::compile("a:*").unwrap();
        assert_eq!(cache.delete_matching(&pattern), 2);
        assert_eq!(cache.delete_matching(&pattern), 0);
        assert!(cache.get("b:1").is_some());
    }

    #[test]
    fn test_delete_matching_literal_pattern() {
        let (_, cache) = setup();
        cache.set("a:1".into(), Arc::new(json!(1)), ttl(30));
        assert_eq!(cache.delete_matching_str("a:1").unwrap(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_delete_matching_str_rejects_malformed() {
        let (_, cache) = setup();
        assert!(matches!(
            cache.delete_matching_str(""),
            Err(CacheError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_clear() {
        let (_, cache) = setup();
        for i in 0..5 {
            cache.set(format!("k{i}"), Arc::new(json!(i)), ttl(30));
        }
        assert_eq!(cache.clear(), 5);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cleanup_expired() {
        let (clock, cache) = setup();
        cache.set("short".into(), Arc::new(json!(1)), ttl(30));
        cache.set("long".into(), Arc::new(json!(2)), ttl(300));

        clock.advance(Duration::from_secs(31));
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("long").is_some());
    }

    #[test]
    fn test_capacity_limit() {
        let clock = Arc::new(ManualClock::new(datetime!(2025-09-07 08:00:00 UTC)));
        let cache = LocalResponseCache::new(clock.clone(), 2);

        cache.set("k1".into(), Arc::new(json!(1)), ttl(30));
        cache.set("k2".into(), Arc::new(json!(2)), ttl(300));
        cache.set("k3".into(), Arc::new(json!(3)), ttl(30));
        assert!(cache.get("k3").is_none());

        // Overwrites still succeed at capacity
        cache.set("k1".into(), Arc::new(json!(10)), ttl(30));
        assert_eq!(*cache.get("k1").unwrap(), json!(10));

        // Expired entries make room
        clock.advance(Duration::from_secs(31));
        cache.set("k3".into(), Arc::new(json!(3)), ttl(30));
        assert!(cache.get("k3").is_some());
    }

    #[test]
    fn test_noop_cache_always_misses() {
        let cache = NoOpResponseCache;
        cache.set("k".into(), Arc::new(json!(1)), ttl(30));
        assert!(cache.get("k").is_none());
        assert!(!cache.delete("k"));
        assert_eq!(cache.delete_matching_str("*").unwrap(), 0);
        assert!(!cache.is_enabled());
        assert!(!cache.stats().enabled);
    }

    #[test]
    fn test_create_response_cache() {
        let clock = Arc::new(ManualClock::new(datetime!(2025-09-07 08:00:00 UTC)));
        assert!(create_response_cache(true, 10, clock.clone()).is_enabled());
        assert!(!create_response_cache(false, 10, clock).is_enabled());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 75,
            misses: 25,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 75.0).abs() < 0.001);
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < 0.001);
    }
}
