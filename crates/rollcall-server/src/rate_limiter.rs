//! Per-user token bucket.

use std::time::Instant;

use dashmap::DashMap;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    capacity: f64,
    refill_per_sec: f64,
}

impl RateLimiter {
    pub fn new(cfg: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity: f64::from(cfg.capacity),
            refill_per_sec: cfg.refill_per_sec,
        }
    }

    /// Take one token from `key`'s bucket. Returns false when it is empty.
    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.capacity,
            last_refill: now,
        });
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets that have refilled to capacity.
    ///
    /// A full bucket behaves exactly like a missing one, so removing it only
    /// releases memory. Run periodically to keep the map bounded by the users
    /// active within one refill window.
    pub fn prune_idle(&self) -> usize {
        self.prune_idle_at(Instant::now())
    }

    fn prune_idle_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets.retain(|_, bucket| {
            let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
            bucket.tokens + elapsed * self.refill_per_sec < self.capacity
        });
        before.saturating_sub(self.buckets.len())
    }

    pub fn tracked_users(&self) -> usize {
        self.buckets.len()
    }

    /// Seconds until `key` has a token again.
    pub fn retry_after_secs(&self, key: &str) -> u64 {
        let missing = self
            .buckets
            .get(key)
            .map(|b| (1.0 - b.tokens).max(0.0))
            .unwrap_or(0.0);
        (missing / self.refill_per_sec).ceil().max(1.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(capacity: u32, refill_per_sec: f64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            capacity,
            refill_per_sec,
        })
    }

    #[test]
    fn bucket_drains_then_refills() {
        let limiter = limiter(2, 1.0);
        let start = Instant::now();
        assert!(limiter.allow_at("t-1", start));
        assert!(limiter.allow_at("t-1", start));
        assert!(!limiter.allow_at("t-1", start));
        assert!(limiter.allow_at("t-1", start + Duration::from_secs(1)));
    }

    #[test]
    fn buckets_are_per_user() {
        let limiter = limiter(1, 0.5);
        let now = Instant::now();
        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
        assert_eq!(limiter.retry_after_secs("a"), 2);
    }

    #[test]
    fn prune_drops_only_refilled_buckets() {
        let limiter = limiter(2, 1.0);
        let start = Instant::now();
        assert!(limiter.allow_at("idle", start));
        assert!(limiter.allow_at("busy", start + Duration::from_secs(5)));
        assert!(limiter.allow_at("busy", start + Duration::from_secs(5)));
        assert_eq!(limiter.tracked_users(), 2);

        // "idle" has been refilled for a while, "busy" is still empty
        let removed = limiter.prune_idle_at(start + Duration::from_secs(5));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_users(), 1);

        // A pruned user starts again from a full bucket
        assert!(limiter.allow_at("idle", start + Duration::from_secs(5)));
        assert!(limiter.allow_at("idle", start + Duration::from_secs(5)));
        assert!(!limiter.allow_at("idle", start + Duration::from_secs(5)));
    }
}
