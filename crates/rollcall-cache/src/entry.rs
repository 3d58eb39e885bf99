use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;

use crate::ttl::Ttl;

/// A cached response body with its expiry.
///
/// The body is wrapped in `Arc` so hits hand out a cheap clone instead of
/// copying the computed view.
#[derive(Clone, Debug)]
pub struct CacheEntry {
    value: Arc<Value>,
    created_at: OffsetDateTime,
    ttl: Ttl,
}

impl CacheEntry {
    pub fn new(value: Arc<Value>, created_at: OffsetDateTime, ttl: Ttl) -> Self {
        Self {
            value,
            created_at,
            ttl,
        }
    }

    pub fn value(&self) -> Arc<Value> {
        Arc::clone(&self.value)
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.created_at + self.ttl.as_duration()
    }

    /// An entry is logically gone once `now` reaches its expiry, whether or
    /// not it has been swept yet.
    #[inline]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at()
    }
}
