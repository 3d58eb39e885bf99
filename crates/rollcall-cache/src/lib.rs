//! Attendance response cache.
//!
//! ## Architecture
//!
//! - **Store** ([`LocalResponseCache`]): in-process `DashMap` of computed
//!   response bodies with per-entry expiry, checked lazily on read.
//! - **Keys** ([`CacheKeyBuilder`]): one composition rule for read keys and
//!   invalidation patterns, partitioned by the day the entry is created on.
//! - **Invalidation** ([`WriteInvalidator`]): after a committed write, drops
//!   the writer's own view and sweeps every other user's view of the same
//!   resource with a glob pattern.
//!
//! ## Key Format
//!
//! `date:{creation_day}:user:{user_id}:{normalized_path}[?{sorted_query}]`
//! e.g. `date:2025-09-07:user:t-12:/api/attendance/sections/7b/?date=2025-09-05`
//!
//! ## Graceful Degradation
//!
//! With caching disabled the [`NoOpResponseCache`] is used: every read is a
//! miss and callers always fall through to the authoritative store.

pub mod entry;
pub mod error;
pub mod invalidation;
pub mod keys;
pub mod pattern;
pub mod store;
pub mod ttl;

pub use entry::CacheEntry;
pub use error::CacheError;
pub use invalidation::{InvalidationReport, WriteInvalidator, WriteScope};
pub use keys::{CacheKeyBuilder, ResourceScope, normalize_path, normalize_query};
pub use pattern::GlobPattern;
pub use store::{
    CacheStats, LocalResponseCache, NoOpResponseCache, ResponseStore, create_response_cache,
};
pub use ttl::{Ttl, TtlPolicy, TtlTier};
