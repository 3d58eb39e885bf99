use thiserror::Error;

/// Cache configuration errors.
///
/// Misses, deletes of absent keys and patterns that match nothing are not
/// errors; only misconfigured call sites end up here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("invalid TTL of {secs}s: {reason}")]
    InvalidTtl { secs: u64, reason: &'static str },

    #[error("invalid cache pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl CacheError {
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}
