//! TTL values and the coarse tiers endpoints choose from.

use std::fmt;
use std::num::NonZeroU64;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Longest TTL accepted for a response (one week).
pub const MAX_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// A positive time-to-live in whole seconds.
///
/// A zero TTL cannot be constructed, so every value that reaches the store
/// is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ttl(NonZeroU64);

impl Ttl {
    pub fn from_secs(secs: u64) -> Result<Self, CacheError> {
        if secs > MAX_TTL_SECS {
            return Err(CacheError::InvalidTtl {
                secs,
                reason: "exceeds the one week maximum",
            });
        }
        NonZeroU64::new(secs).map(Self).ok_or(CacheError::InvalidTtl {
            secs,
            reason: "must be greater than zero",
        })
    }

    pub fn as_secs(&self) -> u64 {
        self.0.get()
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.0.get())
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Coarse TTL tier, chosen per endpoint by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlTier {
    /// Views that change within the same operational day (~30s).
    Short,
    /// General list/detail responses (~60s).
    Standard,
    /// Rarely changing aggregates (~300s).
    Long,
}

impl TtlTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtlTier::Short => "short",
            TtlTier::Standard => "standard",
            TtlTier::Long => "long",
        }
    }

    pub fn default_secs(&self) -> u64 {
        match self {
            TtlTier::Short => 30,
            TtlTier::Standard => 60,
            TtlTier::Long => 300,
        }
    }
}

impl fmt::Display for TtlTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved TTL for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    short: Ttl,
    standard: Ttl,
    long: Ttl,
}

impl TtlPolicy {
    pub fn from_secs(short: u64, standard: u64, long: u64) -> Result<Self, CacheError> {
        Ok(Self {
            short: Ttl::from_secs(short)?,
            standard: Ttl::from_secs(standard)?,
            long: Ttl::from_secs(long)?,
        })
    }

    pub fn ttl_for(&self, tier: TtlTier) -> Ttl {
        match tier {
            TtlTier::Short => self.short,
            TtlTier::Standard => self.standard,
            TtlTier::Long => self.long,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        let tier = |t: TtlTier| Ttl(NonZeroU64::new(t.default_secs()).unwrap_or(NonZeroU64::MIN));
        Self {
            short: tier(TtlTier::Short),
            standard: tier(TtlTier::Standard),
            long: tier(TtlTier::Long),
        }
    }
}
