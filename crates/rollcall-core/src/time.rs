use crate::error::{CoreError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use time::macros::format_description;
use time::{Date, OffsetDateTime, UtcOffset};

/// A calendar date rendered as `YYYY-MM-DD`.
///
/// Used both for business dates (the day attendance is recorded for) and
/// for cache creation days (the day a cache entry is written on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDay(pub Date);

impl CalendarDay {
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    pub fn date(&self) -> Date {
        self.0
    }

    /// The day after this one, `None` at the end of the supported range.
    pub fn next(&self) -> Option<Self> {
        self.0.next_day().map(Self)
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl FromStr for CalendarDay {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let date = Date::parse(s, format_description!("[year]-[month]-[day]")).map_err(|e| {
            CoreError::invalid_day(format!("Failed to parse calendar day '{s}': {e}"))
        })?;
        Ok(CalendarDay(date))
    }
}

impl Serialize for CalendarDay {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarDay {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CalendarDay::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually driven clock for simulated time.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: std::time::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, at: OffsetDateTime) {
        *self.now.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock()
    }
}

/// The school's notion of "today".
///
/// Every component that needs the current calendar day (cache key
/// construction as well as write-triggered invalidation) must go through
/// [`SchoolCalendar::today`]. Computing the day any other way splits reads
/// and invalidations into different partitions.
#[derive(Clone)]
pub struct SchoolCalendar {
    clock: Arc<dyn Clock>,
    offset: UtcOffset,
}

impl SchoolCalendar {
    pub fn new(clock: Arc<dyn Clock>, offset: UtcOffset) -> Self {
        Self { clock, offset }
    }

    /// Build a calendar from an offset expressed in minutes east of UTC.
    pub fn with_offset_minutes(clock: Arc<dyn Clock>, minutes: i32) -> Result<Self> {
        let offset = UtcOffset::from_whole_seconds(minutes.saturating_mul(60)).map_err(|e| {
            CoreError::configuration(format!("invalid UTC offset of {minutes} minutes: {e}"))
        })?;
        Ok(Self::new(clock, offset))
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    pub fn today(&self) -> CalendarDay {
        CalendarDay(self.clock.now().to_offset(self.offset).date())
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }
}

impl fmt::Debug for SchoolCalendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchoolCalendar")
            .field("offset", &self.offset)
            .field("today", &self.today())
            .finish()
    }
}
