//! Cache key and invalidation pattern composition.
//!
//! Read keys and invalidation patterns share one prefix function and one
//! creation-day source ([`SchoolCalendar::today`]), so a write always sweeps
//! the partition its readers populated.

use std::fmt;

use rollcall_core::{CalendarDay, SchoolCalendar};

use crate::error::CacheError;
use crate::pattern::GlobPattern;

/// Normalize a request path.
///
/// Ensures a leading `/`, collapses repeated separators and terminates every
/// path with exactly one `/`, so `/sections/S1` becomes `/sections/S1/` and
/// a prefix sweep for `S1` never reaches `S10`.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 2);
    out.push('/');
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push_str(segment);
        out.push('/');
    }
    out
}

/// Normalize a raw query string: drop empty pairs and sort the rest.
///
/// A leading `?` is ignored. Returns an empty string for an empty query.
pub fn normalize_query(query: &str) -> String {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_unstable();
    pairs.join("&")
}

/// A normalized path prefix naming everything a write can make stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceScope(String);

impl ResourceScope {
    pub fn new(path: &str) -> Self {
        Self(normalize_path(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds read keys and invalidation patterns.
///
/// Key format: `date:{creation_day}:user:{user_id}:{path}[?{query}]`.
/// The creation day is the day the entry is written, never a date taken
/// from the query.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    calendar: SchoolCalendar,
}

impl CacheKeyBuilder {
    pub fn new(calendar: SchoolCalendar) -> Self {
        Self { calendar }
    }

    pub fn calendar(&self) -> &SchoolCalendar {
        &self.calendar
    }

    /// Today's creation day.
    pub fn creation_day(&self) -> CalendarDay {
        self.calendar.today()
    }

    fn user_prefix(day: &CalendarDay, user: &str) -> String {
        format!("date:{day}:user:{user}:")
    }

    pub fn build_read_key(day: &CalendarDay, user_id: &str, path: &str, query: &str) -> String {
        let mut key = Self::user_prefix(day, user_id);
        key.push_str(&normalize_path(path));
        let query = normalize_query(query);
        if !query.is_empty() {
            key.push('?');
            key.push_str(&query);
        }
        key
    }

    /// Read key for a request made now.
    pub fn read_key(&self, user_id: &str, path: &str, query: &str) -> String {
        Self::build_read_key(&self.creation_day(), user_id, path, query)
    }

    /// Pattern matching every user's view of `scope` created on `day`.
    pub fn build_invalidation_pattern(
        day: &CalendarDay,
        scope: &ResourceScope,
    ) -> Result<GlobPattern, CacheError> {
        let day = GlobPattern::escape(&day.to_string());
        let mut pattern = format!("date:{day}:user:*:");
        pattern.push_str(&GlobPattern::escape(scope.as_str()));
        pattern.push('*');
        GlobPattern::compile(&pattern)
    }

    pub fn invalidation_pattern(&self, scope: &ResourceScope) -> Result<GlobPattern, CacheError> {
        Self::build_invalidation_pattern(&self.creation_day(), scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::ManualClock;
    use std::str::FromStr;
    use std::sync::Arc;
    use time::macros::datetime;

    fn day(s: &str) -> CalendarDay {
        CalendarDay::from_str(s).unwrap()
    }

    #[test]
    fn normalize_path_terminates_segments() {
        assert_eq!(normalize_path("/api/sections/S1"), "/api/sections/S1/");
        assert_eq!(normalize_path("api//sections///S1/"), "/api/sections/S1/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
    }

    #[test]
    fn normalize_query_sorts_and_drops_empty_pairs() {
        assert_eq!(normalize_query("b=2&a=1"), "a=1&b=2");
        assert_eq!(normalize_query("?&date=2025-01-01&&"), "date=2025-01-01");
        assert_eq!(normalize_query(""), "");
    }

    #[test]
    fn read_key_format() {
        let key = CacheKeyBuilder::build_read_key(
            &day("2025-09-07"),
            "t-12",
            "/api/attendance/sections/7b",
            "date=2025-09-05",
        );
        assert_eq!(
            key,
            "date:2025-09-07:user:t-12:/api/attendance/sections/7b/?date=2025-09-05"
        );

        let bare = CacheKeyBuilder::build_read_key(&day("2025-09-07"), "a", "/api/sections", "");
        assert_eq!(bare, "date:2025-09-07:user:a:/api/sections/");
    }

    #[test]
    fn equivalent_requests_share_a_key() {
        let d = day("2025-09-07");
        assert_eq!(
            CacheKeyBuilder::build_read_key(&d, "u", "/x//y", "b=2&a=1"),
            CacheKeyBuilder::build_read_key(&d, "u", "/x/y/", "a=1&b=2"),
        );
    }

    #[test]
    fn query_date_does_not_change_partition() {
        let key = CacheKeyBuilder::build_read_key(
            &day("2025-09-07"),
            "u",
            "/api/attendance/sections/S1",
            "date=2024-01-01",
        );
        assert!(key.starts_with("date:2025-09-07:"));
    }

    #[test]
    fn invalidation_pattern_respects_segment_boundary() {
        let d = day("2025-09-07");
        let pattern = CacheKeyBuilder::build_invalidation_pattern(
            &d,
            &ResourceScope::new("/api/attendance/sections/S1"),
        )
        .unwrap();
        assert_eq!(
            pattern.as_str(),
            "date:2025-09-07:user:*:/api/attendance/sections/S1/*"
        );

        let own = CacheKeyBuilder::build_read_key(&d, "a", "/api/attendance/sections/S1", "");
        let summary = CacheKeyBuilder::build_read_key(
            &d,
            "b",
            "/api/attendance/sections/S1/summary",
            "from=2025-09-01&to=2025-09-07",
        );
        let other = CacheKeyBuilder::build_read_key(&d, "a", "/api/attendance/sections/S10", "");

        assert!(pattern.is_match(&own));
        assert!(pattern.is_match(&summary));
        assert!(!pattern.is_match(&other));
    }

    #[test]
    fn builder_uses_calendar_day() {
        let clock = Arc::new(ManualClock::new(datetime!(2025-09-07 23:30:00 UTC)));
        let utc = CacheKeyBuilder::new(SchoolCalendar::with_offset_minutes(clock.clone(), 0).unwrap());
        let ahead = CacheKeyBuilder::new(SchoolCalendar::with_offset_minutes(clock, 60).unwrap());

        assert_eq!(utc.creation_day().to_string(), "2025-09-07");
        assert_eq!(ahead.creation_day().to_string(), "2025-09-08");
        assert!(ahead.read_key("u", "/x", "").starts_with("date:2025-09-08:"));
    }
}
