//! Glob patterns for bulk invalidation.
//!
//! Grammar:
//!
//! - `*` matches any run of characters, including the empty run
//! - `\*` matches a literal `*`, `\\` a literal backslash, `\x` a literal `x`
//! - every other character matches itself
//!
//! Matching is case-sensitive and anchored at both ends of the key. Patterns
//! are compiled to a [`regex::Regex`] once, with literal runs escaped, so a
//! `.` or `?` in a key fragment never acts as a wildcard.

use std::fmt;
use std::str::FromStr;

use regex::Regex;

use crate::error::CacheError;

/// Longest pattern accepted by [`GlobPattern::compile`].
pub const MAX_PATTERN_LEN: usize = 4096;

#[derive(Clone)]
pub struct GlobPattern {
    source: String,
    regex: Regex,
    /// Unescaped key when the pattern contains no wildcard.
    literal: Option<String>,
}

impl GlobPattern {
    pub fn compile(pattern: &str) -> Result<Self, CacheError> {
        if pattern.is_empty() {
            return Err(CacheError::invalid_pattern(pattern, "pattern is empty"));
        }
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(CacheError::invalid_pattern(
                pattern,
                format!("pattern exceeds {MAX_PATTERN_LEN} bytes"),
            ));
        }

        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push_str("(?s)^");
        let mut literal = String::new();
        let mut has_wildcard = false;
        let mut key = String::new();
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    expr.push_str(&regex::escape(&literal));
                    literal.clear();
                    // `**` is the same as `*`
                    if !expr.ends_with(".*") {
                        expr.push_str(".*");
                    }
                    has_wildcard = true;
                }
                '\\' => match chars.next() {
                    Some(escaped) => {
                        literal.push(escaped);
                        key.push(escaped);
                    }
                    None => {
                        return Err(CacheError::invalid_pattern(
                            pattern,
                            "trailing unpaired escape character",
                        ));
                    }
                },
                other => {
                    literal.push(other);
                    key.push(other);
                }
            }
        }
        expr.push_str(&regex::escape(&literal));
        expr.push('$');

        let regex = Regex::new(&expr)
            .map_err(|e| CacheError::invalid_pattern(pattern, e.to_string()))?;

        Ok(Self {
            source: pattern.to_string(),
            regex,
            literal: (!has_wildcard).then_some(key),
        })
    }

    /// Escape a literal fragment so it can be embedded in a pattern.
    pub fn escape(fragment: &str) -> String {
        let mut out = String::with_capacity(fragment.len());
        for c in fragment.chars() {
            if c == '*' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    #[inline]
    pub fn is_match(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The single key this pattern can match, if it has no wildcard.
    pub fn literal_key(&self) -> Option<&str> {
        self.literal.as_deref()
    }
}

impl fmt::Debug for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GlobPattern").field(&self.source).finish()
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for GlobPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for GlobPattern {}

impl FromStr for GlobPattern {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::compile(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glob(p: &str) -> GlobPattern {
        GlobPattern::compile(p).unwrap()
    }

    #[test]
    fn star_matches_any_run() {
        let p = glob("date:2025-09-07:user:*:/x");
        assert!(p.is_match("date:2025-09-07:user:A:/x"));
        assert!(p.is_match("date:2025-09-07:user::/x"));
        assert!(p.is_match("date:2025-09-07:user:a:b:c:/x"));
        assert!(!p.is_match("date:2025-09-08:user:A:/x"));
    }

    #[test]
    fn anchored_at_both_ends() {
        let p = glob("user:*:/x");
        assert!(!p.is_match("date:1:user:A:/x"));
        assert!(!p.is_match("user:A:/x/more"));
        assert!(p.is_match("user:A:/x"));
    }

    #[test]
    fn case_sensitive() {
        let p = glob("user:A*");
        assert!(p.is_match("user:A1"));
        assert!(!p.is_match("user:a1"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let p = glob("/api/sections/?date=2025.01.01*");
        assert!(p.is_match("/api/sections/?date=2025.01.01"));
        assert!(p.is_match("/api/sections/?date=2025.01.01&x=1"));
        assert!(!p.is_match("/api/sections/?date=2025x01x01"));
        assert!(!p.is_match("/api/sections?date=2025.01.01"));

        let brackets = glob("a[b](c)+{d}|e^$");
        assert!(brackets.is_match("a[b](c)+{d}|e^$"));
        assert!(!brackets.is_match("ab"));
    }

    #[test]
    fn escaped_star_is_literal() {
        let p = glob(r"user:\**");
        assert!(p.is_match("user:*"));
        assert!(p.is_match("user:*abc"));
        assert!(!p.is_match("user:abc"));
    }

    #[test]
    fn escaped_backslash_is_literal() {
        let p = glob(r"a\\b");
        assert!(p.is_match(r"a\b"));
        assert!(!p.is_match("ab"));
    }

    #[test]
    fn star_crosses_newlines() {
        let p = glob("a*b");
        assert!(p.is_match("a\nb"));
    }

    #[test]
    fn repeated_stars_collapse() {
        let p = glob("a**b");
        assert!(p.is_match("ab"));
        assert!(p.is_match("axxb"));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!(matches!(
            GlobPattern::compile(""),
            Err(CacheError::InvalidPattern { .. })
        ));
        assert!(matches!(
            GlobPattern::compile(r"user:\"),
            Err(CacheError::InvalidPattern { .. })
        ));
        let long = "a".repeat(MAX_PATTERN_LEN + 1);
        assert!(GlobPattern::compile(&long).is_err());
    }

    #[test]
    fn escape_round_trips_through_compile() {
        let fragment = r"odd*user\id";
        let p = glob(&GlobPattern::escape(fragment));
        assert!(p.is_match(fragment));
        assert!(!p.is_match("oddXuser\\id"));
        assert_eq!(p.literal_key(), Some(fragment));
    }

    #[test]
    fn literal_key_only_without_wildcards() {
        assert_eq!(glob("a:b").literal_key(), Some("a:b"));
        assert_eq!(glob("a:*").literal_key(), None);
    }
}
