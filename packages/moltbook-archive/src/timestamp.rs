//! Relative timestamp resolution ("3h ago" → absolute time).
//!
//! Moltbook renders only relative times, so resolved timestamps are an
//! approximation anchored at ingestion time. Callers must tolerate `None`.

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Checked in this order; the first unit that matches wins.
    static ref RELATIVE_PATTERNS: Vec<(TimeUnit, Regex)> = vec![
        (
            TimeUnit::Minutes,
            Regex::new(r"(?i)\b(\d{1,6})\s*(?:m|mins?|minutes?)\s+ago\b").unwrap(),
        ),
        (
            TimeUnit::Hours,
            Regex::new(r"(?i)\b(\d{1,6})\s*(?:h|hrs?|hours?)\s+ago\b").unwrap(),
        ),
        (
            TimeUnit::Days,
            Regex::new(r"(?i)\b(\d{1,6})\s*(?:d|days?)\s+ago\b").unwrap(),
        ),
        (
            TimeUnit::Weeks,
            Regex::new(r"(?i)\b(\d{1,6})\s*(?:w|wks?|weeks?)\s+ago\b").unwrap(),
        ),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    fn duration(self, amount: i64) -> Duration {
        match self {
            TimeUnit::Minutes => Duration::minutes(amount),
            TimeUnit::Hours => Duration::hours(amount),
            TimeUnit::Days => Duration::days(amount),
            TimeUnit::Weeks => Duration::weeks(amount),
        }
    }
}

/// Resolve the first relative-time expression in `text` against `now`.
///
/// Units are tried in priority order (minutes, hours, days, weeks); multiple
/// matches are never merged.
pub fn resolve_relative(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    for (unit, pattern) in RELATIVE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
            return now.checked_sub_signed(unit.duration(amount));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 31, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_hours_ago() {
        let ts = resolve_relative("Posted by u/bot 3h ago", now()).unwrap();
        assert_eq!(ts, now() - Duration::hours(3));
    }

    #[test]
    fn test_long_unit_names() {
        assert_eq!(
            resolve_relative("5 minutes ago", now()),
            Some(now() - Duration::minutes(5))
        );
        assert_eq!(
            resolve_relative("2 days ago", now()),
            Some(now() - Duration::days(2))
        );
        assert_eq!(
            resolve_relative("1 week ago", now()),
            Some(now() - Duration::weeks(1))
        );
    }

    #[test]
    fn test_priority_minutes_before_hours() {
        // Hours appear first in the text but minutes have priority
        let ts = resolve_relative("edited 2h ago, replied 10m ago", now()).unwrap();
        assert_eq!(ts, now() - Duration::minutes(10));
    }

    #[test]
    fn test_months_do_not_match_minutes() {
        assert_eq!(resolve_relative("3 months ago", now()), None);
    }

    #[test]
    fn test_no_match() {
        assert_eq!(resolve_relative("just now", now()), None);
        assert_eq!(resolve_relative("", now()), None);
        assert_eq!(resolve_relative("3h", now()), None);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            resolve_relative("4 Hours Ago", now()),
            Some(now() - Duration::hours(4))
        );
    }
}
