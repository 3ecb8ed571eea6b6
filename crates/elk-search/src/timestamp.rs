//! Elasticsearch timestamp parsing and formatting.
//!
//! Cutoffs are rendered in the shape Elasticsearch emits: second precision,
//! milliseconds with trailing zeros trimmed, and `Z` for UTC. Timestamps are
//! compared as instants whenever both sides parse.

use std::cmp::Ordering;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike};

use crate::error::{Result, SearchError};

/// Overlap re-queried on every follow-up poll to catch late-indexed entries.
pub const TAILING_TIME_WINDOW: Duration = Duration::from_millis(500);

/// Zoneless layouts Elasticsearch accepts for `date` fields, read as UTC.
const ZONELESS_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parses a timestamp.
///
/// Accepts RFC 3339, zoneless date-times and bare dates; the last two are
/// taken as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts);
    }
    ZONELESS_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().fixed_offset())
        .ok_or_else(|| SearchError::InvalidTimestamp {
            value: value.to_string(),
        })
}

/// Orders two raw timestamps by instant, or as strings if either does not
/// parse.
#[must_use]
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Formats a timestamp as `YYYY-MM-DDTHH:MM:SS[.fff](Z|±hh:mm)`.
#[must_use]
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    let mut out = ts.format("%Y-%m-%dT%H:%M:%S").to_string();

    let millis = ts.nanosecond() / 1_000_000 % 1000;
    if millis > 0 {
        let fraction = format!("{millis:03}");
        out.push('.');
        out.push_str(fraction.trim_end_matches('0'));
    }

    if ts.offset().local_minus_utc() == 0 {
        out.push('Z');
    } else {
        out.push_str(&ts.format("%:z").to_string());
    }
    out
}

/// Returns `last - window`, formatted for comparison with raw timestamps.
pub fn cutoff(last: &str, window: Duration) -> Result<String> {
    let parsed = parse_timestamp(last)?;
    let window = chrono::Duration::from_std(window).map_err(|_| SearchError::InvalidTimestamp {
        value: last.to_string(),
    })?;
    Ok(format_timestamp(&(parsed - window)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("2016-06-17T04:06:00.000Z", "2016-06-17T04:05:59.5Z" ; "whole second")]
    #[test_case("2016-06-17T04:06:00.750Z", "2016-06-17T04:06:00.25Z" ; "fraction trimmed")]
    #[test_case("2016-06-17T04:06:00.500Z", "2016-06-17T04:06:00Z" ; "fraction vanishes")]
    #[test_case("2016-06-17T04:06:00.123+02:00", "2016-06-17T04:05:59.623+02:00" ; "keeps offset")]
    fn cutoff_subtracts_window(last: &str, expected: &str) {
        assert_eq!(cutoff(last, TAILING_TIME_WINDOW).expect("valid"), expected);
    }

    #[test_case("2016-06-17T10:00:00.123", "2016-06-17T10:00:00.123Z" ; "zoneless")]
    #[test_case("2016-06-17 10:00:00", "2016-06-17T10:00:00Z" ; "space separated")]
    #[test_case("2016-06-17T15:00", "2016-06-17T15:00:00Z" ; "minute precision")]
    #[test_case("2016-06-17", "2016-06-17T00:00:00Z" ; "date only")]
    fn zoneless_timestamps_are_utc(value: &str, expected: &str) {
        let ts = parse_timestamp(value).expect("valid");
        assert_eq!(format_timestamp(&ts), expected);
    }

    #[test]
    fn zoneless_cutoff() {
        let cut = cutoff("2016-06-17T10:00:00.123", TAILING_TIME_WINDOW).expect("valid");
        assert_eq!(cut, "2016-06-17T09:59:59.623Z");
    }

    #[test_case("2016-06-17T10:00:00.100Z", "2016-06-17T10:00:00Z", Ordering::Greater ; "trimmed fraction")]
    #[test_case("2016-06-17T12:00:00+02:00", "2016-06-17T10:00:00Z", Ordering::Equal ; "offsets")]
    #[test_case("2016-06-17T09:59:59.9", "2016-06-17T10:00:00Z", Ordering::Less ; "zoneless against utc")]
    #[test_case("abc", "abd", Ordering::Less ; "unparseable falls back to strings")]
    fn compares_instants(a: &str, b: &str, expected: Ordering) {
        assert_eq!(compare_timestamps(a, b), expected);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = parse_timestamp("yesterday").expect_err("not a timestamp");
        assert!(matches!(err, SearchError::InvalidTimestamp { .. }));
    }

    #[test]
    fn format_roundtrips_millisecond_precision() {
        let ts = parse_timestamp("2016-06-17T04:06:00.123Z").expect("valid");
        assert_eq!(format_timestamp(&ts), "2016-06-17T04:06:00.123Z");
    }

    #[test]
    fn cutoff_sorts_before_last_for_millisecond_timestamps() {
        let last = "2016-06-17T04:06:00.123Z";
        let cut = cutoff(last, TAILING_TIME_WINDOW).expect("valid");
        assert!(cut.as_str() < last);
    }
}
