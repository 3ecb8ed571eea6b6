//! Index selection over date-partitioned indices.
//!
//! Logstash writes one index per day (`logstash-2016.06.17`). Without a date
//! filter only the latest matching index is searched; with one, every index
//! whose embedded date falls inside the requested range is searched.

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{Result, SearchError};
use crate::types::QueryDefinition;

/// Date separator used inside index names.
pub const INDEX_DATE_SEPARATOR: &str = ".";

/// Date separator used in date-bound arguments.
pub const BOUND_DATE_SEPARATOR: &str = "-";

/// Compiles an index pattern.
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| SearchError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Extracts the first `YYYY<sep>MM<sep>DD` date embedded in `input`.
pub fn extract_ymd_date(input: &str, separator: &str) -> Result<NaiveDate> {
    let sep = regex::escape(separator);
    let date_regex = Regex::new(&format!(r"\d{{4}}{sep}\d{{2}}{sep}\d{{2}}"))
        .map_err(|_| SearchError::invalid_date(input))?;

    let found = date_regex
        .find(input)
        .ok_or_else(|| SearchError::invalid_date(input))?;

    NaiveDate::parse_from_str(found.as_str(), &format!("%Y{separator}%m{separator}%d"))
        .map_err(|_| SearchError::invalid_date(input))
}

/// Returns the lexicographically greatest index name matching `pattern`.
///
/// Index names embed zero-padded dates, so lexicographic order is
/// chronological order.
pub fn find_last_index(indices: &[String], pattern: &Regex) -> Result<String> {
    indices
        .iter()
        .filter(|idx| pattern.is_match(idx))
        .max()
        .cloned()
        .ok_or_else(|| SearchError::NoMatchingIndex {
            pattern: pattern.as_str().to_string(),
        })
}

/// Returns all matching index names whose date lies in `[start, end]`.
///
/// Bounds are date strings using `-` as separator; anything after the date
/// (such as a time of day) is ignored.
pub fn find_indices_for_date_range(
    indices: &[String],
    pattern: &Regex,
    start: &str,
    end: &str,
) -> Result<Vec<String>> {
    let start = extract_ymd_date(start, BOUND_DATE_SEPARATOR)?;
    let end = extract_ymd_date(end, BOUND_DATE_SEPARATOR)?;

    let mut result = Vec::with_capacity(indices.len());
    for idx in indices.iter().filter(|idx| pattern.is_match(idx)) {
        let idx_date = extract_ymd_date(idx, INDEX_DATE_SEPARATOR)?;
        if idx_date >= start && idx_date <= end {
            result.push(idx.clone());
        }
    }

    if result.is_empty() {
        return Err(SearchError::NoMatchingIndex {
            pattern: pattern.as_str().to_string(),
        });
    }
    Ok(result)
}

/// Picks the indices to search for a query.
///
/// `today` is the end bound used when only a start bound is given.
pub fn select_indices(
    indices: &[String],
    pattern: &str,
    query: &QueryDefinition,
    today: NaiveDate,
) -> Result<Vec<String>> {
    let pattern = compile_pattern(pattern)?;
    debug!(available = indices.len(), pattern = %pattern, "selecting indices");

    let selected = if query.is_date_time_filtered() {
        let end = match &query.before {
            Some(before) => before.clone(),
            None => today.format("%Y-%m-%d").to_string(),
        };
        let start = match &query.after {
            Some(after) => after.clone(),
            None => {
                // Do not scan past the newest index when the end bound lies beyond it.
                let last_index = find_last_index(indices, &pattern)?;
                let last_date = extract_ymd_date(&last_index, INDEX_DATE_SEPARATOR)?;
                let end_date = extract_ymd_date(&end, BOUND_DATE_SEPARATOR)?;
                if last_date < end_date {
                    last_date.format("%Y-%m-%d").to_string()
                } else {
                    end.clone()
                }
            }
        };
        debug!(start = %start, end = %end, "date range selection");
        find_indices_for_date_range(indices, &pattern, &start, &end)?
    } else {
        vec![find_last_index(indices, &pattern)?]
    };

    info!(indices = ?selected, "using indices");
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn june_indices() -> Vec<String> {
        (15..=20)
            .map(|day| format!("logstash-2016.06.{day}"))
            .collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn pattern(p: &str) -> Regex {
        compile_pattern(p).expect("valid pattern")
    }

    #[test]
    fn extract_date_from_bound_and_index() {
        assert_eq!(
            extract_ymd_date("2016-06-17T04:06", "-").expect("date"),
            date(2016, 6, 17)
        );
        assert_eq!(
            extract_ymd_date("logstash-2016.06.17", ".").expect("date"),
            date(2016, 6, 17)
        );
    }

    #[test]
    fn extract_date_dot_is_literal() {
        // An unescaped '.' would match "2016-06-17" here.
        let err = extract_ymd_date("2016-06-17", ".").expect_err("separator mismatch");
        assert!(matches!(err, SearchError::InvalidDate { .. }));
    }

    #[test]
    fn extract_date_missing() {
        let err = extract_ymd_date("logstash-latest", ".").expect_err("no date");
        assert!(matches!(err, SearchError::InvalidDate { .. }));
    }

    #[test]
    fn extract_date_rejects_impossible_dates() {
        assert!(extract_ymd_date("logstash-2016.13.45", ".").is_err());
    }

    #[test]
    fn date_range_is_inclusive() {
        let selected = find_indices_for_date_range(
            &june_indices(),
            &pattern("logstash.*"),
            "2016-06-16",
            "2016-06-18",
        )
        .expect("selection");
        assert_eq!(
            selected,
            vec![
                "logstash-2016.06.16".to_string(),
                "logstash-2016.06.17".to_string(),
                "logstash-2016.06.18".to_string(),
            ]
        );
    }

    #[test]
    fn date_range_ignores_time_of_day() {
        let selected = find_indices_for_date_range(
            &june_indices(),
            &pattern("logstash.*"),
            "2016-06-19T15:00",
            "2016-06-20T01:00",
        )
        .expect("selection");
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn date_range_without_match_fails() {
        let err = find_indices_for_date_range(
            &june_indices(),
            &pattern("logstash.*"),
            "2017-01-01",
            "2017-01-02",
        )
        .expect_err("nothing in range");
        assert!(matches!(err, SearchError::NoMatchingIndex { .. }));
    }

    #[test]
    fn last_index_is_lexicographic_max() {
        let mut indices = june_indices();
        indices.reverse();
        indices.push(".kibana".to_string());
        let last = find_last_index(&indices, &pattern("logstash-[0-9].*")).expect("match");
        assert_eq!(last, "logstash-2016.06.20");
    }

    #[test]
    fn last_index_is_idempotent() {
        let indices = june_indices();
        let p = pattern("logstash.*");
        let first = find_last_index(&indices, &p).expect("match");
        let second = find_last_index(&indices, &p).expect("match");
        assert_eq!(first, second);
    }

    #[test]
    fn last_index_without_match_fails() {
        let err = find_last_index(&june_indices(), &pattern("^filebeat-")).expect_err("no match");
        assert!(matches!(err, SearchError::NoMatchingIndex { .. }));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = select_indices(
            &june_indices(),
            "logstash-[",
            &QueryDefinition::default(),
            date(2016, 6, 20),
        )
        .expect_err("bad regex");
        assert!(matches!(err, SearchError::InvalidPattern { .. }));
    }

    #[test]
    fn select_latest_without_dates() {
        let selected = select_indices(
            &june_indices(),
            "logstash.*",
            &QueryDefinition::default(),
            date(2016, 6, 20),
        )
        .expect("selection");
        assert_eq!(selected, vec!["logstash-2016.06.20".to_string()]);
    }

    #[test]
    fn select_after_only_runs_until_today() {
        let query = QueryDefinition {
            after: Some("2016-06-18T10:00".to_string()),
            ..QueryDefinition::default()
        };
        let selected = select_indices(&june_indices(), "logstash.*", &query, date(2016, 6, 19))
            .expect("selection");
        assert_eq!(
            selected,
            vec![
                "logstash-2016.06.18".to_string(),
                "logstash-2016.06.19".to_string(),
            ]
        );
    }

    #[test]
    fn select_before_only_starts_at_end_bound() {
        let query = QueryDefinition {
            before: Some("2016-06-17T12:00".to_string()),
            ..QueryDefinition::default()
        };
        let selected = select_indices(&june_indices(), "logstash.*", &query, date(2016, 6, 30))
            .expect("selection");
        assert_eq!(selected, vec!["logstash-2016.06.17".to_string()]);
    }

    #[test]
    fn select_before_beyond_newest_index_starts_at_newest() {
        let query = QueryDefinition {
            before: Some("2016-07-01".to_string()),
            ..QueryDefinition::default()
        };
        let selected = select_indices(&june_indices(), "logstash.*", &query, date(2016, 7, 1))
            .expect("selection");
        assert_eq!(selected, vec!["logstash-2016.06.20".to_string()]);
    }

    #[test]
    fn select_both_bounds() {
        let query = QueryDefinition {
            after: Some("2016-06-15".to_string()),
            before: Some("2016-06-16".to_string()),
            ..QueryDefinition::default()
        };
        let selected = select_indices(&june_indices(), "logstash.*", &query, date(2016, 6, 30))
            .expect("selection");
        assert_eq!(selected.len(), 2);
    }
}
