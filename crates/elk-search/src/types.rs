//! Core types shared by the selector, query builder and tail engine.
//!
//! This module provides:
//! - [`SearchTarget`] — Where to search (URL, tunnel URL, index pattern)
//! - [`QueryDefinition`] — What to search for and how to display it
//! - [`SortOrder`] — Sort direction on the timestamp field
//! - [`DisplayedEntry`] — An entry remembered by the dedup window
//! - [`SearchHit`] / [`SearchPage`] — Results returned by a backend

use std::cmp::Ordering;

use serde::{Deserialize, Deserializer, Serialize};

use crate::timestamp::compare_timestamps;

/// Default Elasticsearch URL.
pub const DEFAULT_URL: &str = "http://127.0.0.1:9200";

/// Default display template.
pub const DEFAULT_FORMAT: &str = "%message";

/// Default index pattern (logstash daily indices).
pub const DEFAULT_INDEX_PATTERN: &str = "logstash-[0-9].*";

/// Default timestamp field.
pub const DEFAULT_TIMESTAMP_FIELD: &str = "@timestamp";

/// Where to search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SearchTarget {
    /// Backend base URL as given by the operator.
    pub url: String,
    /// Local tunnel endpoint URL; replaces `url` when set.
    #[serde(skip)]
    pub tunnel_url: Option<String>,
    /// Regular expression selecting candidate index names.
    pub index_pattern: String,
}

impl Default for SearchTarget {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            tunnel_url: None,
            index_pattern: DEFAULT_INDEX_PATTERN.to_string(),
        }
    }
}

impl SearchTarget {
    /// Returns the URL the backend client should connect to.
    #[must_use]
    pub fn effective_url(&self) -> &str {
        self.tunnel_url.as_deref().unwrap_or(&self.url)
    }
}

/// What to search for and how to display it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QueryDefinition {
    /// Free-text query terms, joined by spaces into a query string.
    #[serde(deserialize_with = "null_as_empty")]
    pub terms: Vec<String>,
    /// Display template with `%field.path` tokens.
    pub format: String,
    /// Name of the timestamp field used for sorting and tailing.
    pub timestamp_field: String,
    /// Inclusive lower date-time bound.
    #[serde(skip)]
    pub after: Option<String>,
    /// Exclusive upper date-time bound.
    #[serde(skip)]
    pub before: Option<String>,
}

impl Default for QueryDefinition {
    fn default() -> Self {
        Self {
            terms: Vec::new(),
            format: DEFAULT_FORMAT.to_string(),
            timestamp_field: DEFAULT_TIMESTAMP_FIELD.to_string(),
            after: None,
            before: None,
        }
    }
}

impl QueryDefinition {
    /// Returns true if either date bound is set.
    #[must_use]
    pub const fn is_date_time_filtered(&self) -> bool {
        self.after.is_some() || self.before.is_some()
    }

    /// Sort order for the initial search.
    ///
    /// Filtering on a start date lists forward from that date; otherwise the
    /// newest entries are fetched first.
    #[must_use]
    pub const fn sort_order(&self) -> SortOrder {
        if self.after.is_some() {
            SortOrder::Ascending
        } else {
            SortOrder::Descending
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Sort direction on the timestamp field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Oldest first.
    #[serde(rename = "asc")]
    Ascending,
    /// Newest first.
    #[serde(rename = "desc")]
    Descending,
}

impl SortOrder {
    /// Elasticsearch name of the order.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// An entry that was already displayed, remembered to suppress duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayedEntry {
    /// Raw timestamp string of the document.
    pub timestamp: String,
    /// Unique document id.
    pub id: String,
}

impl DisplayedEntry {
    /// Creates a new displayed entry.
    #[must_use]
    pub fn new(timestamp: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            id: id.into(),
        }
    }

    /// Returns true if this entry was logged strictly before `timestamp`.
    ///
    /// Compares instants, so `10:00:00.100Z` is after `10:00:00Z`.
    #[must_use]
    pub fn is_before(&self, timestamp: &str) -> bool {
        compare_timestamps(&self.timestamp, timestamp) == Ordering::Less
    }
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Index the document lives in.
    #[serde(rename = "_index", default)]
    pub index: String,
    /// Raw document source.
    #[serde(rename = "_source", default)]
    pub source: serde_json::Value,
}

impl SearchHit {
    /// Creates a hit from an id and source document.
    #[must_use]
    pub fn new(id: impl Into<String>, source: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            index: String::new(),
            source,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Hits in backend sort order.
    pub hits: Vec<SearchHit>,
    /// Total number of matching documents.
    pub total_hits: u64,
}

impl SearchPage {
    /// Returns true if the page holds no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
