//! # elk-search
//!
//! Tailing of date-partitioned Elasticsearch log indices.
//!
//! This crate provides:
//!
//! - [`select_indices`] — Picks the indices to search from an index pattern and date bounds
//! - [`Query`] / [`SearchRequest`] — Typed query tree rendered to the query DSL
//! - [`Tail`] — The poll/dedup engine (initial search, follow-up polls, backoff)
//! - [`DedupWindow`] — Ids displayed within the trailing overlap window
//! - [`Template`] — `%field.path` display templates
//! - [`SearchBackend`] — The backend capability, with [`ElasticClient`] over HTTP
//!   and [`FakeSearchBackend`] in memory
//!
//! ## Example
//!
//! ```rust
//! use elk_search::Template;
//! use serde_json::json;
//!
//! let template = Template::new("%@timestamp %host.name: %message");
//! let line = template.render(&json!({
//!     "@timestamp": "2016-06-17T04:06:00.123Z",
//!     "host": { "name": "web-1" },
//!     "message": "GET /index.html 200",
//! }));
//! assert_eq!(line, "2016-06-17T04:06:00.123Z web-1: GET /index.html 200");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod elastic;
pub mod error;
pub mod format;
pub mod index;
pub mod query;
pub mod tail;
pub mod timestamp;
pub mod types;
pub mod window;

// Re-export main types
pub use backend::{FakeSearchBackend, SCROLL_KEEP_ALIVE, ScrollPage, SearchBackend};
pub use elastic::{Credentials, ElasticClient, normalize_url};
pub use error::{ErrorKind, Result, SearchError};
pub use format::{Node, Template, UnresolvedPath, evaluate_expression};
pub use index::{extract_ymd_date, find_indices_for_date_range, find_last_index, select_indices};
pub use query::{Query, SearchRequest, build_search_query, build_timestamp_filtered_query};
pub use tail::{Backoff, FOLLOW_UP_PAGE_SIZE, Tail};
pub use timestamp::{
    TAILING_TIME_WINDOW, compare_timestamps, cutoff, format_timestamp, parse_timestamp,
};
pub use types::{
    DEFAULT_FORMAT, DEFAULT_INDEX_PATTERN, DEFAULT_TIMESTAMP_FIELD, DEFAULT_URL, DisplayedEntry,
    QueryDefinition, SearchHit, SearchPage, SearchTarget, SortOrder,
};
pub use window::DedupWindow;
