//! Query construction.
//!
//! Queries are built as a small typed tree and rendered to the Elasticsearch
//! query DSL only when a request is sent.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use tracing::trace;

use crate::error::Result;
use crate::timestamp::{cutoff, TAILING_TIME_WINDOW};
use crate::types::{QueryDefinition, SortOrder};
use crate::window::DedupWindow;

/// A backend query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Matches every document.
    MatchAll,
    /// Lucene query string.
    QueryString(String),
    /// Range filter on a field.
    Range {
        /// Field name.
        field: String,
        /// Inclusive lower bound.
        gte: Option<String>,
        /// Exclusive upper bound.
        lt: Option<String>,
    },
    /// Matches documents with any of the given ids.
    Ids(Vec<String>),
    /// Boolean combination; all `filter` clauses must match, no `must_not` clause may.
    Bool {
        /// Conjunctive, non-scoring clauses.
        filter: Vec<Query>,
        /// Excluding clauses.
        must_not: Vec<Query>,
    },
}

impl Query {
    /// Renders the query as Elasticsearch query DSL.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::MatchAll => json!({ "match_all": {} }),
            Self::QueryString(query) => json!({ "query_string": { "query": query } }),
            Self::Range { field, gte, lt } => {
                let mut bounds = Map::new();
                if let Some(gte) = gte {
                    bounds.insert("gte".to_string(), Value::String(gte.clone()));
                }
                if let Some(lt) = lt {
                    bounds.insert("lt".to_string(), Value::String(lt.clone()));
                }
                json!({ "range": { field.as_str(): bounds } })
            }
            Self::Ids(ids) => json!({ "ids": { "values": ids } }),
            Self::Bool { filter, must_not } => {
                let mut clauses = Map::new();
                if !filter.is_empty() {
                    clauses.insert(
                        "filter".to_string(),
                        Value::Array(filter.iter().map(Self::to_value).collect()),
                    );
                }
                if !must_not.is_empty() {
                    clauses.insert(
                        "must_not".to_string(),
                        Value::Array(must_not.iter().map(Self::to_value).collect()),
                    );
                }
                json!({ "bool": clauses })
            }
        }
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// A complete search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Indices to search.
    pub indices: Vec<String>,
    /// Field to sort on.
    pub sort_field: String,
    /// Sort direction.
    pub order: SortOrder,
    /// Query to run.
    pub query: Query,
    /// Offset of the first hit.
    pub from: usize,
    /// Maximum number of hits.
    pub size: usize,
}

impl SearchRequest {
    /// Renders the request body.
    #[must_use]
    pub fn body(&self) -> Value {
        json!({
            "query": self.query.to_value(),
            "sort": [ { self.sort_field.as_str(): { "order": self.order.as_str() } } ],
            "from": self.from,
            "size": self.size,
        })
    }
}

/// Builds the query for a definition: free text plus optional date range.
#[must_use]
pub fn build_search_query(def: &QueryDefinition) -> Query {
    let query = if def.terms.is_empty() {
        trace!("running match all query");
        Query::MatchAll
    } else {
        let query_string = def.terms.join(" ");
        trace!(query = %query_string, "running query string query");
        Query::QueryString(query_string)
    };

    if def.is_date_time_filtered() {
        Query::Bool {
            filter: vec![query, build_date_time_range_query(def)],
            must_not: Vec::new(),
        }
    } else {
        query
    }
}

/// Range filter on the timestamp field from the definition's date bounds.
#[must_use]
pub fn build_date_time_range_query(def: &QueryDefinition) -> Query {
    if let Some(after) = &def.after {
        trace!(after = %after, "date range query lower bound");
    }
    if let Some(before) = &def.before {
        trace!(before = %before, "date range query upper bound");
    }
    Query::Range {
        field: def.timestamp_field.clone(),
        gte: def.after.clone(),
        lt: def.before.clone(),
    }
}

/// Builds a follow-up query that re-reads the trailing window after
/// `last_timestamp` while excluding entries already displayed.
pub fn build_timestamp_filtered_query(
    def: &QueryDefinition,
    last_timestamp: &str,
    window: &DedupWindow,
) -> Result<Query> {
    let since = cutoff(last_timestamp, TAILING_TIME_WINDOW)?;
    let timestamp_filter = Query::Range {
        field: def.timestamp_field.clone(),
        gte: Some(since),
        lt: None,
    };
    let seen = Query::Ids(window.ids().map(str::to_string).collect());

    Ok(Query::Bool {
        filter: vec![
            build_search_query(def),
            Query::Bool {
                filter: vec![timestamp_filter],
                must_not: vec![seen],
            },
        ],
        must_not: Vec::new(),
    })
}
