//! Search backend abstraction.
//!
//! This module provides:
//! - [`SearchBackend`] — The narrow capability the tail engine depends on
//! - [`ScrollPage`] — One page of a scrolled search
//! - [`FakeSearchBackend`] — In-memory backend for tests

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Result, SearchError};
use crate::query::{Query, SearchRequest};
use crate::timestamp::compare_timestamps;
use crate::types::{SearchHit, SearchPage, SortOrder};

/// Keep-alive for scroll cursors.
pub const SCROLL_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// One page of a scrolled search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollPage {
    /// Cursor for the next page; `None` when the backend returned none.
    pub scroll_id: Option<String>,
    /// Hits of this page.
    pub page: SearchPage,
}

/// Capability to query a search backend.
#[allow(async_fn_in_trait)]
pub trait SearchBackend {
    /// Lists every index name known to the backend.
    async fn index_names(&self) -> Result<Vec<String>>;

    /// Runs a single search.
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage>;

    /// Starts a scrolled search. `from` is ignored; `size` is the page size.
    async fn search_scroll(
        &self,
        request: &SearchRequest,
        keep_alive: Duration,
    ) -> Result<ScrollPage>;

    /// Fetches the next page of a scrolled search.
    async fn scroll_next(&self, scroll_id: &str, keep_alive: Duration) -> Result<ScrollPage>;

    /// Releases a scroll cursor.
    async fn clear_scroll(&self, scroll_id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct FakeDocument {
    index: String,
    id: String,
    source: Value,
}

#[derive(Debug)]
struct FakeScroll {
    hits: Vec<SearchHit>,
    size: usize,
    offset: usize,
}

#[derive(Debug, Default)]
struct FakeState {
    indices: Vec<String>,
    documents: Vec<FakeDocument>,
    requests: Vec<SearchRequest>,
    scrolls: HashMap<String, FakeScroll>,
    next_scroll: u64,
    failure: Option<String>,
}

/// An in-memory search backend for testing.
///
/// Documents are matched against the query tree directly. Query strings use a
/// naive rule: every term other than `AND` must occur in the serialized
/// source.
#[derive(Clone, Default)]
pub struct FakeSearchBackend {
    state: Arc<RwLock<FakeState>>,
}

impl FakeSearchBackend {
    /// Creates an empty fake backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fake backend that knows the given index names.
    #[must_use]
    pub fn with_indices<I, S>(indices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = FakeState {
            indices: indices.into_iter().map(Into::into).collect(),
            ..FakeState::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Stores a document, creating its index name if unknown.
    pub async fn insert(&self, index: &str, id: &str, source: Value) {
        let mut state = self.state.write().await;
        if !state.indices.iter().any(|i| i == index) {
            state.indices.push(index.to_string());
        }
        state.documents.push(FakeDocument {
            index: index.to_string(),
            id: id.to_string(),
            source,
        });
    }

    /// Makes the next backend call fail with `message`.
    pub async fn fail_next(&self, message: &str) {
        self.state.write().await.failure = Some(message.to_string());
    }

    /// Search requests received so far, including scroll starts.
    pub async fn requests(&self) -> Vec<SearchRequest> {
        self.state.read().await.requests.clone()
    }

    /// Number of scroll cursors not yet cleared.
    pub async fn open_scrolls(&self) -> usize {
        self.state.read().await.scrolls.len()
    }

    fn take_failure(state: &mut FakeState) -> Result<()> {
        match state.failure.take() {
            Some(message) => Err(SearchError::backend(message)),
            None => Ok(()),
        }
    }

    fn run(state: &FakeState, request: &SearchRequest) -> Vec<SearchHit> {
        let mut hits: Vec<(String, SearchHit)> = state
            .documents
            .iter()
            .filter(|doc| request.indices.contains(&doc.index))
            .filter(|doc| matches(&request.query, doc))
            .map(|doc| {
                let sort_key = field_string(&doc.source, &request.sort_field).unwrap_or_default();
                let hit = SearchHit {
                    id: doc.id.clone(),
                    index: doc.index.clone(),
                    source: doc.source.clone(),
                };
                (sort_key, hit)
            })
            .collect();

        hits.sort_by(|a, b| compare_timestamps(&a.0, &b.0));
        if request.order == SortOrder::Descending {
            hits.reverse();
        }
        hits.into_iter().map(|(_, hit)| hit).collect()
    }
}

impl SearchBackend for FakeSearchBackend {
    async fn index_names(&self) -> Result<Vec<String>> {
        let mut state = self.state.write().await;
        Self::take_failure(&mut state)?;
        Ok(state.indices.clone())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let mut state = self.state.write().await;
        Self::take_failure(&mut state)?;
        state.requests.push(request.clone());

        let all = Self::run(&state, request);
        let total_hits = all.len() as u64;
        let hits = all
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .collect();
        Ok(SearchPage { hits, total_hits })
    }

    async fn search_scroll(
        &self,
        request: &SearchRequest,
        _keep_alive: Duration,
    ) -> Result<ScrollPage> {
        let mut state = self.state.write().await;
        Self::take_failure(&mut state)?;
        state.requests.push(request.clone());

        let all = Self::run(&state, request);
        let total_hits = all.len() as u64;
        let size = request.size.max(1);
        let hits: Vec<SearchHit> = all.iter().take(size).cloned().collect();

        state.next_scroll += 1;
        let scroll_id = format!("scroll-{}", state.next_scroll);
        state.scrolls.insert(
            scroll_id.clone(),
            FakeScroll {
                hits: all,
                size,
                offset: size,
            },
        );

        Ok(ScrollPage {
            scroll_id: Some(scroll_id),
            page: SearchPage { hits, total_hits },
        })
    }

    async fn scroll_next(&self, scroll_id: &str, _keep_alive: Duration) -> Result<ScrollPage> {
        let mut state = self.state.write().await;
        Self::take_failure(&mut state)?;

        let scroll = state
            .scrolls
            .get_mut(scroll_id)
            .ok_or_else(|| SearchError::backend(format!("unknown scroll id {scroll_id}")))?;
        let total_hits = scroll.hits.len() as u64;
        let hits: Vec<SearchHit> = scroll
            .hits
            .iter()
            .skip(scroll.offset)
            .take(scroll.size)
            .cloned()
            .collect();
        scroll.offset += scroll.size;

        Ok(ScrollPage {
            scroll_id: Some(scroll_id.to_string()),
            page: SearchPage { hits, total_hits },
        })
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        self.state.write().await.scrolls.remove(scroll_id);
        Ok(())
    }
}

fn field_string(source: &Value, field: &str) -> Option<String> {
    source.get(field).and_then(Value::as_str).map(str::to_string)
}

fn matches(query: &Query, doc: &FakeDocument) -> bool {
    match query {
        Query::MatchAll => true,
        Query::QueryString(text) => {
            let haystack = doc.source.to_string();
            text.split_whitespace()
                .filter(|term| *term != "AND")
                .all(|term| haystack.contains(term))
        }
        Query::Range { field, gte, lt } => match field_string(&doc.source, field) {
            Some(value) => {
                gte.as_ref()
                    .is_none_or(|gte| compare_timestamps(&value, gte) != Ordering::Less)
                    && lt
                        .as_ref()
                        .is_none_or(|lt| compare_timestamps(&value, lt) == Ordering::Less)
            }
            None => false,
        },
        Query::Ids(ids) => ids.contains(&doc.id),
        Query::Bool { filter, must_not } => {
            filter.iter().all(|q| matches(q, doc)) && !must_not.iter().any(|q| matches(q, doc))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(query: Query, order: SortOrder, size: usize) -> SearchRequest {
        SearchRequest {
            indices: vec!["logstash-2016.06.17".to_string()],
            sort_field: "@timestamp".to_string(),
            order,
            query,
            from: 0,
            size,
        }
    }

    async fn seeded() -> FakeSearchBackend {
        let backend = FakeSearchBackend::new();
        for (id, ts, msg) in [
            ("b", "2016-06-17T10:00:02Z", "second"),
            ("a", "2016-06-17T10:00:01Z", "first"),
            ("c", "2016-06-17T10:00:03Z", "third error"),
        ] {
            backend
                .insert(
                    "logstash-2016.06.17",
                    id,
                    json!({ "@timestamp": ts, "message": msg }),
                )
                .await;
        }
        backend
    }

    fn ids(page: &SearchPage) -> Vec<&str> {
        page.hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[tokio::test]
    async fn search_sorts_and_limits() {
        let backend = seeded().await;
        let page = backend
            .search(&request(Query::MatchAll, SortOrder::Descending, 2))
            .await
            .expect("search");
        assert_eq!(ids(&page), vec!["c", "b"]);
        assert_eq!(page.total_hits, 3);
    }

    #[tokio::test]
    async fn search_applies_range_and_exclusions() {
        let backend = seeded().await;
        let query = Query::Bool {
            filter: vec![Query::Range {
                field: "@timestamp".to_string(),
                gte: Some("2016-06-17T10:00:02Z".to_string()),
                lt: None,
            }],
            must_not: vec![Query::Ids(vec!["b".to_string()])],
        };
        let page = backend
            .search(&request(query, SortOrder::Ascending, 10))
            .await
            .expect("search");
        assert_eq!(ids(&page), vec!["c"]);
    }

    #[tokio::test]
    async fn range_and_sort_compare_instants() {
        let backend = FakeSearchBackend::new();
        for (id, ts) in [
            ("late", "2016-06-17T10:00:00.100Z"),
            ("offset", "2016-06-17T11:59:59+02:00"),
            ("whole", "2016-06-17T10:00:00Z"),
        ] {
            backend
                .insert("logstash-2016.06.17", id, json!({ "@timestamp": ts }))
                .await;
        }
        let range = Query::Range {
            field: "@timestamp".to_string(),
            gte: Some("2016-06-17T10:00:00Z".to_string()),
            lt: Some("2016-06-17T10:00:00.5Z".to_string()),
        };
        let page = backend
            .search(&request(range, SortOrder::Ascending, 10))
            .await
            .expect("search");
        assert_eq!(ids(&page), vec!["whole", "late"]);

        let page = backend
            .search(&request(Query::MatchAll, SortOrder::Ascending, 10))
            .await
            .expect("search");
        assert_eq!(ids(&page), vec!["offset", "whole", "late"]);
    }

    #[tokio::test]
    async fn query_string_matches_terms() {
        let backend = seeded().await;
        let page = backend
            .search(&request(
                Query::QueryString("third AND error".to_string()),
                SortOrder::Ascending,
                10,
            ))
            .await
            .expect("search");
        assert_eq!(ids(&page), vec!["c"]);
    }

    #[tokio::test]
    async fn injected_failure_is_returned_once() {
        let backend = seeded().await;
        backend.fail_next("cluster_block_exception").await;
        assert!(backend.index_names().await.is_err());
        assert!(backend.index_names().await.is_ok());
    }

    #[tokio::test]
    async fn scroll_walks_all_pages() {
        let backend = seeded().await;
        let first = backend
            .search_scroll(&request(Query::MatchAll, SortOrder::Ascending, 2), SCROLL_KEEP_ALIVE)
            .await
            .expect("scroll");
        assert_eq!(ids(&first.page), vec!["a", "b"]);
        let scroll_id = first.scroll_id.expect("cursor");

        let second = backend
            .scroll_next(&scroll_id, SCROLL_KEEP_ALIVE)
            .await
            .expect("next");
        assert_eq!(ids(&second.page), vec!["c"]);

        let third = backend
            .scroll_next(&scroll_id, SCROLL_KEEP_ALIVE)
            .await
            .expect("next");
        assert!(third.page.is_empty());

        backend.clear_scroll(&scroll_id).await.expect("clear");
        assert_eq!(backend.open_scrolls().await, 0);
    }
}
