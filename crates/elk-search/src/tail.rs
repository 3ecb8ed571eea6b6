//! The poll/dedup engine.
//!
//! A [`Tail`] runs one initial search, prints the results oldest first, then
//! (when following) polls for entries newer than the last one seen. Each
//! follow-up poll re-reads a short window before the last timestamp to catch
//! late-indexed entries, and excludes the ids already printed.

use std::cmp::Ordering;
use std::io::Write;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::backend::{SCROLL_KEEP_ALIVE, SearchBackend};
use crate::error::{Result, SearchError};
use crate::format::Template;
use crate::index::select_indices;
use crate::query::{SearchRequest, build_search_query, build_timestamp_filtered_query};
use crate::timestamp::{TAILING_TIME_WINDOW, compare_timestamps, cutoff};
use crate::types::{
    DisplayedEntry, QueryDefinition, SearchHit, SearchPage, SearchTarget, SortOrder,
};
use crate::window::DedupWindow;

/// Page size of follow-up polls.
pub const FOLLOW_UP_PAGE_SIZE: usize = 9000;

/// Adaptive delay between follow-up polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    /// Delay after a poll that returned hits.
    pub initial: Duration,
    /// Added after each poll without hits.
    pub step: Duration,
    /// Upper bound of the delay.
    pub max: Duration,
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(500),
            Duration::from_millis(500),
            Duration::from_millis(2000),
        )
    }
}

impl Backoff {
    /// Creates a backoff starting at `initial`.
    #[must_use]
    pub const fn new(initial: Duration, step: Duration, max: Duration) -> Self {
        Self {
            initial,
            step,
            max,
            current: initial,
        }
    }

    /// Delay to wait before the next poll.
    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }

    /// Records the outcome of a poll and returns the next delay.
    pub fn record(&mut self, hits: u64) -> Duration {
        self.current = if hits > 0 {
            self.initial
        } else {
            (self.current + self.step).min(self.max)
        };
        self.current
    }
}

/// Tails a set of indices, writing rendered entries to `W`.
pub struct Tail<B, W> {
    backend: B,
    indices: Vec<String>,
    query: QueryDefinition,
    order: SortOrder,
    template: Template,
    last_timestamp: Option<String>,
    window: DedupWindow,
    backoff: Backoff,
    out: W,
}

impl<B: SearchBackend, W: Write> Tail<B, W> {
    /// Lists the backend's indices and selects the ones to search.
    ///
    /// # Errors
    ///
    /// Returns an error if the indices cannot be listed or none matches.
    pub async fn new(
        backend: B,
        target: &SearchTarget,
        query: QueryDefinition,
        out: W,
    ) -> Result<Self> {
        Self::new_at(backend, target, query, out, Local::now().date_naive()).await
    }

    /// Like [`Tail::new`], with an explicit date for "today".
    ///
    /// # Errors
    ///
    /// Returns an error if the indices cannot be listed or none matches.
    pub async fn new_at(
        backend: B,
        target: &SearchTarget,
        query: QueryDefinition,
        out: W,
        today: NaiveDate,
    ) -> Result<Self> {
        let names = backend.index_names().await.map_err(|e| match e {
            SearchError::Backend { message } => {
                SearchError::backend(format!("could not fetch available indices: {message}"))
            }
            other => other,
        })?;
        let indices = select_indices(&names, &target.index_pattern, &query, today)?;
        Ok(Self::with_indices(backend, indices, query, out))
    }

    /// Creates a tail over an explicit index list.
    #[must_use]
    pub fn with_indices(backend: B, indices: Vec<String>, query: QueryDefinition, out: W) -> Self {
        let order = query.sort_order();
        let template = Template::new(query.format.clone());
        Self {
            backend,
            indices,
            query,
            order,
            template,
            last_timestamp: None,
            window: DedupWindow::new(),
            backoff: Backoff::default(),
            out,
        }
    }

    /// Indices being searched.
    #[must_use]
    pub fn indices(&self) -> &[String] {
        &self.indices
    }

    /// Sort order of the initial search.
    #[must_use]
    pub const fn order(&self) -> SortOrder {
        self.order
    }

    /// Timestamp of the newest displayed entry.
    ///
    /// Late arrivals older than this do not replace it.
    #[must_use]
    pub fn last_timestamp(&self) -> Option<&str> {
        self.last_timestamp.as_deref()
    }

    /// Entries remembered for duplicate suppression.
    #[must_use]
    pub const fn window(&self) -> &DedupWindow {
        &self.window
    }

    /// Current poll backoff.
    #[must_use]
    pub const fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Output sink.
    #[must_use]
    pub const fn output(&self) -> &W {
        &self.out
    }

    /// Consumes the tail and returns its output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs the tail.
    ///
    /// Without `follow` this returns after the initial search. With it, polls
    /// forever.
    ///
    /// # Errors
    ///
    /// Returns the first backend, document or output error.
    pub async fn run(&mut self, follow: bool, initial_entries: usize) -> Result<()> {
        let page = self.initial_search(initial_entries).await?;
        self.process_page(&page)?;

        while follow {
            self.trim_window();
            sleep(self.backoff.current()).await;
            let page = self.poll(initial_entries).await?;
            self.process_page(&page)?;
            let delay = self.backoff.record(page.total_hits);
            trace!(delay = ?delay, hits = page.total_hits, "next poll delay");
        }
        Ok(())
    }

    /// Searches for the most recent `initial_entries` entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend search fails.
    pub async fn initial_search(&self, initial_entries: usize) -> Result<SearchPage> {
        let request = SearchRequest {
            indices: self.indices.clone(),
            sort_field: self.query.timestamp_field.clone(),
            order: self.order,
            query: build_search_query(&self.query),
            from: 0,
            size: initial_entries,
        };
        self.backend.search(&request).await
    }

    /// Runs one follow-up poll without sleeping.
    ///
    /// Until a timestamp is known this repeats the initial search.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails or the last timestamp is invalid.
    pub async fn poll(&self, initial_entries: usize) -> Result<SearchPage> {
        let Some(last) = &self.last_timestamp else {
            return self.initial_search(initial_entries).await;
        };
        let request = SearchRequest {
            indices: self.indices.clone(),
            sort_field: self.query.timestamp_field.clone(),
            order: SortOrder::Ascending,
            query: build_timestamp_filtered_query(&self.query, last, &self.window)?,
            from: 0,
            size: FOLLOW_UP_PAGE_SIZE,
        };
        self.backend.search(&request).await
    }

    /// Displays a page and updates the dedup window.
    ///
    /// Pages from the initial search are in the run's sort order; follow-up
    /// pages are ascending. Returns the number of lines written.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed documents or when writing fails.
    pub fn process_page(&mut self, page: &SearchPage) -> Result<usize> {
        let order = if self.last_timestamp.is_some() {
            SortOrder::Ascending
        } else {
            self.order
        };
        self.process_hits(&page.hits, order, page.total_hits)
    }

    fn process_hits(&mut self, hits: &[SearchHit], order: SortOrder, total: u64) -> Result<usize> {
        trace!(fetched = hits.len(), total, "processing page");

        let mut written = 0;
        let ordered: Box<dyn Iterator<Item = &SearchHit>> = match order {
            SortOrder::Ascending => Box::new(hits.iter()),
            SortOrder::Descending => Box::new(hits.iter().rev()),
        };
        for hit in ordered {
            if self.process_hit(hit)? {
                written += 1;
            }
        }
        self.out.flush()?;
        Ok(written)
    }

    /// Forgets displayed entries that fell out of the overlap window before
    /// the last timestamp.
    ///
    /// A last timestamp that cannot be parsed leaves the window as it is.
    pub fn trim_window(&mut self) {
        let Some(last) = &self.last_timestamp else {
            return;
        };
        match cutoff(last, TAILING_TIME_WINDOW) {
            Ok(cutoff) => {
                self.window.drain_older_than(&cutoff);
            }
            Err(e) => warn!(error = %e, "keeping dedup window untrimmed"),
        }
    }

    fn process_hit(&mut self, hit: &SearchHit) -> Result<bool> {
        let Value::Object(source) = &hit.source else {
            return Err(SearchError::MalformedDocument {
                id: hit.id.clone(),
                reason: "source is not a JSON object".to_string(),
            });
        };
        let timestamp = source
            .get(&self.query.timestamp_field)
            .and_then(Value::as_str)
            .ok_or_else(|| SearchError::MissingTimestamp {
                id: hit.id.clone(),
                field: self.query.timestamp_field.clone(),
            })?
            .to_string();

        let written = match self.template.render_line(&hit.source) {
            Some(line) => {
                writeln!(self.out, "{line}")?;
                true
            }
            None => false,
        };

        let newer = self
            .last_timestamp
            .as_deref()
            .is_none_or(|last| compare_timestamps(&timestamp, last) != Ordering::Less);
        self.window.push(DisplayedEntry::new(timestamp.clone(), hit.id.clone()));
        // A late arrival never moves the overlap window backwards.
        if newer {
            self.last_timestamp = Some(timestamp);
        }
        Ok(written)
    }

    /// Lists every entry in the date range through a scroll cursor.
    ///
    /// Entries are fetched oldest first in pages of `page_size`. Returns the
    /// number of entries processed.
    ///
    /// # Errors
    ///
    /// Returns the first backend, document or output error.
    pub async fn extract_range(&mut self, page_size: usize) -> Result<u64> {
        let request = SearchRequest {
            indices: self.indices.clone(),
            sort_field: self.query.timestamp_field.clone(),
            order: SortOrder::Ascending,
            query: build_search_query(&self.query),
            from: 0,
            size: page_size.max(1),
        };
        let first = self.backend.search_scroll(&request, SCROLL_KEEP_ALIVE).await?;
        info!(total = first.page.total_hits, "extracting date range");

        let mut scroll_id = first.scroll_id;
        let mut page = first.page;
        let mut processed = 0u64;
        let result = loop {
            if page.is_empty() {
                break Ok(processed);
            }
            if let Err(e) = self.process_hits(&page.hits, SortOrder::Ascending, page.total_hits) {
                break Err(e);
            }
            self.trim_window();
            processed += page.hits.len() as u64;

            let Some(id) = scroll_id.as_deref() else {
                break Ok(processed);
            };
            match self.backend.scroll_next(id, SCROLL_KEEP_ALIVE).await {
                Ok(next) => {
                    debug!(fetched = next.page.hits.len(), processed, "scroll page");
                    if next.scroll_id.is_some() {
                        scroll_id = next.scroll_id;
                    }
                    page = next.page;
                }
                Err(e) => break Err(e),
            }
        };

        if let Some(id) = scroll_id.as_deref() {
            if let Err(e) = self.backend.clear_scroll(id).await {
                warn!(error = %e, "failed to clear scroll cursor");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FakeSearchBackend;
    use crate::timestamp::{format_timestamp, parse_timestamp};
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashSet;

    const INDEX: &str = "logstash-2016.06.17";

    async fn insert(backend: &FakeSearchBackend, id: &str, ts: &str) {
        backend
            .insert(INDEX, id, json!({ "@timestamp": ts, "message": format!("msg {id}") }))
            .await;
    }

    fn tail(backend: &FakeSearchBackend, query: QueryDefinition) -> Tail<FakeSearchBackend, Vec<u8>> {
        Tail::with_indices(backend.clone(), vec![INDEX.to_string()], query, Vec::new())
    }

    fn lines(tail: &Tail<FakeSearchBackend, Vec<u8>>) -> Vec<String> {
        String::from_utf8_lossy(tail.output())
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn backoff_sequence() {
        let mut backoff = Backoff::default();
        assert_eq!(backoff.current(), Duration::from_millis(500));
        assert_eq!(backoff.record(3), Duration::from_millis(500));
        assert_eq!(backoff.record(0), Duration::from_millis(1000));
        assert_eq!(backoff.record(0), Duration::from_millis(1500));
        assert_eq!(backoff.record(0), Duration::from_millis(2000));
        assert_eq!(backoff.record(0), Duration::from_millis(2000));
        assert_eq!(backoff.record(1), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn new_selects_latest_index() {
        let backend = FakeSearchBackend::with_indices([
            "logstash-2016.06.16",
            "logstash-2016.06.17",
            ".kibana",
        ]);
        let tail = Tail::new_at(
            backend,
            &SearchTarget::default(),
            QueryDefinition::default(),
            Vec::<u8>::new(),
            NaiveDate::from_ymd_opt(2016, 6, 17).expect("date"),
        )
        .await
        .expect("tail");
        assert_eq!(tail.indices(), ["logstash-2016.06.17".to_string()]);
        assert_eq!(tail.order(), SortOrder::Descending);
    }

    #[tokio::test]
    async fn new_fails_without_matching_index() {
        let backend = FakeSearchBackend::with_indices([".kibana"]);
        let result = Tail::new(
            backend,
            &SearchTarget::default(),
            QueryDefinition::default(),
            Vec::<u8>::new(),
        )
        .await;
        assert!(matches!(result, Err(SearchError::NoMatchingIndex { .. })));
    }

    #[tokio::test]
    async fn initial_page_is_printed_oldest_first() {
        let backend = FakeSearchBackend::new();
        insert(&backend, "1", "2016-06-17T10:00:01Z").await;
        insert(&backend, "2", "2016-06-17T10:00:02Z").await;
        insert(&backend, "3", "2016-06-17T10:00:03Z").await;

        let mut tail = tail(&backend, QueryDefinition::default());
        tail.run(false, 2).await.expect("run");

        assert_eq!(lines(&tail), vec!["msg 2", "msg 3"]);
        assert_eq!(tail.last_timestamp(), Some("2016-06-17T10:00:03Z"));
        let request = &backend.requests().await[0];
        assert_eq!(request.order, SortOrder::Descending);
        assert_eq!(request.size, 2);
    }

    #[tokio::test]
    async fn after_bound_lists_ascending() {
        let backend = FakeSearchBackend::new();
        insert(&backend, "1", "2016-06-17T10:00:01Z").await;
        insert(&backend, "2", "2016-06-17T10:00:02Z").await;
        insert(&backend, "3", "2016-06-17T10:00:03Z").await;

        let query = QueryDefinition {
            after: Some("2016-06-17T10:00:02Z".to_string()),
            ..QueryDefinition::default()
        };
        let mut tail = tail(&backend, query);
        tail.run(false, 50).await.expect("run");
        assert_eq!(lines(&tail), vec!["msg 2", "msg 3"]);
        assert_eq!(backend.requests().await[0].order, SortOrder::Ascending);
    }

    #[tokio::test]
    async fn follow_up_polls_skip_displayed_entries() {
        let backend = FakeSearchBackend::new();
        insert(&backend, "1", "2016-06-17T10:00:01.000Z").await;
        insert(&backend, "2", "2016-06-17T10:00:01.200Z").await;

        let mut tail = tail(&backend, QueryDefinition::default());
        let page = tail.initial_search(50).await.expect("search");
        tail.process_page(&page).expect("process");

        // Late arrival inside the overlap window, plus a newer entry.
        insert(&backend, "3", "2016-06-17T10:00:01.100Z").await;
        insert(&backend, "4", "2016-06-17T10:00:02.000Z").await;

        let page = tail.poll(50).await.expect("poll");
        assert_eq!(tail.process_page(&page).expect("process"), 2);

        let page = tail.poll(50).await.expect("poll");
        assert_eq!(tail.process_page(&page).expect("process"), 0);

        assert_eq!(lines(&tail), vec!["msg 1", "msg 2", "msg 3", "msg 4"]);
        let follow_up = &backend.requests().await[1];
        assert_eq!(follow_up.order, SortOrder::Ascending);
        assert_eq!(follow_up.size, FOLLOW_UP_PAGE_SIZE);
    }

    #[tokio::test]
    async fn trim_window_drops_entries_before_the_overlap() {
        let backend = FakeSearchBackend::new();
        insert(&backend, "1", "2016-06-17T10:00:00Z").await;
        insert(&backend, "2", "2016-06-17T10:00:05Z").await;
        insert(&backend, "3", "2016-06-17T10:00:05.200Z").await;

        let mut tail = tail(&backend, QueryDefinition::default());
        let page = tail.initial_search(50).await.expect("search");
        tail.process_page(&page).expect("process");
        assert_eq!(tail.window().len(), 3);

        tail.trim_window();
        assert_eq!(tail.window().ids().collect::<Vec<_>>(), vec!["2", "3"]);
    }

    #[tokio::test]
    async fn trim_window_keeps_entries_after_a_trimmed_cutoff() {
        let backend = FakeSearchBackend::new();
        insert(&backend, "A", "2016-06-17T10:00:00.100Z").await;
        insert(&backend, "B", "2016-06-17T10:00:00.500Z").await;

        let mut tail = tail(&backend, QueryDefinition::default());
        let page = tail.initial_search(50).await.expect("search");
        tail.process_page(&page).expect("process");
        tail.trim_window();
        assert_eq!(tail.window().ids().collect::<Vec<_>>(), vec!["A", "B"]);

        let page = tail.poll(50).await.expect("poll");
        assert_eq!(tail.process_page(&page).expect("process"), 0);
        assert_eq!(lines(&tail), vec!["msg A", "msg B"]);
    }

    #[tokio::test]
    async fn list_only_accepts_unparseable_timestamps() {
        let backend = FakeSearchBackend::new();
        backend
            .insert(INDEX, "1", json!({ "@timestamp": "yesterday", "message": "m" }))
            .await;
        let mut tail = tail(&backend, QueryDefinition::default());
        tail.run(false, 10).await.expect("run");
        assert_eq!(lines(&tail), vec!["m"]);

        tail.trim_window();
        assert_eq!(tail.window().len(), 1);
    }

    #[tokio::test]
    async fn zoneless_timestamps_are_listed_and_followed() {
        let backend = FakeSearchBackend::new();
        backend
            .insert(INDEX, "1", json!({ "@timestamp": "2016-06-17T10:00:00.123", "message": "m1" }))
            .await;
        let mut tail = tail(&backend, QueryDefinition::default());
        tail.run(false, 10).await.expect("run");
        assert_eq!(lines(&tail), vec!["m1"]);

        backend
            .insert(INDEX, "2", json!({ "@timestamp": "2016-06-17T10:00:01", "message": "m2" }))
            .await;
        tail.trim_window();
        let page = tail.poll(10).await.expect("poll");
        assert_eq!(tail.process_page(&page).expect("process"), 1);
        assert_eq!(lines(&tail), vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn late_arrival_does_not_rewind_last_timestamp() {
        let backend = FakeSearchBackend::new();
        insert(&backend, "1", "2016-06-17T10:00:00Z").await;
        insert(&backend, "2", "2016-06-17T10:00:00.600Z").await;

        let mut tail = tail(&backend, QueryDefinition::default());
        let page = tail.initial_search(50).await.expect("search");
        tail.process_page(&page).expect("process");
        tail.trim_window();
        assert_eq!(tail.window().ids().collect::<Vec<_>>(), vec!["2"]);

        insert(&backend, "3", "2016-06-17T10:00:00.200Z").await;
        let page = tail.poll(50).await.expect("poll");
        assert_eq!(tail.process_page(&page).expect("process"), 1);
        assert_eq!(tail.last_timestamp(), Some("2016-06-17T10:00:00.600Z"));

        tail.trim_window();
        let page = tail.poll(50).await.expect("poll");
        assert_eq!(tail.process_page(&page).expect("process"), 0);
        assert_eq!(lines(&tail), vec!["msg 1", "msg 2", "msg 3"]);
    }

    #[tokio::test]
    async fn poll_repeats_initial_search_until_first_hit() {
        let backend = FakeSearchBackend::new();
        let mut tail = tail(&backend, QueryDefinition::default());
        let page = tail.initial_search(10).await.expect("search");
        assert_eq!(tail.process_page(&page).expect("process"), 0);
        assert!(tail.window().is_empty());

        insert(&backend, "1", "2016-06-17T10:00:00Z").await;
        let page = tail.poll(10).await.expect("poll");
        assert_eq!(tail.process_page(&page).expect("process"), 1);
        assert_eq!(backend.requests().await[1].size, 10);
    }

    #[tokio::test]
    async fn non_object_source_is_fatal() {
        let backend = FakeSearchBackend::new();
        let mut tail = tail(&backend, QueryDefinition::default());
        let page = SearchPage {
            hits: vec![SearchHit::new("x", json!("plain text"))],
            total_hits: 1,
        };
        let err = tail.process_page(&page).expect_err("malformed");
        assert!(matches!(err, SearchError::MalformedDocument { .. }));
    }

    #[tokio::test]
    async fn missing_timestamp_is_fatal() {
        let backend = FakeSearchBackend::new();
        let mut tail = tail(&backend, QueryDefinition::default());
        let page = SearchPage {
            hits: vec![SearchHit::new("x", json!({ "@timestamp": 12, "message": "m" }))],
            total_hits: 1,
        };
        let err = tail.process_page(&page).expect_err("numeric timestamp");
        assert!(matches!(err, SearchError::MissingTimestamp { .. }));
    }

    #[tokio::test]
    async fn empty_lines_are_not_written() {
        let backend = FakeSearchBackend::new();
        backend
            .insert(INDEX, "1", json!({ "@timestamp": "2016-06-17T10:00:00Z" }))
            .await;
        let mut tail = tail(&backend, QueryDefinition::default());
        tail.run(false, 10).await.expect("run");
        assert!(tail.output().is_empty());
        assert_eq!(tail.window().len(), 1);
    }

    #[tokio::test]
    async fn backend_error_stops_the_run() {
        let backend = FakeSearchBackend::new();
        backend.fail_next("search_phase_execution_exception").await;
        let mut tail = tail(&backend, QueryDefinition::default());
        let err = tail.run(true, 10).await.expect_err("fatal");
        assert!(matches!(err, SearchError::Backend { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn follow_backs_off_while_idle() {
        let backend = FakeSearchBackend::new();
        insert(&backend, "1", "2016-06-17T10:00:00Z").await;
        let mut tail = tail(&backend, QueryDefinition::default());

        // 500 + 1000 + 1500 + 2000 + 2000 ms of idle polling fit in 7.1 s.
        let result = tokio::time::timeout(Duration::from_millis(7100), tail.run(true, 10)).await;
        assert!(result.is_err(), "follow mode never returns");

        assert_eq!(backend.requests().await.len(), 6);
        assert_eq!(tail.backoff().current(), Duration::from_millis(2000));
        assert_eq!(lines(&tail), vec!["msg 1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn follow_prints_each_entry_once() {
        let backend = FakeSearchBackend::new();
        insert(&backend, "0", "2016-06-17T10:00:00.000Z").await;

        let producer = {
            let backend = backend.clone();
            tokio::spawn(async move {
                for i in 1..=20u32 {
                    sleep(Duration::from_millis(130)).await;
                    let ts = format!("2016-06-17T10:00:{:02}.{:03}Z", i / 10, (i % 10) * 100);
                    insert(&backend, &i.to_string(), &ts).await;
                }
            })
        };

        let mut tail = tail(&backend, QueryDefinition::default());
        let _ = tokio::time::timeout(Duration::from_secs(10), tail.run(true, 10)).await;
        producer.await.expect("producer");

        let printed = lines(&tail);
        let unique: HashSet<&String> = printed.iter().collect();
        assert_eq!(printed.len(), 21);
        assert_eq!(unique.len(), 21);
    }

    #[tokio::test]
    async fn extract_range_reads_every_page() {
        let backend = FakeSearchBackend::new();
        for i in 0..7u32 {
            insert(&backend, &i.to_string(), &format!("2016-06-17T10:00:0{i}Z")).await;
        }
        let query = QueryDefinition {
            before: Some("2016-06-18".to_string()),
            ..QueryDefinition::default()
        };
        let mut tail = tail(&backend, query);
        let processed = tail.extract_range(3).await.expect("extract");

        assert_eq!(processed, 7);
        assert_eq!(
            lines(&tail),
            (0..7).map(|i| format!("msg {i}")).collect::<Vec<_>>()
        );
        assert_eq!(backend.open_scrolls().await, 0);
    }

    /// Timestamp `tenths` tenths of a second after 10:00, rendered the way
    /// cutoffs are, so whole seconds lose their fraction.
    fn stamp(tenths: i64) -> String {
        let base = parse_timestamp("2016-06-17T10:00:00Z").expect("base");
        format_timestamp(&(base + chrono::Duration::milliseconds(tenths * 100)))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        // Late arrivals stay within the overlap window of the newest entry,
        // so each one is fetched exactly once.
        #[test]
        fn polling_prints_every_entry_once(
            initial in proptest::collection::vec(0i64..50, 1..8),
            batches in proptest::collection::vec(
                proptest::collection::vec(-5i64..15, 0..6),
                1..8,
            ),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            let (printed, inserted) = runtime.block_on(async {
                let backend = FakeSearchBackend::new();
                let mut inserted = 0u32;
                let mut newest = i64::MIN;
                for tenths in &initial {
                    insert(&backend, &inserted.to_string(), &stamp(*tenths)).await;
                    inserted += 1;
                    newest = newest.max(*tenths);
                }

                let mut tail = tail(&backend, QueryDefinition::default());
                let page = tail.initial_search(10_000).await.expect("search");
                tail.process_page(&page).expect("process");

                for batch in &batches {
                    tail.trim_window();
                    let last = newest;
                    for delta in batch {
                        insert(&backend, &inserted.to_string(), &stamp(last + delta)).await;
                        inserted += 1;
                        newest = newest.max(last + delta);
                    }
                    let page = tail.poll(10_000).await.expect("poll");
                    tail.process_page(&page).expect("process");
                }
                (lines(&tail), inserted)
            });

            let unique: HashSet<&String> = printed.iter().collect();
            prop_assert_eq!(unique.len(), printed.len());
            prop_assert_eq!(printed.len(), inserted as usize);
        }
    }
}
