//! Elasticsearch client over HTTP.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, trace};
use url::Url;

use crate::backend::{ScrollPage, SearchBackend};
use crate::error::{Result, SearchError};
use crate::query::SearchRequest;
use crate::types::{SearchHit, SearchPage};

/// Port appended to URLs that name only a host.
pub const DEFAULT_PORT: u16 = 9200;

/// Timeout for the startup health check.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for every other request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static HAS_PORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r".*:\d+").unwrap_or_else(|_| unreachable!()));

static HOST_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"http://[^/]+$").unwrap_or_else(|_| unreachable!()));

/// Normalizes an operator-supplied URL.
///
/// Adds an `http://` scheme when none is given, and the default port when the
/// URL names only a host.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    let mut url = url.to_string();
    if !url.starts_with("http") {
        url = format!("http://{url}");
        trace!(url = %url, "added http:// prefix");
    }
    if !HAS_PORT.is_match(&url) && HOST_ONLY.is_match(&url) {
        url = format!("{url}:{DEFAULT_PORT}");
        trace!(url = %url, "no port given, added default port");
    }
    url
}

/// Basic-auth credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub user: String,
    /// Password, if any.
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Object { value: u64 },
}

impl TotalHits {
    const fn value(&self) -> u64 {
        match self {
            Self::Count(value) | Self::Object { value } => *value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    hits: HitsEnvelope,
}

impl SearchResponse {
    fn into_page(self) -> SearchPage {
        let total_hits = self
            .hits
            .total
            .as_ref()
            .map_or(self.hits.hits.len() as u64, TotalHits::value);
        SearchPage {
            hits: self.hits.hits,
            total_hits,
        }
    }

    fn into_scroll_page(self) -> ScrollPage {
        let scroll_id = self.scroll_id.clone();
        ScrollPage {
            scroll_id,
            page: self.into_page(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IndexRow {
    index: String,
}

/// Renders a keep-alive as an Elasticsearch time value.
fn keep_alive_param(keep_alive: Duration) -> String {
    let secs = keep_alive.as_secs().max(1);
    if secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

/// HTTP client for an Elasticsearch cluster.
#[derive(Debug, Clone)]
pub struct ElasticClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    trace_bodies: bool,
}

impl ElasticClient {
    /// Creates a client for `url` without contacting the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or the HTTP client cannot
    /// be built.
    pub fn new(url: &str, credentials: Option<Credentials>, trace_bodies: bool) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| SearchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            credentials,
            trace_bodies,
        })
    }

    /// Creates a client and verifies the server answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or the health check
    /// fails.
    pub async fn connect(
        url: &str,
        credentials: Option<Credentials>,
        trace_bodies: bool,
    ) -> Result<Self> {
        let client = Self::new(url, credentials, trace_bodies)?;
        client.health_check().await?;
        info!(url = %client.base_url, "connected to elasticsearch");
        Ok(client)
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends `GET /` and checks for a success status.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or answers with an error.
    pub async fn health_check(&self) -> Result<()> {
        let request = self
            .request(Method::GET, "")
            .timeout(HEALTH_CHECK_TIMEOUT);
        let body: Value = self.execute(request, None).await.map_err(|e| {
            SearchError::backend(format!(
                "could not connect to elasticsearch at {}: {e}",
                self.base_url
            ))
        })?;
        if let Some(version) = body.pointer("/version/number").and_then(Value::as_str) {
            debug!(version, "elasticsearch version");
        }
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match &self.credentials {
            Some(credentials) => {
                builder.basic_auth(&credentials.user, credentials.password.as_ref())
            }
            None => builder,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        body: Option<&Value>,
    ) -> Result<T> {
        let builder = match body {
            Some(body) => builder.json(body),
            None => builder,
        };
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();

        if self.trace_bodies {
            match body {
                Some(body) => trace!(%method, %url, body = %body, "request"),
                None => trace!(%method, %url, "request"),
            }
        }

        let response = self.http.execute(request).await?;
        let status = response.status();
        let text = response.text().await?;

        if self.trace_bodies {
            trace!(%method, %url, status = status.as_u16(), body = %text, "response");
        }

        if !status.is_success() {
            return Err(error_from_response(status, &text));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn error_from_response(status: StatusCode, body: &str) -> SearchError {
    let reason = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/reason")
                .or_else(|| v.pointer("/error/type"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());
    SearchError::backend(format!("{status}: {reason}"))
}

impl SearchBackend for ElasticClient {
    async fn index_names(&self) -> Result<Vec<String>> {
        let rows: Vec<IndexRow> = self
            .execute(self.request(Method::GET, "_cat/indices?format=json&h=index"), None)
            .await?;
        debug!(count = rows.len(), "listed indices");
        Ok(rows.into_iter().map(|row| row.index).collect())
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
        let path = format!("{}/_search", request.indices.join(","));
        let body = request.body();
        let response: SearchResponse = self
            .execute(self.request(Method::POST, &path), Some(&body))
            .await?;
        Ok(response.into_page())
    }

    async fn search_scroll(
        &self,
        request: &SearchRequest,
        keep_alive: Duration,
    ) -> Result<ScrollPage> {
        let path = format!(
            "{}/_search?scroll={}",
            request.indices.join(","),
            keep_alive_param(keep_alive)
        );
        let mut body = request.body();
        if let Some(map) = body.as_object_mut() {
            map.remove("from");
        }
        let response: SearchResponse = self
            .execute(self.request(Method::POST, &path), Some(&body))
            .await?;
        Ok(response.into_scroll_page())
    }

    async fn scroll_next(&self, scroll_id: &str, keep_alive: Duration) -> Result<ScrollPage> {
        let body = json!({ "scroll": keep_alive_param(keep_alive), "scroll_id": scroll_id });
        let response: SearchResponse = self
            .execute(self.request(Method::POST, "_search/scroll"), Some(&body))
            .await?;
        Ok(response.into_scroll_page())
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        let body = json!({ "scroll_id": [scroll_id] });
        let _: Value = self
            .execute(self.request(Method::DELETE, "_search/scroll"), Some(&body))
            .await?;
        Ok(())
    }
}
