//! Paged fetching from source APIs
//!
//! A [`PageSource`] knows how one vendor paginates (offset windows or opaque
//! cursor tokens); [`PagedFetcher`] drives it until exhaustion. A failed page
//! keeps the pages retrieved before it (partial-result semantics) so
//! downstream transformation still has something to work with.

use crate::error::{Result, SyncError};
use crate::model::{Cursor, Page, SourceRecord};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Hard cap on pages per fetch, guarding against sources that echo the same
/// cursor back forever.
pub const MAX_PAGES: usize = 10_000;

/// Default per-request timeout. Every outbound call carries one; no request
/// may block indefinitely.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Credentials applied to each outbound request.
///
/// Signed-request schemes reduce to precomputed header pairs per request, so
/// `Headers` covers them without a dedicated variant.
#[derive(Debug, Clone, Default)]
pub enum AuthContext {
    #[default]
    None,
    Bearer(String),
    Basic {
        user: String,
        password: Option<String>,
    },
    Headers(Vec<(String, String)>),
}

impl AuthContext {
    /// Apply the credentials to a request builder
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            AuthContext::None => request,
            AuthContext::Bearer(token) => request.bearer_auth(token),
            AuthContext::Basic { user, password } => request.basic_auth(user, password.as_deref()),
            AuthContext::Headers(pairs) => pairs
                .iter()
                .fold(request, |req, (name, value)| req.header(name.as_str(), value.as_str())),
        }
    }
}

/// Injectable retry policy for page requests.
///
/// The default matches the observed integrations: no retry. Only retryable
/// failures (transport errors, 5xx) are re-attempted.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Per-source pagination strategy.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the page at `cursor` (`None` for the first page).
    async fn fetch_page(&self, client: &Client, cursor: Option<&Cursor>) -> Result<Page>;
}

/// Offset/limit pagination: the cursor is a numeric offset advanced by the
/// number of records each page returned. A short page terminates.
pub struct OffsetPager {
    url: String,
    auth: AuthContext,
    query: Vec<(String, String)>,
    page_size: usize,
    offset_param: String,
    limit_param: String,
    records_pointer: Option<String>,
}

impl OffsetPager {
    pub fn new(url: impl Into<String>, auth: AuthContext, page_size: usize) -> Self {
        Self {
            url: url.into(),
            auth,
            query: Vec::new(),
            page_size: page_size.max(1),
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            records_pointer: None,
        }
    }

    /// Add a fixed query parameter (e.g. a search expression) to every page request
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Override the offset/limit parameter names for sources that spell them differently
    pub fn with_params(mut self, offset_param: impl Into<String>, limit_param: impl Into<String>) -> Self {
        self.offset_param = offset_param.into();
        self.limit_param = limit_param.into();
        self
    }

    /// JSON pointer to the record array when the response wraps it (e.g. `/reply/endpoints`)
    pub fn with_records_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.records_pointer = Some(pointer.into());
        self
    }
}

#[async_trait]
impl PageSource for OffsetPager {
    async fn fetch_page(&self, client: &Client, cursor: Option<&Cursor>) -> Result<Page> {
        let offset = match cursor {
            Some(Cursor::Offset(n)) => *n,
            _ => 0,
        };

        let request = client
            .get(&self.url)
            .query(&self.query)
            .query(&[
                (self.offset_param.as_str(), offset.to_string()),
                (self.limit_param.as_str(), self.page_size.to_string()),
            ]);

        let response = self.auth.apply(request).send().await?;
        let (_, records) = read_page(response, self.records_pointer.as_deref()).await?;

        let next_cursor = if records.is_empty() || records.len() < self.page_size {
            None
        } else {
            Some(Cursor::Offset(offset + records.len() as u64))
        };

        Ok(Page { records, next_cursor })
    }
}

/// Cursor-token pagination: the next-page token is read from a configurable
/// JSON pointer in each response and echoed back as a query parameter.
pub struct CursorPager {
    url: String,
    auth: AuthContext,
    query: Vec<(String, String)>,
    cursor_param: String,
    cursor_pointer: String,
    records_pointer: Option<String>,
}

impl CursorPager {
    pub fn new(
        url: impl Into<String>,
        auth: AuthContext,
        cursor_param: impl Into<String>,
        cursor_pointer: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            auth,
            query: Vec::new(),
            cursor_param: cursor_param.into(),
            cursor_pointer: cursor_pointer.into(),
            records_pointer: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_records_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.records_pointer = Some(pointer.into());
        self
    }
}

#[async_trait]
impl PageSource for CursorPager {
    async fn fetch_page(&self, client: &Client, cursor: Option<&Cursor>) -> Result<Page> {
        let mut request = client.get(&self.url).query(&self.query);

        if let Some(cursor) = cursor {
            let value = match cursor {
                Cursor::Token(token) => token.clone(),
                Cursor::Offset(n) => n.to_string(),
            };
            request = request.query(&[(self.cursor_param.as_str(), value)]);
        }

        let response = self.auth.apply(request).send().await?;
        let (body, records) = read_page(response, self.records_pointer.as_deref()).await?;

        Ok(Page {
            records,
            next_cursor: next_cursor_from(&body, &self.cursor_pointer),
        })
    }
}

fn next_cursor_from(body: &Value, pointer: &str) -> Option<Cursor> {
    match body.pointer(pointer) {
        Some(Value::String(token)) if !token.is_empty() => Some(Cursor::Token(token.clone())),
        Some(Value::Number(n)) => n.as_u64().map(Cursor::Offset),
        _ => None,
    }
}

/// Classify the response status and pull the record array out of the body.
async fn read_page(response: Response, records_pointer: Option<&str>) -> Result<(Value, Vec<SourceRecord>)> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SyncError::Auth {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SyncError::fetch(status.as_u16(), body));
    }

    let body: Value = response.json().await?;
    let node = match records_pointer {
        Some(pointer) => body.pointer(pointer).unwrap_or(&Value::Null),
        None => &body,
    };
    let records = match node {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect(),
        _ => Vec::new(),
    };

    Ok((body, records))
}

/// Result of draining a source: the pages that were retrieved, plus the error
/// that cut the fetch short, if any.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub pages: Vec<Page>,
    pub error: Option<SyncError>,
}

impl FetchOutcome {
    pub fn record_count(&self) -> usize {
        self.pages.iter().map(|page| page.records.len()).sum()
    }

    pub fn into_records(self) -> Vec<SourceRecord> {
        self.pages
            .into_iter()
            .flat_map(|page| page.records)
            .collect()
    }
}

/// Drives a [`PageSource`] to exhaustion with timeout, retry and loop guards.
pub struct PagedFetcher {
    client: Client,
    retry: RetryPolicy,
    max_pages: usize,
}

impl PagedFetcher {
    /// Create a fetcher whose HTTP client carries the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            retry: RetryPolicy::none(),
            max_pages: MAX_PAGES,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying HTTP client, for sinks and enrichers that want to share it
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetch pages until the source is exhausted.
    ///
    /// On failure the pages already retrieved are returned alongside the
    /// error rather than discarded.
    pub async fn fetch_all(&self, source: &dyn PageSource) -> FetchOutcome {
        let mut pages: Vec<Page> = Vec::new();
        let mut cursor: Option<Cursor> = None;

        for page_index in 0..self.max_pages {
            let page = match self.fetch_with_retry(source, cursor.as_ref()).await {
                Ok(page) => page,
                Err(error) => {
                    warn!(
                        page = page_index,
                        pages_kept = pages.len(),
                        error = %error,
                        "page fetch failed; keeping pages retrieved so far"
                    );
                    return FetchOutcome {
                        pages,
                        error: Some(error),
                    };
                }
            };

            if page.records.is_empty() {
                debug!(page = page_index, "empty page; source exhausted");
                break;
            }

            let next = page.next_cursor.clone();
            pages.push(page);

            match next {
                None => break,
                Some(next) if cursor.as_ref() == Some(&next) => {
                    warn!(?next, "source echoed the same cursor back; stopping");
                    break;
                }
                Some(next) => cursor = Some(next),
            }
        }

        if pages.len() == self.max_pages {
            warn!(max_pages = self.max_pages, "page safety limit reached");
        }

        FetchOutcome { pages, error: None }
    }

    async fn fetch_with_retry(&self, source: &dyn PageSource, cursor: Option<&Cursor>) -> Result<Page> {
        let mut attempt = 1;
        loop {
            match source.fetch_page(&self.client, cursor).await {
                Ok(page) => return Ok(page),
                Err(error) if attempt < self.retry.max_attempts && error.is_retryable() => {
                    warn!(attempt, error = %error, "retrying page fetch");
                    tokio::time::sleep(self.retry.backoff).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
