//! Search API transport
//!
//! [`SearchFetcher`] is the seam between the crawler and the network: one call
//! fetches one page. [`search_http::SearchHttpClient`] is the production
//! implementation; [`rate_limited::RateLimitedFetcher`] wraps any fetcher in
//! the single global politeness gate; [`classify`] turns raw results into the
//! outcome classes the crawler reacts to.

use crate::SearchPage;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

pub mod classify;
pub mod rate_limited;
pub mod search_http;

pub use classify::{classify, ResponseClass, RetryCause, RetryContext};
pub use rate_limited::RateLimitedFetcher;
pub use search_http::SearchHttpClient;

/// Smallest page size the search endpoint accepts
pub const MIN_PAGE_SIZE: u32 = 10;

/// Largest page size the search endpoint accepts
pub const MAX_PAGE_SIZE: u32 = 500;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Request could not be sent or the body could not be read
    #[error("network error: {0}")]
    NetworkError(String),

    /// Successful status but the body is not a search page
    #[error("parse error: {0}")]
    ParseError(String),

    /// Client could not be constructed
    #[error("client configuration error: {0}")]
    ConfigError(String),

    /// Rate limiter failure
    #[error("rate limiter error: {0}")]
    RateLimiter(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Parameters of a single page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Full query string, exclusion clause included
    pub query: String,
    /// Oldest creation time to match
    pub start_time: DateTime<Utc>,
    /// Newest creation time to match (open-ended when absent)
    pub end_time: Option<DateTime<Utc>>,
    /// Posts per page
    pub page_size: u32,
    /// Pagination cursor from the previous page
    pub cursor: Option<String>,
}

impl PageRequest {
    /// Query parameters describing this request (search string, window,
    /// page size, cursor)
    pub fn to_query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("query", self.query.clone()),
            ("start_time", format_timestamp(self.start_time)),
        ];
        if let Some(end_time) = self.end_time {
            params.push(("end_time", format_timestamp(end_time)));
        }
        params.push(("max_results", self.page_size.to_string()));
        if let Some(cursor) = &self.cursor {
            params.push(("next_token", cursor.clone()));
        }
        params
    }
}

/// A page together with the HTTP status it arrived with
///
/// Non-2xx responses carry an empty page; the status tells them apart from a
/// successful page with zero results.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse {
    /// HTTP status code
    pub status: u16,
    /// Parsed page (empty unless the status was 2xx)
    pub page: SearchPage,
}

impl PageResponse {
    /// Successful response carrying `page`
    pub fn ok(page: SearchPage) -> Self {
        Self { status: 200, page }
    }

    /// Non-success response with the given status
    pub fn status(status: u16) -> Self {
        Self {
            status,
            page: SearchPage::default(),
        }
    }
}

/// Fetches one page of search results
#[async_trait]
pub trait SearchFetcher: Send + Sync {
    /// Fetch a single page
    ///
    /// # Errors
    /// Returns [`FetcherError`] on network or parse failure; HTTP error
    /// statuses are returned as `Ok` with the status set
    async fn fetch_page(&self, request: &PageRequest) -> FetcherResult<PageResponse>;
}

#[async_trait]
impl<T: SearchFetcher + ?Sized> SearchFetcher for std::sync::Arc<T> {
    async fn fetch_page(&self, request: &PageRequest) -> FetcherResult<PageResponse> {
        (**self).fetch_page(request).await
    }
}

/// RFC 3339 timestamp with second precision, as the search API expects
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
