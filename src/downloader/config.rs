//! Crawl configuration constants and knobs

use std::time::Duration;

use crate::fetcher::{MAX_PAGE_SIZE, MIN_PAGE_SIZE};

/// Clause appended to every primary query.
/// Retweets duplicate the original post's text and would inflate the corpus.
pub const DEFAULT_EXCLUSION_CLAUSE: &str = "-is:retweet";

/// Results requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper bound on the length of a batched conversation query.
/// The full-archive endpoint rejects queries longer than 1024 characters.
pub const DEFAULT_MAX_QUERY_LENGTH: usize = 1024;

/// Minimum spacing between two requests, in milliseconds.
/// The full-archive endpoint allows one request per second.
pub const MIN_REQUEST_SPACING_MS: u64 = 1000;

/// Requests allowed per quota window.
pub const QUOTA_REQUESTS: usize = 300;

/// Quota window length.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Extra delay after each request on top of the limiter's spacing.
pub const EXTRA_DELAY_MS: u64 = 500;

/// Backoff after an HTTP 429, in seconds.
pub const RATE_LIMIT_BACKOFF_SECS: u64 = 30;

/// Backoff after an HTTP 5xx, in seconds.
/// Server-side failures tend to last longer than quota hiccups.
pub const SERVER_ERROR_BACKOFF_SECS: u64 = 120;

/// Retries per failure class before a query is abandoned.
pub const MAX_RETRIES: u32 = 5;

/// Pages fetched for one query before the cursor chain is cut off.
pub const MAX_PAGES_PER_QUERY: u64 = 100_000;

/// Crawler knobs
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlConfig {
    /// Clause appended to primary queries and used as the batch postfix
    pub exclusion_clause: String,
    /// Results requested per page (10..=500)
    pub page_size: u32,
    /// Maximum length of a batched conversation query
    pub max_query_length: usize,
    /// Delay added after each request
    pub extra_delay: Duration,
    /// Backoff after an HTTP 429
    pub rate_limit_backoff: Duration,
    /// Backoff after an HTTP 5xx
    pub server_error_backoff: Duration,
    /// Retries allowed per failure class
    pub max_retries: u32,
    /// Page guard per query
    pub max_pages_per_query: u64,
    /// Crawl the reply threads of posts that have replies
    pub download_replies: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            exclusion_clause: DEFAULT_EXCLUSION_CLAUSE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
            extra_delay: Duration::from_millis(EXTRA_DELAY_MS),
            rate_limit_backoff: Duration::from_secs(RATE_LIMIT_BACKOFF_SECS),
            server_error_backoff: Duration::from_secs(SERVER_ERROR_BACKOFF_SECS),
            max_retries: MAX_RETRIES,
            max_pages_per_query: MAX_PAGES_PER_QUERY,
            download_replies: true,
        }
    }
}

impl CrawlConfig {
    /// Set the exclusion clause
    pub fn with_exclusion_clause(mut self, clause: impl Into<String>) -> Self {
        self.exclusion_clause = clause.into();
        self
    }

    /// Set results per page
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the batched query length bound
    pub fn with_max_query_length(mut self, max_query_length: usize) -> Self {
        self.max_query_length = max_query_length;
        self
    }

    /// Set the post-request delay
    pub fn with_extra_delay(mut self, delay: Duration) -> Self {
        self.extra_delay = delay;
        self
    }

    /// Set both retry backoffs
    pub fn with_backoffs(mut self, rate_limit: Duration, server_error: Duration) -> Self {
        self.rate_limit_backoff = rate_limit;
        self.server_error_backoff = server_error;
        self
    }

    /// Set the retry bound per failure class
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the page guard per query
    pub fn with_max_pages_per_query(mut self, max_pages: u64) -> Self {
        self.max_pages_per_query = max_pages;
        self
    }

    /// Enable or disable reply-thread backfill
    pub fn with_download_replies(mut self, download_replies: bool) -> Self {
        self.download_replies = download_replies;
        self
    }

    /// Check the knobs that have hard bounds
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(format!(
                "page size must be between {MIN_PAGE_SIZE} and {MAX_PAGE_SIZE}, got {}",
                self.page_size
            ));
        }
        if self.max_query_length == 0 {
            return Err("max query length must be greater than zero".to_string());
        }
        if self.max_pages_per_query == 0 {
            return Err("page guard must be greater than zero".to_string());
        }
        Ok(())
    }
}
