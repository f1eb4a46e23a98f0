//! Crawl orchestration and rate limiting
//!
//! This module provides the crawl engine: pagination, retry/backoff,
//! conversation backfill and the shared rate limiter.
//!
//! # Overview
//!
//! A crawl session runs in four steps:
//!
//! 1. **Options**: Describe the session with [`CrawlOptions`]
//! 2. **Setup**: [`crawl`] validates the options, loads credentials and opens the output artifacts
//! 3. **Crawling**: [`crawler::ArchiveCrawler`] follows the primary query's cursor chain,
//!    then every conversation batch assembled by [`conversation_queue::ConversationBatchQueue`]
//! 4. **Finalize**: The pipeline is ended exactly once and [`RunTotals`] returned
//!
//! # Quick Start
//!
//! ```no_run
//! use social_archive_downloader::downloader::{crawl, CrawlOptions};
//! use chrono::{TimeZone, Utc};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = CrawlOptions::new(
//!     "heatwave",
//!     Utc.with_ymd_and_hms(2022, 7, 1, 0, 0, 0).unwrap(),
//!     "./credentials.toml",
//!     "./heatwave",
//! )
//! .with_download_replies(false);
//!
//! let totals = crawl(options).await?;
//! println!("{totals}");
//! # Ok(())
//! # }
//! ```
//!
//! # Components
//!
//! - [`crawler`] - Per-query loop with retry decisions and backfill scheduling
//! - [`conversation_queue`] - Length-bounded batching of conversation ids
//! - [`rate_limit`] - Rate limiting implementation
//! - [`config`] - Default constants and [`CrawlConfig`]
//! - [`totals`] - Session counters
//!
//! # Error Handling
//!
//! Only setup problems and output failures surface as [`DownloadError`]:
//! - Validation errors (bad arguments, bad credentials) before any request
//! - Output errors (unwritable directory or file) at any point
//!
//! Network failures, rate limiting and server errors are handled per query
//! and only show up in logs and [`RunTotals`].

use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use crate::anonymise::{AnonymiseError, Anonymiser};
use crate::credentials::{Credentials, CredentialsError};
use crate::fetcher::search_http::DEFAULT_BASE_URL;
use crate::fetcher::{FetcherError, RateLimitedFetcher, SearchHttpClient};
use crate::metrics::CrawlMetrics;
use crate::pipeline::{PipelineError, ResponsePipeline, SessionInfo};

pub mod config;
pub mod conversation_queue;
pub mod crawler;
pub mod rate_limit;
pub mod totals;

pub use config::CrawlConfig;
pub use conversation_queue::{ConversationBacklog, ConversationBatchQueue};
pub use crawler::{ArchiveCrawler, CrawlQuery, GiveUpReason, RetryDecision};
pub use rate_limit::{RateLimitError, RateLimiter};
pub use totals::RunTotals;

/// Download errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Invalid arguments
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Credentials could not be loaded
    #[error("credentials error: {0}")]
    CredentialsError(#[from] CredentialsError),

    /// Anonymiser could not be built
    #[error("anonymisation error: {0}")]
    AnonymiseError(#[from] AnonymiseError),

    /// HTTP client could not be built
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Output could not be created or written
    #[error("output error: {0}")]
    OutputError(#[from] PipelineError),
}

/// Everything one crawl session needs
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Search query, without the exclusion clause
    pub query: String,
    /// Oldest creation time to match
    pub start_time: DateTime<Utc>,
    /// Newest creation time to match
    pub end_time: Option<DateTime<Utc>>,
    /// TOML credentials file
    pub credentials_path: PathBuf,
    /// Directory receiving the artifacts
    pub output_dir: PathBuf,
    /// Drop posts whose text matches this pattern
    pub exclude_pattern: Option<String>,
    /// API host
    pub base_url: String,
    /// Requests per quota window
    pub quota_requests: usize,
    /// Quota window length
    pub quota_window: Duration,
    /// Minimum spacing between requests
    pub min_spacing: Duration,
    /// Crawler knobs
    pub config: CrawlConfig,
}

impl CrawlOptions {
    /// Options with default limits and crawler configuration
    pub fn new(
        query: impl Into<String>,
        start_time: DateTime<Utc>,
        credentials_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            query: query.into(),
            start_time,
            end_time: None,
            credentials_path: credentials_path.into(),
            output_dir: output_dir.into(),
            exclude_pattern: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            quota_requests: config::QUOTA_REQUESTS,
            quota_window: config::QUOTA_WINDOW,
            min_spacing: Duration::from_millis(config::MIN_REQUEST_SPACING_MS),
            config: CrawlConfig::default(),
        }
    }

    /// Set the window end
    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Set results per page
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Set the batched query length bound
    pub fn with_max_query_length(mut self, max_query_length: usize) -> Self {
        self.config.max_query_length = max_query_length;
        self
    }

    /// Enable or disable reply-thread backfill
    pub fn with_download_replies(mut self, download_replies: bool) -> Self {
        self.config.download_replies = download_replies;
        self
    }

    /// Set the retry bound per failure class
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Drop posts whose text matches `pattern`
    pub fn with_exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_pattern = Some(pattern.into());
        self
    }

    /// Send requests to another host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the crawler configuration
    pub fn with_config(mut self, config: CrawlConfig) -> Self {
        self.config = config;
        self
    }

    /// Check the options and compile the exclusion pattern
    ///
    /// # Errors
    /// Returns [`DownloadError::ValidationError`] describing the first problem
    pub fn validate(&self) -> Result<Option<Regex>, DownloadError> {
        if self.query.trim().is_empty() {
            return Err(DownloadError::ValidationError(
                "search query cannot be empty".to_string(),
            ));
        }
        if let Some(end_time) = self.end_time {
            if end_time <= self.start_time {
                return Err(DownloadError::ValidationError(format!(
                    "end time {end_time} must be after start time {}",
                    self.start_time
                )));
            }
        }
        if self.quota_requests == 0 {
            return Err(DownloadError::ValidationError(
                "quota must allow at least one request".to_string(),
            ));
        }
        self.config.validate().map_err(DownloadError::ValidationError)?;

        self.exclude_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| DownloadError::ValidationError(format!("invalid exclude pattern: {e}")))
    }
}

/// Run one crawl session end to end
///
/// Validation and credential problems are reported before any request is
/// sent. The output artifacts are finalized exactly once, also when the
/// crawl itself fails.
pub async fn crawl(options: CrawlOptions) -> Result<RunTotals, DownloadError> {
    let exclude_pattern = options.validate()?;
    let credentials = Credentials::load(&options.credentials_path)?;
    let anonymiser = Anonymiser::new(credentials.anonymise_salt())?;

    let client = SearchHttpClient::new(&credentials, options.base_url.as_str())?;
    let limiter = RateLimiter::request_based(options.quota_requests, options.quota_window)
        .with_min_spacing(options.min_spacing);

    // Last fallible step before the crawl, so every opened pipeline gets ended
    let session = SessionInfo {
        query: options.query.clone(),
        start_time: options.start_time,
        end_time: options.end_time,
    };
    let pipeline =
        ResponsePipeline::create(&options.output_dir, anonymiser, session, exclude_pattern)?;

    info!(
        query = %options.query,
        start_time = %options.start_time,
        end_time = ?options.end_time,
        output = %options.output_dir.display(),
        replies = options.config.download_replies,
        "Starting crawl session"
    );
    let metrics = CrawlMetrics::start(&options.query);

    let mut crawler = ArchiveCrawler::new(
        RateLimitedFetcher::new(client, limiter),
        pipeline,
        options.config,
    );
    let result = crawler
        .download_archive(&options.query, options.start_time, options.end_time)
        .await;
    let ended = crawler.into_pipeline().end();

    match (result, ended) {
        (Ok(totals), Ok(())) => {
            metrics.record_success(totals.posts, totals.replies);
            Ok(totals)
        }
        (Err(e), ended) => {
            if let Err(end_error) = ended {
                error!(error = %end_error, "Failed to finalize output after crawl failure");
            }
            metrics.record_failure(&e.to_string());
            Err(e)
        }
        (Ok(_), Err(e)) => {
            metrics.record_failure(&e.to_string());
            Err(e.into())
        }
    }
}
