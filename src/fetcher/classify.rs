//! Response classification and retry message formatting
//!
//! Every fetch result falls into exactly one [`ResponseClass`]. The crawler
//! only retries [`ResponseClass::RateLimited`] and
//! [`ResponseClass::ServerError`]; everything else either proceeds or ends
//! the current query.

use std::time::Duration;

use super::{FetcherError, FetcherResult, PageResponse};
use crate::SearchPage;

/// Outcome of one fetch
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseClass {
    /// 2xx with at least one result
    Success(SearchPage),
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    ServerError(u16),
    /// 2xx with zero results
    EmptyResult,
    /// Network/parse failure, or a request the API refused outright
    TransportFailure(String),
}

impl ResponseClass {
    /// Short label used in logs and metric labels
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::RateLimited => "rate_limited",
            Self::ServerError(_) => "server_error",
            Self::EmptyResult => "empty",
            Self::TransportFailure(_) => "transport_failure",
        }
    }
}

/// Classify a fetch result
pub fn classify(result: FetcherResult<PageResponse>) -> ResponseClass {
    let response = match result {
        Ok(response) => response,
        Err(e) => return ResponseClass::TransportFailure(e.to_string()),
    };

    match response.status {
        429 => ResponseClass::RateLimited,
        status if (500..600).contains(&status) => ResponseClass::ServerError(status),
        status if (200..300).contains(&status) => {
            if response.page.is_empty() {
                ResponseClass::EmptyResult
            } else {
                ResponseClass::Success(response.page)
            }
        }
        status => ResponseClass::TransportFailure(
            FetcherError::NetworkError(format!("request rejected with status {status}")).to_string(),
        ),
    }
}

/// Failure classes that are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryCause {
    /// Quota exhausted (HTTP 429)
    RateLimit,
    /// Server-side failure (HTTP 5xx)
    ServerError(u16),
}

impl RetryCause {
    /// User-friendly description used inside retry log messages
    pub fn description(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
        }
    }

    /// Suggested remediation when retries are exhausted
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::RateLimit => "Another client may be sharing this bearer token's quota",
            Self::ServerError(_) => "The search API may be experiencing issues, try again later",
        }
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::ServerError(_) => "server_error",
        }
    }
}

/// Context for formatting retry messages
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Maximum number of retries for this cause
    pub max_retries: u32,
    /// What went wrong
    pub cause: RetryCause,
    /// Backoff before the next attempt
    pub backoff: Duration,
    /// Query being crawled
    pub query: String,
}

impl RetryContext {
    /// Standardised retry message
    pub fn format_retry(&self) -> String {
        format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds... ({})",
            self.attempt,
            self.max_retries,
            self.cause.description(),
            self.backoff.as_secs_f64(),
            truncate(&self.query, 80)
        )
    }

    /// Final message when the query is abandoned
    pub fn format_failure(&self) -> String {
        [
            format!("[ABANDONED] Query given up after {} retries", self.max_retries),
            format!("  Last error: {}", self.cause.description()),
            format!("  Query: {}", truncate(&self.query, 200)),
            format!("  Suggestion: {}", self.cause.suggestion()),
        ]
        .join("\n")
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
