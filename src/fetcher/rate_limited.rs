//! Single politeness gate for all search traffic

use tokio::sync::Mutex;
use tracing::debug;

use super::{FetcherError, FetcherResult, PageRequest, PageResponse, SearchFetcher};
use crate::downloader::rate_limit::RateLimiter;

/// Serialises every call to the wrapped fetcher behind a [`RateLimiter`]
///
/// At most one call is in flight at any time; calls are issued in the order
/// they arrive. Primary and backfill queries share this gate, so they share
/// a single quota.
pub struct RateLimitedFetcher<F> {
    inner: F,
    limiter: RateLimiter,
    in_flight: Mutex<()>,
}

impl<F: SearchFetcher> RateLimitedFetcher<F> {
    /// Wrap `inner` behind `limiter`
    pub fn new(inner: F, limiter: RateLimiter) -> Self {
        Self {
            inner,
            limiter,
            in_flight: Mutex::new(()),
        }
    }

    /// Wait for the limiter, then fetch one page
    ///
    /// # Errors
    /// Returns [`FetcherError`] on limiter, network or parse failure
    pub async fn execute(&self, request: &PageRequest) -> FetcherResult<PageResponse> {
        let _guard = self.in_flight.lock().await;

        self.limiter
            .acquire()
            .await
            .map_err(|e| FetcherError::RateLimiter(e.to_string()))?;

        debug!(
            cursor = request.cursor.as_deref().unwrap_or("-"),
            "Issuing search request"
        );
        self.inner.fetch_page(request).await
    }
}
