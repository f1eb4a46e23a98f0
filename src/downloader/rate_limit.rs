//! Request rate limiting
//!
//! Combines a replenishing quota (at most N requests per window) with a fixed
//! minimum spacing between consecutive requests. Waiters are served in FIFO
//! order: tokio's semaphore and mutex are both fair.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::debug;

use crate::metrics::RateLimiterMetrics;

/// Rate limiter shared by every request of a session
#[derive(Clone)]
pub struct RateLimiter {
    quota: Arc<Semaphore>,
    max_requests: usize,
    window: Duration,
    min_spacing: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Create a request-based rate limiter
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests per window
    /// * `window` - Time after which a used request slot is returned
    pub fn request_based(max_requests: usize, window: Duration) -> Self {
        Self {
            quota: Arc::new(Semaphore::new(max_requests)),
            max_requests,
            window,
            min_spacing: Duration::ZERO,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Require at least `min_spacing` between the starts of consecutive requests
    pub fn with_min_spacing(mut self, min_spacing: Duration) -> Self {
        self.min_spacing = min_spacing;
        self
    }

    /// A limiter that never waits, for tests and offline tools
    pub fn unlimited() -> Self {
        Self::request_based(Semaphore::MAX_PERMITS, Duration::ZERO)
    }

    /// Maximum requests per window
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Quota window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Minimum spacing between requests
    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Request slots currently available
    pub fn available(&self) -> usize {
        self.quota.available_permits()
    }

    /// Wait until one more request may be sent
    ///
    /// Blocks while the quota is exhausted and then until `min_spacing` has
    /// passed since the previous request. Never drops a request.
    pub async fn acquire(&self) -> Result<(), RateLimitError> {
        let mut metrics = RateLimiterMetrics::new();
        metrics.start_acquire();

        // Hold the slot for one window, then return it to the pool
        let permit = self
            .quota
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| RateLimitError::AcquireError(e.to_string()))?;

        if !self.window.is_zero() {
            let window = self.window;
            tokio::spawn(async move {
                sleep(window).await;
                drop(permit);
            });
        }

        let mut last_request = self.last_request.lock().await;
        if let Some(previous) = *last_request {
            let ready_at = previous + self.min_spacing;
            if ready_at > Instant::now() {
                debug!(
                    wait_ms = (ready_at - Instant::now()).as_millis(),
                    "Waiting for minimum request spacing"
                );
                sleep_until(ready_at).await;
            }
        }
        *last_request = Some(Instant::now());

        metrics.record_acquired();
        metrics.update_available_permits(self.available());
        Ok(())
    }
}

/// Rate limiter errors
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Failed to acquire permits
    #[error("failed to acquire rate limit permits: {0}")]
    AcquireError(String),
}
