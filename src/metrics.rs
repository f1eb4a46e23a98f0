//! Production observability metrics
//!
//! Metrics for search requests, retries, abandoned queries, the rate limiter
//! and written records.
//!
//! ## Architecture
//!
//! - Uses `metrics` crate for low-overhead metric collection
//! - Prometheus exporter for a scrape endpoint, installed only on request
//! - Without an installed recorder every macro is a no-op

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent; later calls are ignored.
///
/// # Arguments
/// * `addr` - Socket address to bind the Prometheus scrape endpoint
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "search_requests_total",
        Unit::Count,
        "Total number of search requests sent"
    );
    describe_histogram!(
        "search_request_duration_seconds",
        Unit::Seconds,
        "Search request duration in seconds"
    );
    describe_counter!(
        "search_retries_total",
        Unit::Count,
        "Total number of retry attempts, by cause"
    );
    describe_histogram!(
        "retry_backoff_duration_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );
    describe_counter!(
        "queries_abandoned_total",
        Unit::Count,
        "Queries given up before their cursor chain ended, by cause"
    );
    describe_counter!(
        "records_written_total",
        Unit::Count,
        "Records written to output artifacts, by kind"
    );
    describe_histogram!(
        "rate_limit_queue_wait_seconds",
        Unit::Seconds,
        "Time spent waiting for the rate limiter"
    );
    describe_gauge!(
        "rate_limit_permits_available",
        Unit::Count,
        "Request slots left in the current window"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}

/// Generate a new correlation ID for request tracing
pub fn generate_correlation_id() -> String {
    let id = CORRELATION_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("req-{id:08x}")
}

/// Timing and outcome of one search request
pub struct SearchRequestMetrics {
    endpoint: &'static str,
    start_time: Instant,
    correlation_id: String,
}

impl SearchRequestMetrics {
    /// Start recording a new request
    pub fn start(endpoint: &'static str) -> Self {
        let correlation_id = generate_correlation_id();
        debug!(correlation_id = %correlation_id, endpoint, "Starting search request");

        Self {
            endpoint,
            start_time: Instant::now(),
            correlation_id,
        }
    }

    /// Record completion with an HTTP status
    pub fn record_complete(&self, status_code: u16) {
        let duration = self.start_time.elapsed();

        counter!(
            "search_requests_total",
            "endpoint" => self.endpoint,
            "status" => status_code.to_string(),
        )
        .increment(1);
        histogram!("search_request_duration_seconds", "endpoint" => self.endpoint)
            .record(duration.as_secs_f64());

        if status_code == 429 {
            warn!(
                correlation_id = %self.correlation_id,
                duration_ms = duration.as_millis(),
                "Rate limit error (429) recorded"
            );
        }

        debug!(
            correlation_id = %self.correlation_id,
            status = status_code,
            duration_ms = duration.as_millis(),
            "Search request completed"
        );
    }

    /// Record a transport error (no status code)
    pub fn record_network_error(&self) {
        let duration = self.start_time.elapsed();

        counter!(
            "search_requests_total",
            "endpoint" => self.endpoint,
            "status" => "network_error",
        )
        .increment(1);
        histogram!("search_request_duration_seconds", "endpoint" => self.endpoint)
            .record(duration.as_secs_f64());

        warn!(
            correlation_id = %self.correlation_id,
            duration_ms = duration.as_millis(),
            "Network error recorded"
        );
    }

    /// Correlation ID for this request
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record a retry and its backoff
pub fn record_retry(cause: &'static str, backoff: Duration) {
    counter!("search_retries_total", "cause" => cause).increment(1);
    histogram!("retry_backoff_duration_seconds", "cause" => cause).record(backoff.as_secs_f64());
}

/// Record a query abandoned before its cursor chain ended
pub fn record_query_abandoned(cause: &'static str) {
    counter!("queries_abandoned_total", "cause" => cause).increment(1);
}

/// Record records written to an artifact
pub fn record_written(kind: &'static str, count: u64) {
    if count > 0 {
        counter!("records_written_total", "kind" => kind).increment(count);
    }
}

/// Rate limiter metrics helper
#[derive(Default)]
pub struct RateLimiterMetrics {
    start_time: Option<Instant>,
}

impl RateLimiterMetrics {
    /// Create a new rate limiter metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Start measuring queue wait time
    pub fn start_acquire(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Record successful permit acquisition
    pub fn record_acquired(&mut self) {
        if let Some(start) = self.start_time.take() {
            let wait_duration = start.elapsed();
            histogram!("rate_limit_queue_wait_seconds").record(wait_duration.as_secs_f64());

            if wait_duration.as_millis() > 100 {
                debug!(
                    wait_ms = wait_duration.as_millis(),
                    "Rate limit permit acquired after wait"
                );
            }
        }
    }

    /// Update available permits gauge
    pub fn update_available_permits(&self, available: usize) {
        gauge!("rate_limit_permits_available").set(available as f64);
    }
}

/// Whole-session metrics
pub struct CrawlMetrics {
    start_time: Instant,
}

impl CrawlMetrics {
    /// Start tracking a crawl session
    pub fn start(query: &str) -> Self {
        info!(query = %query, "Crawl session started");
        Self {
            start_time: Instant::now(),
        }
    }

    /// Record successful completion
    pub fn record_success(&self, posts: u64, replies: u64) {
        info!(
            posts,
            replies,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Crawl session completed successfully"
        );
    }

    /// Record a fatal failure
    pub fn record_failure(&self, error: &str) {
        error!(
            error = %error,
            duration_secs = self.start_time.elapsed().as_secs(),
            "Crawl session failed"
        );
    }
}
