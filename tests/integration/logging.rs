//! Integration tests for logging and tracing

use tracing::{error, info, warn, Instrument};
use tracing_subscriber::EnvFilter;

#[test]
fn test_tracing_subscriber_initialization() {
    // try_init fails harmlessly when another test already installed one
    let result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("social_archive_downloader=debug")),
        )
        .with_test_writer()
        .try_init();

    assert!(result.is_ok() || result.is_err());
}

#[test]
fn test_tracing_with_different_log_levels() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("social_archive_downloader=trace"))
        .with_test_writer()
        .try_init();

    info!("This is an info message");
    warn!("This is a warning message");
    error!("This is an error message");
}

#[test]
fn test_tracing_json_format() {
    let result = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::new("social_archive_downloader=info"))
        .with_test_writer()
        .try_init();

    assert!(result.is_ok() || result.is_err());
}

#[test]
fn test_env_filter_parsing() {
    for directive in [
        "info",
        "social_archive_downloader=debug",
        "warn,social_archive_downloader=trace",
        "social_archive_downloader::downloader::crawler=debug,social_archive_downloader=info",
    ] {
        assert!(EnvFilter::try_new(directive).is_ok(), "{directive}");
    }
}

#[test]
fn test_structured_logging_fields() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("social_archive_downloader=debug"))
        .with_test_writer()
        .try_init();

    let query = "flood -is:retweet";
    let cursor = "b26v89c19zqg8o3fo7";
    let attempt = 2;

    warn!(
        query = %query,
        cursor = %cursor,
        attempt = attempt,
        backoff_ms = 30_000u64,
        "Retrying after backoff delay"
    );
}

#[tokio::test]
async fn test_query_span_wraps_async_work() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("social_archive_downloader=debug"))
        .with_test_writer()
        .try_init();

    let span = tracing::info_span!("crawl_query", query = "flood", backfill = false);
    let pages = async {
        info!("Inside span");
        tokio::task::yield_now().await;
        3
    }
    .instrument(span)
    .await;

    assert_eq!(pages, 3);
}
