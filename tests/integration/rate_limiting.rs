//! Integration tests for rate limiting functionality

use async_trait::async_trait;
use chrono::Utc;
use social_archive_downloader::downloader::RateLimiter;
use social_archive_downloader::fetcher::{
    FetcherResult, PageRequest, PageResponse, RateLimitedFetcher, SearchFetcher,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Records when each call started and which query it carried
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(Instant, String)>>,
}

#[async_trait]
impl SearchFetcher for Recorder {
    async fn fetch_page(&self, request: &PageRequest) -> FetcherResult<PageResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), request.query.clone()));
        Ok(PageResponse::status(200))
    }
}

fn request(query: &str) -> PageRequest {
    PageRequest {
        query: query.to_string(),
        start_time: Utc::now(),
        end_time: None,
        page_size: 100,
        cursor: None,
    }
}

#[test]
fn test_rate_limiter_request_based_initialization() {
    let limiter = RateLimiter::request_based(300, Duration::from_secs(900));
    assert_eq!(limiter.max_requests(), 300);
    assert_eq!(limiter.available(), 300);
    assert_eq!(limiter.min_spacing(), Duration::ZERO);
}

#[tokio::test]
async fn test_rate_limiter_request_based_acquire() {
    let limiter = RateLimiter::request_based(10, Duration::from_secs(1));

    limiter.acquire().await.unwrap();
    limiter.acquire().await.unwrap();
    limiter.acquire().await.unwrap();

    assert_eq!(limiter.available(), 7);
}

#[tokio::test]
async fn test_quota_replenishes_after_window() {
    let limiter = RateLimiter::request_based(1, Duration::from_millis(60));

    limiter.acquire().await.unwrap();
    assert_eq!(limiter.available(), 0);

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(limiter.available(), 1);
}

#[tokio::test]
async fn test_primary_and_backfill_share_one_gate() {
    let recorder = Arc::new(Recorder::default());
    let limiter = RateLimiter::request_based(2, Duration::from_millis(100))
        .with_min_spacing(Duration::from_millis(10));
    let gate = Arc::new(RateLimitedFetcher::new(recorder.clone(), limiter));

    let started = Instant::now();
    let primary = {
        let gate = gate.clone();
        tokio::spawn(async move {
            gate.execute(&request("primary")).await.unwrap();
            gate.execute(&request("primary")).await.unwrap();
        })
    };
    let backfill = {
        let gate = gate.clone();
        tokio::spawn(async move {
            gate.execute(&request("conversation_id:1")).await.unwrap();
        })
    };
    primary.await.unwrap();
    backfill.await.unwrap();

    let calls = recorder.calls.lock().unwrap();
    assert_eq!(calls.len(), 3);

    // Third call waited for a quota slot to come back
    assert!(calls[2].0 - started >= Duration::from_millis(100));

    for pair in calls.windows(2) {
        assert!(pair[1].0 - pair[0].0 >= Duration::from_millis(10));
    }
}

#[tokio::test]
async fn test_waiters_are_not_dropped() {
    let recorder = Arc::new(Recorder::default());
    let limiter = RateLimiter::request_based(3, Duration::from_millis(30));
    let gate = Arc::new(RateLimitedFetcher::new(recorder.clone(), limiter));

    let handles: Vec<_> = (0..9)
        .map(|i| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.execute(&request(&format!("q{i}"))).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(recorder.calls.lock().unwrap().len(), 9);
}
