//! `crawl` against a local HTTP stand-in for the search API

use chrono::{TimeZone, Utc};
use social_archive_downloader::downloader::{crawl, CrawlOptions, DownloadError};
use social_archive_downloader::output::{POSTS_FILE, PROPERTIES_FILE};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const CREDENTIALS: &str = r#"
api_key = "key"
api_secret_key = "secret"
bearer_token = "test-token"
contact_address = "lab@example.org"
anonymise_salt = "salt"
"#;

/// Answer every connection with the next canned (status, body) pair and
/// record the raw request heads
async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let seen = requests.clone();
    tokio::spawn(async move {
        for (status, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };

            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            seen.lock().unwrap().push(String::from_utf8_lossy(&head).into_owned());

            let response = format!(
                "HTTP/1.1 {status} OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{addr}"), requests)
}

fn write_credentials(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("credentials.toml");
    std::fs::write(&path, CREDENTIALS).unwrap();
    path
}

fn options(base_url: &str, dir: &Path) -> CrawlOptions {
    let mut options = CrawlOptions::new(
        "tide",
        Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
        write_credentials(dir),
        dir.join("out"),
    )
    .with_end_time(Utc.with_ymd_and_hms(2021, 1, 2, 0, 0, 0).unwrap())
    .with_base_url(base_url)
    .with_download_replies(false);
    options.min_spacing = Duration::ZERO;
    options.config = options.config.with_extra_delay(Duration::ZERO);
    options
}

#[tokio::test]
async fn test_crawl_over_http() {
    let body = r#"{
        "data": [{"id": "5", "conversation_id": "5", "author_id": "6",
                  "created_at": "2021-01-01T10:00:00.000Z", "text": "high tide",
                  "public_metrics": {"reply_count": 0}}],
        "meta": {"result_count": 1}
    }"#;
    let (base_url, requests) = serve(vec![(200, body.to_string())]).await;
    let temp_dir = TempDir::new().unwrap();

    let totals = crawl(options(&base_url, temp_dir.path())).await.unwrap();

    assert_eq!(totals.posts, 1);
    assert_eq!(totals.requests, 1);

    let out = temp_dir.path().join("out");
    let posts = std::fs::read_to_string(out.join(POSTS_FILE)).unwrap();
    assert_eq!(posts.lines().count(), 1);
    assert!(out.join(PROPERTIES_FILE).exists());

    let requests = requests.lock().unwrap();
    let head = requests[0].to_lowercase();
    assert!(head.starts_with("get /2/tweets/search/all?"));
    assert!(head.contains("authorization: bearer test-token"));
    assert!(head.contains("lab@example.org"));
    assert!(head.contains("max_results=100"));
    assert!(head.contains("start_time=2021-01-01t00%3a00%3a00z"));
}

#[tokio::test]
async fn test_rejected_request_ends_query_quietly() {
    let (base_url, _requests) =
        serve(vec![(400, r#"{"title": "Invalid Request"}"#.to_string())]).await;
    let temp_dir = TempDir::new().unwrap();

    let totals = crawl(options(&base_url, temp_dir.path())).await.unwrap();
    assert_eq!(totals.requests, 1);
    assert_eq!(totals.responses, 0);
    assert_eq!(totals.posts, 0);
}

#[tokio::test]
async fn test_unwritable_output_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let blocker = temp_dir.path().join("out");
    std::fs::write(&blocker, "not a directory").unwrap();

    let result = crawl(options("http://127.0.0.1:1", temp_dir.path())).await;
    assert!(matches!(result, Err(DownloadError::OutputError(_))));
}
