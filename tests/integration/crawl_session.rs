//! End-to-end crawl sessions against a scripted search API

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use social_archive_downloader::anonymise::{anonymise_hash, Anonymiser};
use social_archive_downloader::downloader::{ArchiveCrawler, CrawlConfig, RateLimiter};
use social_archive_downloader::fetcher::{
    FetcherResult, PageRequest, PageResponse, RateLimitedFetcher, SearchFetcher,
};
use social_archive_downloader::output::{PLACES_FILE, POSTS_FILE, PROPERTIES_FILE, USERS_FILE};
use social_archive_downloader::pipeline::{ResponsePipeline, SessionInfo};
use social_archive_downloader::SearchPage;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const SALT: &str = "integration-salt";

/// Serves canned responses in order; empty pages once the script runs out
struct ScriptedApi {
    script: Mutex<VecDeque<FetcherResult<PageResponse>>>,
    seen: Mutex<Vec<PageRequest>>,
}

impl ScriptedApi {
    fn new(script: Vec<Value>) -> Arc<Self> {
        let script = script
            .into_iter()
            .map(|body| match body.get("status").and_then(Value::as_u64) {
                Some(status) => Ok(PageResponse::status(status as u16)),
                None => Ok(PageResponse::ok(serde_json::from_value(body).unwrap())),
            })
            .collect();
        Arc::new(Self {
            script: Mutex::new(script),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn queries(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|r| r.query.clone()).collect()
    }
}

#[async_trait]
impl SearchFetcher for ScriptedApi {
    async fn fetch_page(&self, request: &PageRequest) -> FetcherResult<PageResponse> {
        self.seen.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PageResponse::ok(SearchPage::default())))
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 6, 1, 0, 0, 0).unwrap()
}

fn end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 7, 1, 0, 0, 0).unwrap()
}

fn session_crawler(api: Arc<ScriptedApi>, dir: &Path) -> ArchiveCrawler<Arc<ScriptedApi>> {
    let pipeline = ResponsePipeline::create(
        dir,
        Anonymiser::new(SALT).unwrap(),
        SessionInfo {
            query: "storm".to_string(),
            start_time: start(),
            end_time: Some(end()),
        },
        None,
    )
    .unwrap();
    let config = CrawlConfig::default()
        .with_extra_delay(Duration::ZERO)
        .with_backoffs(Duration::from_millis(10), Duration::from_millis(10));
    ArchiveCrawler::new(
        RateLimitedFetcher::new(api, RateLimiter::unlimited()),
        pipeline,
        config,
    )
}

fn read_jsonl(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn primary_page() -> Value {
    json!({
        "data": [
            {
                "id": "900", "conversation_id": "900", "author_id": "31",
                "created_at": "2020-06-10T08:30:45.000Z",
                "text": "storm warning, stay safe @dana",
                "in_reply_to_user_id": "77",
                "edit_history_tweet_ids": ["900"],
                "public_metrics": {"reply_count": 2, "like_count": 12},
                "entities": {
                    "mentions": [{"start": 25, "end": 30, "username": "dana", "id": "77"}],
                    "hashtags": [{"start": 0, "end": 5, "tag": "storm"}],
                    "urls": [{"start": 31, "end": 54, "url": "https://t.co/q1",
                              "expanded_url": "https://twitter.com/Dana/status/850",
                              "display_url": "twitter.com/Dana/status/850"}]
                },
                "referenced_tweets": [{"type": "quoted", "id": "850"}],
                "geo": {"place_id": "pl1"}
            },
            {
                "id": "901", "conversation_id": "901", "author_id": "32",
                "created_at": "2020-06-12T19:00:00.000Z",
                "text": "no replies here",
                "public_metrics": {"reply_count": 0}
            }
        ],
        "includes": {
            "users": [
                {"id": "31", "username": "eve", "name": "Eve Example",
                 "public_metrics": {"followers_count": 1200, "following_count": 300,
                                    "tweet_count": 5000, "listed_count": 4}},
                {"id": "32", "username": "frank", "name": "Frank",
                 "public_metrics": {"followers_count": 0, "following_count": 0,
                                    "tweet_count": 1, "listed_count": 0}}
            ],
            "places": [{"id": "pl1", "full_name": "Harbour Town", "country_code": "GB"}]
        },
        "meta": {"result_count": 2, "next_token": "page2"}
    })
}

#[tokio::test]
async fn test_session_writes_anonymised_artifacts() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("storm");
    let api = ScriptedApi::new(vec![
        primary_page(),
        json!({"status": 429}),
        json!({"meta": {"result_count": 0}}),
        json!({
            "data": [
                {"id": "902", "conversation_id": "900", "author_id": "33",
                 "created_at": "2020-06-10T09:00:00.000Z", "text": "@eve thanks",
                 "public_metrics": {"reply_count": 0}},
                {"id": "903", "conversation_id": "900", "author_id": "31",
                 "created_at": "2020-06-10T09:05:00.000Z", "text": "np",
                 "public_metrics": {"reply_count": 0}}
            ],
            "meta": {"result_count": 2}
        }),
    ]);
    let mut crawler = session_crawler(api.clone(), &out);

    let totals = crawler
        .download_archive("storm", start(), Some(end()))
        .await
        .unwrap();
    crawler.into_pipeline().end().unwrap();

    assert_eq!(
        api.queries(),
        vec![
            "storm -is:retweet",
            "storm -is:retweet",
            "storm -is:retweet",
            "conversation_id:900 -is:retweet",
        ]
    );
    assert_eq!(totals.requests, 4);
    assert_eq!(totals.responses, 2);
    assert_eq!(totals.posts, 4);
    assert_eq!(totals.replies, 2);
    assert_eq!(totals.users, 2);
    assert_eq!(totals.places, 1);
    assert_eq!(totals.backfill_queries, 1);

    let posts = read_jsonl(&out.join(POSTS_FILE));
    assert_eq!(posts.len(), 4);
    let first = &posts[0];
    assert_eq!(first["id"], anonymise_hash("900", SALT));
    assert_eq!(first["in_reply_to_user_id"], anonymise_hash("77", SALT));
    assert_eq!(first["referenced_tweets"][0]["id"], anonymise_hash("850", SALT));
    assert_eq!(first["entities"]["mentions"], json!([anonymise_hash("dana", SALT)]));
    assert_eq!(first["entities"]["hashtags"], json!([{"tag": "storm"}]));
    assert_eq!(first["entities"]["urls"], json!([{"url": "https://t.co/q1"}]));
    assert_eq!(first["edit_history_tweet_ids"], json!([anonymise_hash("900", SALT)]));
    assert_eq!(first["created_at"], "2020-06-10T08:30:00Z");
    assert_eq!(first["public_metrics"]["like_count"], 12);
    assert_eq!(posts[2]["conversation_id"], anonymise_hash("900", SALT));

    let users = read_jsonl(&out.join(USERS_FILE));
    assert_eq!(users.len(), 2);
    let followers = users[0]["public_metrics"]["followers_count"].as_u64().unwrap();
    assert!((1190..=1210).contains(&followers));
    let listed = users[1]["public_metrics"]["listed_count"].as_u64().unwrap();
    assert!(listed <= 3);

    let places = read_jsonl(&out.join(PLACES_FILE));
    assert_eq!(places[0]["full_name"], "Harbour Town");

    let properties = std::fs::read_to_string(out.join(PROPERTIES_FILE)).unwrap();
    assert!(properties.contains("query\tstorm\n"));
    assert!(properties.contains("min_timestamp\t2020-06-10T08:30:00Z\n"));
    assert!(properties.contains("max_timestamp\t2020-06-12T19:00:00Z\n"));
}

#[tokio::test]
async fn test_artifacts_contain_no_plaintext_identity() {
    let temp_dir = TempDir::new().unwrap();
    let api = ScriptedApi::new(vec![primary_page()]);
    let mut crawler = session_crawler(api, temp_dir.path());

    crawler
        .download_archive("storm", start(), Some(end()))
        .await
        .unwrap();
    crawler.into_pipeline().end().unwrap();

    let posts = std::fs::read_to_string(temp_dir.path().join(POSTS_FILE)).unwrap();
    let users = std::fs::read_to_string(temp_dir.path().join(USERS_FILE)).unwrap();
    for needle in [
        "\"900\"",
        "\"31\"",
        "\"77\"",
        "\"850\"",
        "status/850",
        "@dana",
        "\"dana\"",
        "Dana",
    ] {
        assert!(!posts.contains(needle), "posts.jsonl leaks {needle}");
    }
    for needle in ["\"31\"", "\"eve\"", "Eve Example", "\"frank\"", "\"Frank\""] {
        assert!(!users.contains(needle), "users.jsonl leaks {needle}");
    }
}

#[tokio::test]
async fn test_abandoned_backfill_does_not_stop_session() {
    let temp_dir = TempDir::new().unwrap();
    let mut script = vec![json!({
        "data": [{"id": "1", "conversation_id": "1", "author_id": "2",
                  "created_at": "2020-06-02T00:00:00.000Z", "text": "thread",
                  "public_metrics": {"reply_count": 5}}],
        "meta": {"result_count": 1}
    })];
    script.extend(std::iter::repeat(json!({"status": 503})).take(6));
    let api = ScriptedApi::new(script);
    let mut crawler = session_crawler(api.clone(), temp_dir.path());

    let totals = crawler
        .download_archive("storm", start(), Some(end()))
        .await
        .unwrap();
    crawler.into_pipeline().end().unwrap();

    assert_eq!(totals.posts, 1);
    assert_eq!(totals.abandoned_queries, 1);
    assert_eq!(totals.backfill_queries, 1);
    assert_eq!(api.queries().len(), 7);
}
