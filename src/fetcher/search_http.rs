//! HTTP client for the full-archive search endpoint
//!
//! Issues exactly one GET per call. Retrying is the crawler's job: this
//! client only reports what happened (status or transport error).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::{FetcherError, FetcherResult, PageRequest, PageResponse, SearchFetcher};
use crate::credentials::Credentials;
use crate::metrics::SearchRequestMetrics;
use crate::SearchPage;

/// Production API host
pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

/// Full-archive search endpoint path
pub const SEARCH_ENDPOINT: &str = "/2/tweets/search/all";

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Field selections requested with every page
const FIELD_PARAMS: [(&str, &str); 5] = [
    (
        "tweet.fields",
        "id,conversation_id,author_id,created_at,text,public_metrics,referenced_tweets,entities,attachments,geo,lang,in_reply_to_user_id,possibly_sensitive,source",
    ),
    ("user.fields", "id,username,name,created_at,public_metrics,verified,protected"),
    ("place.fields", "id,full_name,name,country,country_code,geo,place_type"),
    ("media.fields", "media_key,type,url,preview_image_url,duration_ms,height,width"),
    (
        "expansions",
        "author_id,geo.place_id,attachments.media_keys,referenced_tweets.id.author_id",
    ),
];

/// HTTP implementation of [`SearchFetcher`]
pub struct SearchHttpClient {
    client: Client,
    base_url: String,
}

impl SearchHttpClient {
    /// Create a client authenticated with `credentials`
    ///
    /// The user agent carries the contact address so the API operator can
    /// reach whoever runs the crawl.
    pub fn new(credentials: &Credentials, base_url: impl Into<String>) -> FetcherResult<Self> {
        let mut headers = HeaderMap::new();

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", credentials.bearer_token()))
            .map_err(|e| FetcherError::ConfigError(format!("invalid bearer token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let agent = user_agent(credentials.contact_address());
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&agent)
                .map_err(|e| FetcherError::ConfigError(format!("invalid contact address: {e}")))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetcherError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// All query parameters for `request`, field selections included
    pub fn build_params(request: &PageRequest) -> Vec<(&'static str, String)> {
        let mut params = request.to_query_params();
        params.extend(FIELD_PARAMS.iter().map(|(k, v)| (*k, v.to_string())));
        params
    }
}

#[async_trait]
impl SearchFetcher for SearchHttpClient {
    async fn fetch_page(&self, request: &PageRequest) -> FetcherResult<PageResponse> {
        let url = format!("{}{}", self.base_url, SEARCH_ENDPOINT);
        let params = Self::build_params(request);
        let metrics = SearchRequestMetrics::start(SEARCH_ENDPOINT);

        debug!("Making GET request to: {} with {} params", url, params.len());

        let response = match self.client.get(&url).query(&params).send().await {
            Ok(response) => response,
            Err(e) => {
                metrics.record_network_error();
                return Err(FetcherError::NetworkError(e.to_string()));
            }
        };

        let status = response.status();
        metrics.record_complete(status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %body.chars().take(300).collect::<String>(),
                "Search request returned an error status"
            );
            return Ok(PageResponse::status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetcherError::NetworkError(format!("Failed to read body: {e}")))?;

        let page: SearchPage = serde_json::from_str(&body)
            .map_err(|e| FetcherError::ParseError(format!("Failed to deserialize response: {e}")))?;

        Ok(PageResponse {
            status: status.as_u16(),
            page,
        })
    }
}

/// User agent sent with every request
pub fn user_agent(contact_address: &str) -> String {
    format!(
        "{}/{} (Rust; {} {}; {}) research-archive",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
        contact_address
    )
}
