//! # Social Archive Downloader Library
//!
//! Downloads historical posts matching a search query from a paginated,
//! quota-limited full-archive search API, back-fills the reply threads of
//! posts that have replies, and anonymises every record before it touches
//! disk. The result is a research corpus in which identifiers are replaced by
//! salted hashes, so relational structure survives while plaintext ids,
//! usernames and display names do not.
//!
//! ## Quick Start
//!
//! ```no_run
//! use social_archive_downloader::downloader::{crawl, CrawlOptions};
//! use chrono::{TimeZone, Utc};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = CrawlOptions::new(
//!     "flood OR flooding",
//!     Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
//!     "./credentials.toml",
//!     "./output",
//! )
//! .with_end_time(Utc.with_ymd_and_hms(2021, 2, 1, 0, 0, 0).unwrap())
//! .with_page_size(500);
//!
//! let totals = crawl(options).await?;
//! println!("{} posts, {} replies", totals.posts, totals.replies);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`credentials`] - TOML credentials loading and validation
//! - [`fetcher`] - Search API transport, rate-limited gate and response classification
//! - [`downloader`] - Archive crawler, conversation batching, rate limiting and totals
//! - [`pipeline`] - Per-page processing: filtering, media resolution, anonymisation, output
//! - [`anonymise`] - Salted hashing and record anonymisation
//! - [`output`] - JSON-lines and properties writers
//! - [`metrics`] - Optional Prometheus metrics
//!
//! ## Data Types
//!
//! - [`Post`] - A post as returned by the search API
//! - [`User`] - An included user object
//! - [`Media`] - An included media object, referenced by posts through media keys
//! - [`SearchPage`] - One page of search results with its inclusions and metadata

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Salted hashing and record anonymisation
pub mod anonymise;

/// CLI command implementations
pub mod cli;

/// Credentials file loading
pub mod credentials;

/// Crawl orchestration, batching and rate limiting
pub mod downloader;

/// Search API transport
pub mod fetcher;

/// Production observability metrics
pub mod metrics;

/// Output artifact writers
pub mod output;

/// Response processing pipeline
pub mod pipeline;

// Re-export commonly used types
pub use credentials::Credentials;
pub use downloader::RunTotals;

/// A single post as returned by the search API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Post id
    pub id: String,
    /// Id shared by every post in the same reply thread
    pub conversation_id: String,
    /// Id of the posting user
    pub author_id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Post text
    pub text: String,
    /// Engagement counters
    #[serde(default)]
    pub public_metrics: PostMetrics,
    /// Posts this post quotes, replies to or reposts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referenced_tweets: Vec<ReferencedPost>,
    /// Parsed entities (mentions, hashtags, urls, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<Entities>,
    /// Attached media references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Attachments>,
    /// Any other field the API returned
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    /// Number of replies this post has received
    pub fn reply_count(&self) -> u64 {
        self.public_metrics.reply_count
    }

    /// Media keys attached to this post (empty if none)
    pub fn media_keys(&self) -> &[String] {
        self.attachments
            .as_ref()
            .map(|a| a.media_keys.as_slice())
            .unwrap_or(&[])
    }
}

/// Post engagement counters
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostMetrics {
    /// Number of replies
    #[serde(default)]
    pub reply_count: u64,
    /// Remaining counters (reposts, likes, quotes, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference from one post to another
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferencedPost {
    /// Kind of reference (e.g. "replied_to", "quoted")
    #[serde(rename = "type")]
    pub kind: String,
    /// Referenced post id
    pub id: String,
}

/// Entities parsed out of a post's text
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Entities {
    /// @-mentions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<Mention>,
    /// Other entity lists, keyed by entity kind
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// A single @-mention entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mention {
    /// Mentioned username
    pub username: String,
    /// Start offset in the text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    /// End offset in the text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<u64>,
    /// Any other mention field (e.g. the mentioned user's id)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Attachment references on a post
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Attachments {
    /// Keys into the page's included media list
    #[serde(default)]
    pub media_keys: Vec<String>,
    /// Any other attachment field (e.g. poll ids)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A user object from a page's inclusions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// User id
    pub id: String,
    /// Handle, without the leading "@"
    pub username: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Follower/following/post/listed counters
    #[serde(default)]
    pub public_metrics: UserMetrics,
    /// Any other field the API returned
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// User counters
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMetrics {
    /// Followers
    #[serde(default)]
    pub followers_count: u64,
    /// Accounts followed
    #[serde(default)]
    pub following_count: u64,
    /// Posts authored
    #[serde(default)]
    pub tweet_count: u64,
    /// Lists the user appears on
    #[serde(default)]
    pub listed_count: u64,
}

/// A media object from a page's inclusions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Media {
    /// Key referenced by [`Attachments::media_keys`]
    pub media_key: String,
    /// Any other media field (type, url, dimensions, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Objects referenced by the posts of a page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Includes {
    /// Included users
    #[serde(default)]
    pub users: Vec<User>,
    /// Included places, kept verbatim
    #[serde(default)]
    pub places: Vec<Value>,
    /// Included media
    #[serde(default)]
    pub media: Vec<Media>,
}

/// Pagination metadata of a page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageMeta {
    /// Number of posts in this page
    #[serde(default)]
    pub result_count: u64,
    /// Cursor for the next page, absent on the last page
    #[serde(default)]
    pub next_token: Option<String>,
}

/// One page of search results
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchPage {
    /// Posts, in API order
    #[serde(default)]
    pub data: Vec<Post>,
    /// Included users, places and media
    #[serde(default)]
    pub includes: Includes,
    /// Pagination metadata
    #[serde(default)]
    pub meta: PageMeta,
}

impl SearchPage {
    /// Whether this page carries no posts at all
    pub fn is_empty(&self) -> bool {
        self.meta.result_count == 0 && self.data.is_empty()
    }

    /// Cursor for the following page, if any
    pub fn next_cursor(&self) -> Option<&str> {
        self.meta.next_token.as_deref()
    }
}
