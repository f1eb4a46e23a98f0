//! Response processing and persistence
//!
//! [`ResponsePipeline`] turns raw search pages into anonymised records and
//! streams them to the session's output artifacts:
//!
//! - `posts.jsonl` - one anonymised post per line
//! - `users.jsonl` - one anonymised user per line
//! - `places.jsonl` - places as returned by the API
//! - `properties.tsv` - query, requested window, observed timestamp range
//!
//! Posts with replies are reported back to the caller as
//! [`ReplyDiscovered`] so their conversations can be crawled.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::output::OutputError;

pub mod processor;

pub use processor::ResponsePipeline;

/// Pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Output directory could not be created
    #[error("failed to create output directory {path}: {source}")]
    Setup {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// An artifact could not be written
    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

/// What the session was asked to retrieve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Primary search query as given by the caller
    pub query: String,
    /// Requested window start
    pub start_time: DateTime<Utc>,
    /// Requested window end
    pub end_time: Option<DateTime<Utc>>,
}

/// A retained post that has at least one reply
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplyDiscovered {
    /// Plaintext post id
    pub post_id: String,
    /// Plaintext conversation id
    pub conversation_id: String,
}

/// Per-page result of [`ResponsePipeline::process`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSummary {
    /// Posts written
    pub posts: u64,
    /// Users written
    pub users: u64,
    /// Places written
    pub places: u64,
    /// Posts dropped by the content filter
    pub filtered: u64,
    /// Retained posts with replies
    pub replies: Vec<ReplyDiscovered>,
}
