//! Session counters

use serde::Serialize;
use std::fmt;

/// Counters accumulated over one crawl session
///
/// Only ever incremented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    /// Requests sent, retries included
    pub requests: u64,
    /// Requests answered with a usable page
    pub responses: u64,
    /// Posts written
    pub posts: u64,
    /// Posts written by conversation backfill queries
    pub replies: u64,
    /// Users written
    pub users: u64,
    /// Places written
    pub places: u64,
    /// Posts dropped by the content filter
    pub filtered: u64,
    /// Backfill queries crawled
    pub backfill_queries: u64,
    /// Queries given up after exhausting retries
    pub abandoned_queries: u64,
}

impl fmt::Display for RunTotals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} posts ({} replies), {} users, {} places from {} responses / {} requests",
            self.posts, self.replies, self.users, self.places, self.responses, self.requests
        )
    }
}
