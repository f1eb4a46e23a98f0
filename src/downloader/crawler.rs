//! Full-archive crawl orchestration
//!
//! One [`ArchiveCrawler::download_archive`] call crawls the primary query
//! page by page, then every conversation batch its replies produced. All
//! requests go through the crawler's single [`RateLimitedFetcher`].

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

use super::config::CrawlConfig;
use super::conversation_queue::ConversationBacklog;
use super::totals::RunTotals;
use super::DownloadError;
use crate::fetcher::{
    classify, PageRequest, RateLimitedFetcher, ResponseClass, RetryCause, RetryContext,
    SearchFetcher,
};
use crate::metrics::{record_query_abandoned, record_retry};
use crate::pipeline::ResponsePipeline;
use crate::SearchPage;

/// One query to crawl to the end of its cursor chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlQuery {
    /// Query text
    pub text: String,
    /// The exclusion clause is already part of `text`
    pub postfix_applied: bool,
    /// Conversation batch rather than the primary query
    pub is_backfill: bool,
}

impl CrawlQuery {
    /// The caller's query; the exclusion clause is appended when crawled
    pub fn primary(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            postfix_applied: false,
            is_backfill: false,
        }
    }

    /// A conversation batch carrying its own postfix
    pub fn backfill(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            postfix_applied: true,
            is_backfill: true,
        }
    }
}

/// What to do after one fetch
#[derive(Debug)]
pub enum RetryDecision {
    /// Process the page and follow its cursor
    Proceed(SearchPage),
    /// Fetch the same cursor again after the delay
    RetryAfter(Duration),
    /// Stop crawling this query
    GiveUp(GiveUpReason),
}

/// Why a query stopped before its cursor chain ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiveUpReason {
    /// Zero results
    Empty,
    /// Network or parse failure, or a rejected request
    Transport(String),
    /// Too many retries for one failure class
    RetriesExhausted(RetryCause),
}

/// Retry counters, one per failure class
#[derive(Debug, Default, Clone, Copy)]
struct RetryCounters {
    rate_limit: u32,
    server_error: u32,
}

impl RetryCounters {
    fn bump(&mut self, cause: RetryCause) -> u32 {
        let counter = match cause {
            RetryCause::RateLimit => &mut self.rate_limit,
            RetryCause::ServerError(_) => &mut self.server_error,
        };
        *counter += 1;
        *counter
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// State owned by one `download_archive` call
struct CrawlSession {
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    totals: RunTotals,
    backlog: ConversationBacklog,
    work: VecDeque<CrawlQuery>,
}

/// Crawls queries through one rate-limited fetcher into one pipeline
pub struct ArchiveCrawler<F> {
    fetcher: RateLimitedFetcher<F>,
    pipeline: ResponsePipeline,
    config: CrawlConfig,
}

impl<F: SearchFetcher> ArchiveCrawler<F> {
    /// Create a crawler
    pub fn new(fetcher: RateLimitedFetcher<F>, pipeline: ResponsePipeline, config: CrawlConfig) -> Self {
        Self {
            fetcher,
            pipeline,
            config,
        }
    }

    /// Crawler configuration
    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Give back the pipeline so the caller can end it
    pub fn into_pipeline(self) -> ResponsePipeline {
        self.pipeline
    }

    /// Crawl `query` in `[start_time, end_time)` and, when enabled, the
    /// conversations of every post with replies
    ///
    /// Per-query failures are logged and counted; only output failures are
    /// returned as errors.
    pub async fn download_archive(
        &mut self,
        query: &str,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<RunTotals, DownloadError> {
        let mut session = CrawlSession {
            start_time,
            end_time,
            totals: RunTotals::default(),
            backlog: ConversationBacklog::new(
                self.config.exclusion_clause.clone(),
                self.config.max_query_length,
            ),
            work: VecDeque::new(),
        };

        self.crawl_query(&mut session, CrawlQuery::primary(query)).await?;

        loop {
            while let Some(next) = session.work.pop_front() {
                self.crawl_query(&mut session, next).await?;
            }

            let remaining = session.backlog.drain();
            if remaining.is_empty() {
                break;
            }
            debug!(batches = remaining.len(), "Flushing remaining conversation ids");
            session
                .work
                .extend(remaining.into_iter().map(CrawlQuery::backfill));
        }

        info!(
            posts = session.totals.posts,
            replies = session.totals.replies,
            requests = session.totals.requests,
            abandoned = session.totals.abandoned_queries,
            conversations = session.backlog.seen(),
            "Archive download finished"
        );
        Ok(session.totals)
    }

    /// Crawl one query to the end of its cursor chain
    ///
    /// Returns the number of posts written for it.
    async fn crawl_query(
        &mut self,
        session: &mut CrawlSession,
        query: CrawlQuery,
    ) -> Result<u64, DownloadError> {
        let text = if query.postfix_applied || self.config.exclusion_clause.is_empty() {
            query.text
        } else {
            format!("{} {}", query.text, self.config.exclusion_clause)
        };

        let span = info_span!("crawl_query", query = %text, backfill = query.is_backfill);
        let posts = self
            .follow_cursor(session, &text)
            .instrument(span)
            .await?;

        if query.is_backfill {
            session.totals.backfill_queries += 1;
            session.totals.replies += posts;
        }
        Ok(posts)
    }

    async fn follow_cursor(
        &mut self,
        session: &mut CrawlSession,
        text: &str,
    ) -> Result<u64, DownloadError> {
        let mut cursor: Option<String> = None;
        let mut counters = RetryCounters::default();
        let mut pages = 0u64;
        let mut posts = 0u64;

        info!("Starting query");

        loop {
            if pages >= self.config.max_pages_per_query {
                warn!(pages, "Page limit reached, cutting cursor chain");
                break;
            }

            let request = PageRequest {
                query: text.to_string(),
                start_time: session.start_time,
                end_time: session.end_time,
                page_size: self.config.page_size,
                cursor: cursor.clone(),
            };

            session.totals.requests += 1;
            let result = self.fetcher.execute(&request).await;
            if !self.config.extra_delay.is_zero() {
                tokio::time::sleep(self.config.extra_delay).await;
            }

            match self.decide(classify(result), &mut counters, text) {
                RetryDecision::Proceed(page) => {
                    counters.reset();
                    pages += 1;
                    session.totals.responses += 1;

                    let next = page.next_cursor().map(str::to_owned);
                    let summary = self.pipeline.process(page)?;

                    posts += summary.posts;
                    session.totals.posts += summary.posts;
                    session.totals.users += summary.users;
                    session.totals.places += summary.places;
                    session.totals.filtered += summary.filtered;

                    if self.config.download_replies {
                        for reply in &summary.replies {
                            if session.backlog.offer(&reply.conversation_id) {
                                debug!(post_id = %reply.post_id, "Queued conversation for backfill");
                            }
                            while let Some(batch) = session.backlog.ready_query() {
                                session.work.push_back(CrawlQuery::backfill(batch));
                            }
                        }
                    }

                    debug!(page = pages, posts = summary.posts, "Page complete");

                    match next {
                        Some(next) => cursor = Some(next),
                        None => break,
                    }
                }
                RetryDecision::RetryAfter(backoff) => {
                    tokio::time::sleep(backoff).await;
                }
                RetryDecision::GiveUp(GiveUpReason::Empty) => {
                    debug!("No more results");
                    break;
                }
                RetryDecision::GiveUp(GiveUpReason::Transport(error)) => {
                    warn!(error = %error, "Query ended by transport failure");
                    break;
                }
                RetryDecision::GiveUp(GiveUpReason::RetriesExhausted(cause)) => {
                    session.totals.abandoned_queries += 1;
                    record_query_abandoned(cause.label());
                    break;
                }
            }
        }

        info!(pages, posts, "Query finished");
        Ok(posts)
    }

    fn decide(&self, class: ResponseClass, counters: &mut RetryCounters, query: &str) -> RetryDecision {
        let cause = match class {
            ResponseClass::Success(page) => return RetryDecision::Proceed(page),
            ResponseClass::EmptyResult => return RetryDecision::GiveUp(GiveUpReason::Empty),
            ResponseClass::TransportFailure(error) => {
                return RetryDecision::GiveUp(GiveUpReason::Transport(error))
            }
            ResponseClass::RateLimited => RetryCause::RateLimit,
            ResponseClass::ServerError(status) => RetryCause::ServerError(status),
        };

        let backoff = match cause {
            RetryCause::RateLimit => self.config.rate_limit_backoff,
            RetryCause::ServerError(_) => self.config.server_error_backoff,
        };
        let context = RetryContext {
            attempt: counters.bump(cause),
            max_retries: self.config.max_retries,
            cause,
            backoff,
            query: query.to_string(),
        };

        if context.attempt > self.config.max_retries {
            warn!("{}", context.format_failure());
            return RetryDecision::GiveUp(GiveUpReason::RetriesExhausted(cause));
        }

        warn!(
            attempt = context.attempt,
            backoff_ms = backoff.as_millis() as u64,
            "{}",
            context.format_retry()
        );
        record_retry(cause.label(), backoff);
        RetryDecision::RetryAfter(backoff)
    }
}
