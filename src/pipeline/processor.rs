//! Page-at-a-time anonymisation and output

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{PageSummary, PipelineError, ReplyDiscovered, SessionInfo};
use crate::anonymise::Anonymiser;
use crate::metrics::record_written;
use crate::output::{
    write_properties, JsonLinesWriter, OutputWriter, PLACES_FILE, POSTS_FILE, PROPERTIES_FILE,
    USERS_FILE,
};
use crate::{Media, SearchPage};

/// Writes one session's anonymised records
///
/// Artifacts are opened by [`ResponsePipeline::create`] and closed by
/// [`ResponsePipeline::end`], which consumes the pipeline.
pub struct ResponsePipeline {
    output_dir: PathBuf,
    anonymiser: Anonymiser,
    session: SessionInfo,
    exclude_pattern: Option<Regex>,
    posts: JsonLinesWriter,
    users: JsonLinesWriter,
    places: JsonLinesWriter,
    min_timestamp: Option<DateTime<Utc>>,
    max_timestamp: Option<DateTime<Utc>>,
}

impl ResponsePipeline {
    /// Create `output_dir` (recursively) and open the session artifacts
    ///
    /// # Errors
    /// Returns [`PipelineError::Setup`] if the directory cannot be created
    /// and [`PipelineError::Output`] if an artifact cannot be opened
    pub fn create<P: AsRef<Path>>(
        output_dir: P,
        anonymiser: Anonymiser,
        session: SessionInfo,
        exclude_pattern: Option<Regex>,
    ) -> Result<Self, PipelineError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir).map_err(|source| PipelineError::Setup {
            path: output_dir.clone(),
            source,
        })?;

        info!(dir = %output_dir.display(), "Opening output artifacts");

        Ok(Self {
            posts: JsonLinesWriter::create(output_dir.join(POSTS_FILE))?,
            users: JsonLinesWriter::create(output_dir.join(USERS_FILE))?,
            places: JsonLinesWriter::create(output_dir.join(PLACES_FILE))?,
            output_dir,
            anonymiser,
            session,
            exclude_pattern,
            min_timestamp: None,
            max_timestamp: None,
        })
    }

    /// Observed `[min, max]` of retained posts' (rounded) creation times
    pub fn timestamp_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.min_timestamp.zip(self.max_timestamp)
    }

    /// Filter, anonymise and write one page
    ///
    /// All records of the page are written before this returns.
    pub fn process(&mut self, page: SearchPage) -> Result<PageSummary, PipelineError> {
        let SearchPage { data, includes, .. } = page;
        let mut summary = PageSummary::default();

        let media_index: HashMap<&str, &Media> = includes
            .media
            .iter()
            .map(|media| (media.media_key.as_str(), media))
            .collect();

        for post in data {
            if self.is_excluded(&post.text) {
                summary.filtered += 1;
                continue;
            }

            let mut media = Vec::with_capacity(post.media_keys().len());
            for key in post.media_keys() {
                match media_index.get(key.as_str()) {
                    Some(found) => media.push((*found).clone()),
                    None => warn!(media_key = %key, "Attached media not found in page includes"),
                }
            }

            if post.reply_count() > 0 {
                summary.replies.push(ReplyDiscovered {
                    post_id: post.id.clone(),
                    conversation_id: post.conversation_id.clone(),
                });
            }

            let mut record = self.anonymiser.anonymise_post(post);
            record.media = media;

            self.observe_timestamp(record.created_at);
            self.posts.write_record(&record)?;
            summary.posts += 1;
        }

        for user in includes.users {
            let record = self.anonymiser.anonymise_user(user);
            self.users.write_record(&record)?;
            summary.users += 1;
        }

        for place in &includes.places {
            self.places.write_record(place)?;
            summary.places += 1;
        }

        // A page only counts once its records have left the buffers
        self.posts.flush()?;
        self.users.flush()?;
        self.places.flush()?;

        record_written("posts", summary.posts);
        record_written("users", summary.users);
        record_written("places", summary.places);

        debug!(
            posts = summary.posts,
            users = summary.users,
            places = summary.places,
            filtered = summary.filtered,
            replies = summary.replies.len(),
            "Page processed"
        );
        Ok(summary)
    }

    /// Close every artifact and write the session properties
    pub fn end(self) -> Result<(), PipelineError> {
        let properties = self.properties();
        let properties_path = self.output_dir.join(PROPERTIES_FILE);

        let posts = self.posts.records_written();
        self.posts.close()?;
        self.users.close()?;
        self.places.close()?;

        let rows: Vec<(&str, String)> = properties
            .iter()
            .map(|(key, value)| (*key, value.clone()))
            .collect();
        write_properties(&properties_path, &rows)?;

        info!(
            posts,
            dir = %self.output_dir.display(),
            "Session artifacts finalized"
        );
        Ok(())
    }

    fn properties(&self) -> [(&'static str, String); 5] {
        [
            ("query", self.session.query.clone()),
            ("start_time", format_time(Some(self.session.start_time))),
            ("end_time", format_time(self.session.end_time)),
            ("min_timestamp", format_time(self.min_timestamp)),
            ("max_timestamp", format_time(self.max_timestamp)),
        ]
    }

    fn is_excluded(&self, text: &str) -> bool {
        self.exclude_pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(text))
    }

    fn observe_timestamp(&mut self, created_at: DateTime<Utc>) {
        self.min_timestamp = Some(self.min_timestamp.map_or(created_at, |t| t.min(created_at)));
        self.max_timestamp = Some(self.max_timestamp.map_or(created_at, |t| t.max(created_at)));
    }
}

fn format_time(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}
