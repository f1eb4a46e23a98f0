//! Record anonymisation
//!
//! Posts and users are converted into dedicated output records so a
//! non-anonymised value can never be written by accident: the output types
//! simply have no field for the display name or the mention offsets.

use super::hash::anonymise_hash;
use super::AnonymiseError;
use crate::{Attachments, Media, Post, PostMetrics, ReferencedPost, User, UserMetrics};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use rand::Rng;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Jitter applied to follower, following and post counts
pub const COUNT_JITTER: u64 = 10;

/// Jitter applied to the listed count
pub const LISTED_JITTER: u64 = 3;

/// Offset keys removed from every entity object
const OFFSET_KEYS: [&str; 2] = ["start", "end"];

/// Extra post fields that hold user ids
const USER_ID_FIELDS: [&str; 1] = ["in_reply_to_user_id"];

/// Extra post fields that hold lists of post ids
const POST_ID_LIST_FIELDS: [&str; 1] = ["edit_history_tweet_ids"];

/// URL entity keys that spell out the linked address, which for links to
/// other posts contains the author's handle and the post id
const URL_DETAIL_KEYS: [&str; 3] = ["expanded_url", "display_url", "unwound_url"];

/// Extra post field carrying the full text of long posts
const NOTE_FIELD: &str = "note_tweet";

/// Extra user field holding a post id
const PINNED_POST_FIELD: &str = "pinned_tweet_id";

/// Anonymised post, ready to be written to `posts.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnonymisedPost {
    /// Hashed post id
    pub id: String,
    /// Hashed conversation id
    pub conversation_id: String,
    /// Hashed author id
    pub author_id: String,
    /// Creation time, rounded down to the minute
    pub created_at: DateTime<Utc>,
    /// Text with every @mention hashed
    pub text: String,
    /// Engagement counters, unchanged
    pub public_metrics: PostMetrics,
    /// References with hashed post ids
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referenced_tweets: Vec<ReferencedPost>,
    /// Entities without offsets, mentions reduced to hashed usernames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<AnonymisedEntities>,
    /// Attachment references, unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Attachments>,
    /// Media resolved from the page inclusions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<Media>,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Anonymised entity lists
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnonymisedEntities {
    /// Hashed usernames of the mentioned accounts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
    /// Other entity lists with offsets stripped
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Anonymised user, ready to be written to `users.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnonymisedUser {
    /// Hashed user id
    pub id: String,
    /// Hashed username
    pub username: String,
    /// Jittered counters
    pub public_metrics: UserMetrics,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Salt-keyed anonymiser for posts and users
#[derive(Debug, Clone)]
pub struct Anonymiser {
    salt: String,
    mention_pattern: Regex,
}

impl Anonymiser {
    /// Create an anonymiser for the given salt
    ///
    /// # Errors
    /// Returns [`AnonymiseError::EmptySalt`] if the salt is empty
    pub fn new(salt: impl Into<String>) -> Result<Self, AnonymiseError> {
        let salt = salt.into();
        if salt.is_empty() {
            return Err(AnonymiseError::EmptySalt);
        }

        let mention_pattern =
            Regex::new(r"@(\w+)").map_err(|e| AnonymiseError::Pattern(e.to_string()))?;

        Ok(Self {
            salt,
            mention_pattern,
        })
    }

    /// Hash a single value with this anonymiser's salt
    pub fn hash(&self, value: &str) -> String {
        anonymise_hash(value, &self.salt)
    }

    /// Hash a handle; handles are case-insensitive, so case is folded first
    pub fn hash_username(&self, username: &str) -> String {
        self.hash(&username.to_lowercase())
    }

    /// Replace every `@username` in `text` with `@` + hash(username)
    pub fn anonymise_text(&self, text: &str) -> String {
        self.mention_pattern
            .replace_all(text, |caps: &Captures<'_>| {
                format!("@{}", self.hash_username(&caps[1]))
            })
            .into_owned()
    }

    /// Anonymise a post
    pub fn anonymise_post(&self, post: Post) -> AnonymisedPost {
        let Post {
            id,
            conversation_id,
            author_id,
            created_at,
            text,
            public_metrics,
            referenced_tweets,
            entities,
            attachments,
            mut extra,
        } = post;

        for field in USER_ID_FIELDS {
            if let Some(Value::String(user_id)) = extra.get_mut(field) {
                *user_id = self.hash(user_id);
            }
        }
        for field in POST_ID_LIST_FIELDS {
            if let Some(Value::Array(ids)) = extra.get_mut(field) {
                for id in ids.iter_mut() {
                    if let Value::String(post_id) = id {
                        *post_id = self.hash(post_id);
                    }
                }
            }
        }
        if let Some(Value::Object(note)) = extra.get_mut(NOTE_FIELD) {
            self.anonymise_note(note);
        }

        let entities = entities.map(|entities| AnonymisedEntities {
            mentions: entities
                .mentions
                .iter()
                .map(|mention| self.hash_username(&mention.username))
                .collect(),
            other: scrub_entities(entities.other),
        });

        AnonymisedPost {
            id: self.hash(&id),
            conversation_id: self.hash(&conversation_id),
            author_id: self.hash(&author_id),
            created_at: round_to_minute(created_at),
            text: self.anonymise_text(&text),
            public_metrics,
            referenced_tweets: referenced_tweets
                .into_iter()
                .map(|reference| ReferencedPost {
                    kind: reference.kind,
                    id: self.hash(&reference.id),
                })
                .collect(),
            entities,
            attachments,
            media: Vec::new(),
            extra,
        }
    }

    /// Long-post text and entities get the same treatment as the post's own
    fn anonymise_note(&self, note: &mut Map<String, Value>) {
        if let Some(Value::String(text)) = note.get_mut("text") {
            *text = self.anonymise_text(text);
        }
        if let Some(Value::Object(entities)) = note.remove("entities") {
            let mut entities = scrub_entities(entities);
            if let Some(Value::Array(mentions)) = entities.get_mut("mentions") {
                for mention in mentions.iter_mut() {
                    let hashed = mention
                        .get("username")
                        .and_then(Value::as_str)
                        .map(|username| self.hash_username(username));
                    *mention = hashed.map_or(Value::Null, Value::String);
                }
                mentions.retain(|mention| !mention.is_null());
            }
            note.insert("entities".to_string(), Value::Object(entities));
        }
    }

    /// Anonymise a user, jittering counters with the thread-local RNG
    pub fn anonymise_user(&self, user: User) -> AnonymisedUser {
        self.anonymise_user_with(user, &mut rand::thread_rng())
    }

    /// Anonymise a user, jittering counters with the given RNG
    pub fn anonymise_user_with<R: Rng + ?Sized>(&self, user: User, rng: &mut R) -> AnonymisedUser {
        let metrics = user.public_metrics;
        let mut extra = user.extra;
        if let Some(Value::String(post_id)) = extra.get_mut(PINNED_POST_FIELD) {
            *post_id = self.hash(post_id);
        }

        AnonymisedUser {
            id: self.hash(&user.id),
            username: self.hash_username(&user.username),
            public_metrics: UserMetrics {
                followers_count: jitter_number_with(rng, metrics.followers_count, COUNT_JITTER),
                following_count: jitter_number_with(rng, metrics.following_count, COUNT_JITTER),
                tweet_count: jitter_number_with(rng, metrics.tweet_count, COUNT_JITTER),
                listed_count: jitter_number_with(rng, metrics.listed_count, LISTED_JITTER),
            },
            extra,
        }
    }
}

/// Truncate a timestamp to the start of its minute
pub fn round_to_minute(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp
        .duration_trunc(TimeDelta::minutes(1))
        .unwrap_or(timestamp)
}

/// Randomly move `n` by up to `range` in either direction, never below zero
pub fn jitter_number(n: u64, range: u64) -> u64 {
    jitter_number_with(&mut rand::thread_rng(), n, range)
}

/// [`jitter_number`] with an explicit RNG
pub fn jitter_number_with<R: Rng + ?Sized>(rng: &mut R, n: u64, range: u64) -> u64 {
    let range = i128::from(range);
    let offset = rng.gen_range(-range..=range);
    (i128::from(n) + offset).clamp(0, i128::from(u64::MAX)) as u64
}

/// Drop offsets from every entity and the spelled-out address of URL entities
fn scrub_entities(mut entities: Map<String, Value>) -> Map<String, Value> {
    for list in entities.values_mut() {
        if let Value::Array(items) = list {
            for item in items.iter_mut() {
                if let Value::Object(fields) = item {
                    for key in OFFSET_KEYS.iter().chain(URL_DETAIL_KEYS.iter()) {
                        fields.remove(*key);
                    }
                }
            }
        }
    }
    entities
}
