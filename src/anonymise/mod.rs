//! Anonymisation of posts and users
//!
//! Identifiers are replaced with salted hashes ([`anonymise_hash`]), which are
//! deterministic for a given salt. The same user therefore hashes to the same
//! value in `posts.jsonl` (as author, as mention) and in `users.jsonl`,
//! keeping the corpus joinable without revealing who anyone is.
//!
//! | Field | Transform |
//! |---|---|
//! | post id, conversation id, author id | salted hash |
//! | post text, long-post text | `@username` → `@` + hash(username) |
//! | post created_at | rounded down to the minute |
//! | referenced post ids, edit history ids, mention usernames | salted hash, offsets stripped |
//! | URL entities | spelled-out addresses dropped, short link kept |
//! | user id, username, pinned post id | salted hash |
//! | user display name | dropped |
//! | user counters | bounded random jitter, clamped at 0 |
//!
//! Usernames are lowercased before hashing, so `@Alice` in a text and the
//! mention entity `alice` produce the same hash.

pub mod anonymiser;
pub mod hash;

pub use anonymiser::{
    jitter_number, round_to_minute, AnonymisedEntities, AnonymisedPost, AnonymisedUser,
    Anonymiser,
};
pub use hash::{anonymise_hash, HASH_LENGTH};

/// Anonymiser construction errors
#[derive(Debug, thiserror::Error)]
pub enum AnonymiseError {
    /// No salt supplied
    #[error("no anonymisation salt specified")]
    EmptySalt,

    /// Mention pattern failed to compile
    #[error("invalid mention pattern: {0}")]
    Pattern(String),
}
