//! Output artifact writers

pub mod jsonl;
pub mod properties;

pub use jsonl::JsonLinesWriter;
pub use properties::write_properties;

/// Posts artifact file name
pub const POSTS_FILE: &str = "posts.jsonl";

/// Users artifact file name
pub const USERS_FILE: &str = "users.jsonl";

/// Places artifact file name
pub const PLACES_FILE: &str = "places.jsonl";

/// Session metadata file name
pub const PROPERTIES_FILE: &str = "properties.tsv";

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Generic output writer trait
pub trait OutputWriter {
    /// Flush any buffered data to disk
    fn flush(&mut self) -> OutputResult<()>;

    /// Close the writer and finalize output
    fn close(self) -> OutputResult<()>;
}
