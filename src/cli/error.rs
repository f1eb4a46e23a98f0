//! CLI error types and conversions

use crate::anonymise::AnonymiseError;
use crate::credentials::CredentialsError;
use crate::downloader::DownloadError;
use crate::output::OutputError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Download error
    #[error("download error: {0}")]
    DownloadError(#[from] DownloadError),

    /// Credentials error
    #[error("credentials error: {0}")]
    CredentialsError(#[from] CredentialsError),

    /// Anonymiser error
    #[error("anonymisation error: {0}")]
    AnonymiseError(#[from] AnonymiseError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}
