//! Credentials file loading and validation
//!
//! Credentials live in a TOML document:
//!
//! ```toml
//! api_key = "..."
//! api_secret_key = "..."
//! bearer_token = "..."
//! contact_address = "researcher@example.org"
//! anonymise_salt = "a long random string"
//! ```
//!
//! `contact_address` may be omitted when the `CONTACT_ADDR` environment
//! variable is set. Every other key is required.

use std::fmt;
use std::path::Path;
use toml::Table;
use tracing::debug;

/// Environment variable consulted when the file has no `contact_address`
pub const CONTACT_ADDR_ENV: &str = "CONTACT_ADDR";

/// Credentials errors
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    /// The file could not be read
    #[error("failed to read credentials file {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The file is not valid TOML
    #[error("invalid credentials file: {0}")]
    Parse(String),

    /// A required key is absent
    #[error("no {0} specified")]
    Missing(&'static str),

    /// A required key is present but not a string
    #[error("{0} must be a string")]
    NotAString(&'static str),

    /// A required key is an empty string
    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

/// Validated API credentials and anonymisation salt
///
/// Immutable once loaded; every field is guaranteed non-empty.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    bearer_token: String,
    contact_address: String,
    anonymise_salt: String,
}

impl Credentials {
    /// Load credentials from a TOML file, falling back to `CONTACT_ADDR`
    /// for the contact address
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        debug!("Loading credentials from {}", path.display());

        let source = std::fs::read_to_string(path).map_err(|source| CredentialsError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_toml_str(&source, std::env::var(CONTACT_ADDR_ENV).ok())
    }

    /// Parse credentials from TOML source
    ///
    /// # Arguments
    /// * `source` - TOML document
    /// * `contact_fallback` - Contact address to use when the document has none
    pub fn from_toml_str(
        source: &str,
        contact_fallback: Option<String>,
    ) -> Result<Self, CredentialsError> {
        let table: Table = source
            .parse()
            .map_err(|e: toml::de::Error| CredentialsError::Parse(e.to_string()))?;

        let contact_address = match optional_string(&table, "contact_address")? {
            Some(address) => address,
            None => contact_fallback
                .filter(|s| !s.trim().is_empty())
                .ok_or(CredentialsError::Missing("contact_address"))?,
        };

        // Checked for completeness; the search endpoint only needs the bearer token
        required_string(&table, "api_key")?;
        required_string(&table, "api_secret_key")?;

        Ok(Self {
            bearer_token: required_string(&table, "bearer_token")?,
            contact_address,
            anonymise_salt: required_string(&table, "anonymise_salt")?,
        })
    }

    /// Bearer token sent with every search request
    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }

    /// Contact address embedded in the user agent
    pub fn contact_address(&self) -> &str {
        &self.contact_address
    }

    /// Salt for identifier hashing
    pub fn anonymise_salt(&self) -> &str {
        &self.anonymise_salt
    }
}

// Secrets stay out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("bearer_token", &"<redacted>")
            .field("contact_address", &self.contact_address)
            .field("anonymise_salt", &"<redacted>")
            .finish()
    }
}

fn required_string(table: &Table, key: &'static str) -> Result<String, CredentialsError> {
    optional_string(table, key)?.ok_or(CredentialsError::Missing(key))
}

fn optional_string(table: &Table, key: &'static str) -> Result<Option<String>, CredentialsError> {
    match table.get(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) if s.trim().is_empty() => Err(CredentialsError::Empty(key)),
        Some(toml::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(CredentialsError::NotAString(key)),
    }
}
