//! Anonymise subcommand
//!
//! Re-anonymises a JSON-lines dump of raw posts or users with the salt from
//! a credentials file, writing `<stem>-anonymised.<ext>` next to the input.

use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

use super::CliError;
use crate::anonymise::Anonymiser;
use crate::credentials::Credentials;
use crate::output::{JsonLinesWriter, OutputWriter};
use crate::{Post, User};

/// Shown under `anonymise --help`
pub const HASH_COMPATIBILITY_NOTE: &str = "\
Identifiers are hashed with SHA-256 over \"|\" + value + salt, truncated to \
128 bits and encoded as URL-safe base64. Hashes from other anonymisation \
tools (for example SHAKE128-based ones) never match these, even with the \
same salt, so do not merge corpora produced by different tools.";

/// Kind of record held by the input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordType {
    /// One post per line
    Post,
    /// One user per line
    User,
}

/// Anonymise an existing JSON-lines file
#[derive(Parser, Debug)]
pub struct AnonymiseCommand {
    /// JSON-lines file to anonymise
    #[arg(long)]
    pub input: PathBuf,

    /// Record type of every line
    #[arg(long = "type", value_enum)]
    pub record_type: RecordType,

    /// Credentials file providing the salt
    #[arg(long, default_value = "credentials.toml")]
    pub credentials: PathBuf,
}

impl AnonymiseCommand {
    /// Execute the anonymise command
    pub async fn execute(&self) -> Result<(), CliError> {
        let credentials = Credentials::load(&self.credentials)?;
        let anonymiser = Anonymiser::new(credentials.anonymise_salt())?;
        let output = anonymised_path(&self.input);

        let started = Instant::now();
        let records = anonymise_file(&anonymiser, self.record_type, &self.input, &output)?;
        let elapsed = started.elapsed();

        info!(
            records,
            elapsed_ms = elapsed.as_millis() as u64,
            records_per_sec = records as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
            output = %output.display(),
            "Anonymisation complete"
        );
        println!("Anonymised {records} records to {}", output.display());
        Ok(())
    }
}

/// `<stem>-anonymised.<ext>` next to `input`
pub fn anonymised_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}-anonymised.{}", ext.to_string_lossy()),
        None => format!("{stem}-anonymised"),
    };
    input.with_file_name(name)
}

/// Anonymise every line of `input` into `output`
///
/// Blank lines are skipped. A line that does not parse as `record_type`
/// fails the whole run with its line number.
pub fn anonymise_file(
    anonymiser: &Anonymiser,
    record_type: RecordType,
    input: &Path,
    output: &Path,
) -> Result<u64, CliError> {
    let file = File::open(input).map_err(|e| {
        CliError::InvalidArgument(format!("Failed to open {}: {e}", input.display()))
    })?;
    let mut writer = JsonLinesWriter::create(output)?;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            CliError::InvalidArgument(format!("Failed to read {}: {e}", input.display()))
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let invalid = |e: serde_json::Error| {
            CliError::InvalidArgument(format!("line {}: not a valid {record_type:?}: {e}", index + 1))
        };
        match record_type {
            RecordType::Post => {
                let post: Post = serde_json::from_str(&line).map_err(invalid)?;
                writer.write_record(&anonymiser.anonymise_post(post))?;
            }
            RecordType::User => {
                let user: User = serde_json::from_str(&line).map_err(invalid)?;
                writer.write_record(&anonymiser.anonymise_user(user))?;
            }
        }
    }

    let records = writer.records_written();
    writer.close()?;
    Ok(records)
}
