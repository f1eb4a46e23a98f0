//! Validation subcommand

use clap::Parser;
use regex::Regex;
use std::path::PathBuf;

use super::CliError;
use crate::credentials::Credentials;

/// Validate command for checking inputs before a long crawl
#[derive(Parser, Debug)]
pub struct ValidateCommand {
    /// What to validate
    #[command(subcommand)]
    pub target: ValidateTarget,
}

/// Target type for validation
#[derive(clap::Subcommand, Debug)]
pub enum ValidateTarget {
    /// Validate a credentials file
    Credentials {
        /// Credentials file
        #[arg(long, default_value = "credentials.toml")]
        path: PathBuf,
    },
    /// Validate an exclude pattern
    Pattern {
        /// Regular expression matched against post text
        pattern: String,
    },
}

impl ValidateCommand {
    /// Execute the validation command
    pub async fn execute(&self) -> Result<(), CliError> {
        match &self.target {
            ValidateTarget::Credentials { path } => self.validate_credentials(path),
            ValidateTarget::Pattern { pattern } => self.validate_pattern(pattern),
        }
    }

    fn validate_credentials(&self, path: &PathBuf) -> Result<(), CliError> {
        match Credentials::load(path) {
            Ok(credentials) => {
                println!("Valid credentials: {}", path.display());
                println!("  Contact address: {}", credentials.contact_address());
                Ok(())
            }
            Err(e) => {
                eprintln!("Invalid credentials: {e}");
                Err(e.into())
            }
        }
    }

    fn validate_pattern(&self, pattern: &str) -> Result<(), CliError> {
        match Regex::new(pattern) {
            Ok(_) => {
                println!("Valid pattern: {pattern}");
                Ok(())
            }
            Err(e) => {
                eprintln!("Invalid pattern: {e}");
                Err(CliError::InvalidArgument(e.to_string()))
            }
        }
    }
}
