//! CLI command implementations

pub mod anonymise;
pub mod download;
pub mod error;
pub mod validate;

pub use anonymise::{AnonymiseCommand, RecordType};
pub use download::{Cli, Commands, DownloadArgs, OutputFormat};
pub use error::CliError;
pub use validate::ValidateCommand;
