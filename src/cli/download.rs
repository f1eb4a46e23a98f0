//! Download command implementation

use crate::downloader::config::{DEFAULT_MAX_QUERY_LENGTH, DEFAULT_PAGE_SIZE, MAX_RETRIES};
use crate::downloader::{crawl, CrawlOptions, DownloadError, RunTotals};
use crate::fetcher::{MAX_PAGE_SIZE, MIN_PAGE_SIZE};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{error, info};

use super::CliError;

/// Try to parse datetime from RFC3339 format
///
/// Handles both inputs with and without timezone designators:
/// - "2024-01-01T00:00:00Z" - explicit UTC
/// - "2024-01-01T00:00:00+01:00" - explicit offset
/// - "2024-01-01T00:00:00" - no timezone, assumed UTC
fn try_parse_datetime_rfc3339(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{input}Z")) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

/// Parse a start time from YYYY-MM-DD or RFC3339 datetime format.
///
/// For date-only format, uses start-of-day (00:00:00 UTC).
pub fn parse_start_time_flexible(input: &str) -> Result<DateTime<Utc>, CliError> {
    if let Some(ts) = try_parse_datetime_rfc3339(input) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("Invalid start time: {e}")))?;
    let datetime = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| CliError::InvalidArgument("Invalid start time".to_string()))?;
    Ok(datetime.and_utc())
}

/// Parse an end time from YYYY-MM-DD or RFC3339 datetime format.
///
/// For date-only format, uses the start of the following day so the
/// specified date is fully included (the search window end is exclusive).
pub fn parse_end_time_flexible(input: &str) -> Result<DateTime<Utc>, CliError> {
    if let Some(ts) = try_parse_datetime_rfc3339(input) {
        return Ok(ts);
    }

    let date = NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| CliError::InvalidArgument(format!("Invalid end time: {e}")))?;
    let datetime = date
        .succ_opt()
        .and_then(|next| next.and_hms_opt(0, 0, 0))
        .ok_or_else(|| CliError::InvalidArgument("Invalid end time".to_string()))?;
    Ok(datetime.and_utc())
}

/// Parse and validate a page size
fn parse_page_size(s: &str) -> Result<u32, String> {
    let value: u32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&value) {
        return Err(format!(
            "posts per request must be between {MIN_PAGE_SIZE} and {MAX_PAGE_SIZE}, got {value}"
        ));
    }
    Ok(value)
}

/// Parse a positive query length
fn parse_query_length(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("max query length must be at least 1".to_string()),
        Ok(value) => Ok(value),
        Err(_) => Err(format!("'{s}' is not a valid number")),
    }
}

/// Social archive downloader CLI
#[derive(Parser, Debug)]
#[command(name = "social-archive-downloader")]
#[command(about = "Download and anonymise full-archive search results and their reply threads", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download posts matching a query, plus their reply threads
    Download(DownloadArgs),

    /// Anonymise an existing JSON-lines dump
    #[command(after_help = super::anonymise::HASH_COMPATIBILITY_NOTE)]
    Anonymise(super::AnonymiseCommand),

    /// Validate credentials or an exclude pattern
    Validate(super::ValidateCommand),
}

/// Download command arguments
#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// Search query (the retweet exclusion is appended automatically)
    #[arg(long)]
    pub search: String,

    /// Start time (YYYY-MM-DD or RFC3339)
    #[arg(long)]
    pub start_time: String,

    /// End time (YYYY-MM-DD or RFC3339); a date includes that whole day
    #[arg(long)]
    pub end_time: Option<String>,

    /// Credentials file
    #[arg(long, default_value = "credentials.toml")]
    pub credentials: PathBuf,

    /// Output directory, created if missing
    #[arg(long)]
    pub output: PathBuf,

    /// Maximum length of a batched conversation query
    #[arg(long, default_value_t = DEFAULT_MAX_QUERY_LENGTH, value_parser = parse_query_length)]
    pub max_query_length: usize,

    /// Posts per request (10-500)
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = parse_page_size)]
    pub posts_per_request: u32,

    /// Skip downloading reply threads
    #[arg(long, default_value_t = false)]
    pub no_replies: bool,

    /// Drop posts whose text matches this regular expression
    #[arg(long)]
    pub exclude_pattern: Option<String>,

    /// Retries per failure class before a query is abandoned (0-20)
    #[arg(long, default_value_t = MAX_RETRIES, value_parser = clap::value_parser!(u32).range(0..=20))]
    pub max_retries: u32,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl DownloadArgs {
    /// Build crawl options from the arguments
    pub fn to_options(&self) -> Result<CrawlOptions, CliError> {
        let start_time = parse_start_time_flexible(&self.start_time)?;

        let mut options = CrawlOptions::new(
            self.search.clone(),
            start_time,
            self.credentials.clone(),
            self.output.clone(),
        )
        .with_page_size(self.posts_per_request)
        .with_max_query_length(self.max_query_length)
        .with_download_replies(!self.no_replies)
        .with_max_retries(self.max_retries);

        if let Some(end_time) = &self.end_time {
            options = options.with_end_time(parse_end_time_flexible(end_time)?);
        }
        if let Some(pattern) = &self.exclude_pattern {
            options = options.with_exclude_pattern(pattern.clone());
        }
        Ok(options)
    }

    /// Execute the download
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let options = self.to_options()?;

        info!(
            "Starting download: {} from {} to {}",
            options.query,
            options.start_time,
            options
                .end_time
                .map(|t| t.to_string())
                .unwrap_or_else(|| "now".to_string())
        );

        let output_dir = options.output_dir.clone();
        let result = crawl(options).await;

        match cli.output_format {
            OutputFormat::Json => output_json(&self.search, &output_dir, &result),
            OutputFormat::Human => output_human(&output_dir, &result),
        }

        result.map(|_| ()).map_err(CliError::DownloadError)
    }
}

/// Output result as JSON
fn output_json(query: &str, output_dir: &std::path::Path, result: &Result<RunTotals, DownloadError>) {
    let (success, totals, err) = match result {
        Ok(totals) => (true, *totals, None),
        Err(e) => (false, RunTotals::default(), Some(e.to_string())),
    };

    let output = serde_json::json!({
        "success": success,
        "query": query,
        "output_dir": output_dir.display().to_string(),
        "totals": totals,
        "error": err,
    });

    println!("{output}");
}

/// Output result in human-readable format
fn output_human(output_dir: &std::path::Path, result: &Result<RunTotals, DownloadError>) {
    match result {
        Ok(totals) => {
            println!("\nDownload completed successfully!");
            println!("Output: {}", output_dir.display());
            println!("Posts written: {}", totals.posts);
            println!("Replies written: {}", totals.replies);
            println!("Users written: {}", totals.users);
            println!("Places written: {}", totals.places);
            println!("Requests: {} ({} successful)", totals.requests, totals.responses);
            if totals.filtered > 0 {
                println!("Posts filtered: {}", totals.filtered);
            }
            if totals.abandoned_queries > 0 {
                println!("Queries abandoned: {}", totals.abandoned_queries);
            }
        }
        Err(e) => {
            eprintln!("\nDownload failed!");
            eprintln!("Error: {e}");
            error!("Download failed: {}", e);
        }
    }
}
