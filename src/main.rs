//! Main entry point for the social-archive-downloader CLI

use clap::Parser;
use social_archive_downloader::cli::{Cli, CliError, Commands};
use social_archive_downloader::metrics;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // LOG_FORMAT=json switches to machine-readable output
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("social_archive_downloader=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(addr) = cli.metrics_addr {
        metrics::init_metrics(addr)
            .await
            .map_err(|e| CliError::ConfigurationError(e.to_string()))?;
    }

    match cli.command {
        Commands::Download(ref args) => args.execute(&cli).await?,
        Commands::Anonymise(ref command) => command.execute().await?,
        Commands::Validate(ref command) => command.execute().await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}
