//! Unit tests for command-line parsing

use clap::{CommandFactory, Parser};
use social_archive_downloader::cli::validate::ValidateTarget;
use social_archive_downloader::cli::{Cli, Commands, OutputFormat, RecordType};
use std::net::SocketAddr;
use std::path::PathBuf;

const BIN: &str = "social-archive-downloader";

#[test]
fn test_download_defaults() {
    let cli = Cli::try_parse_from([
        BIN,
        "download",
        "--search",
        "heatwave",
        "--start-time",
        "2022-07-01",
        "--output",
        "heatwave",
    ])
    .unwrap();

    assert_eq!(cli.output_format, OutputFormat::Human);
    assert!(cli.metrics_addr.is_none());

    let Commands::Download(args) = cli.command else {
        panic!("expected download command");
    };
    assert_eq!(args.posts_per_request, 100);
    assert_eq!(args.max_query_length, 1024);
    assert_eq!(args.max_retries, 5);
    assert!(!args.no_replies);
    assert!(args.end_time.is_none());
    assert!(args.exclude_pattern.is_none());

    let options = args.to_options().unwrap();
    assert!(options.config.download_replies);
    assert_eq!(options.config.max_query_length, 1024);
    assert_eq!(options.output_dir, PathBuf::from("heatwave"));
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        BIN,
        "download",
        "--search",
        "heatwave",
        "--start-time",
        "2022-07-01",
        "--output",
        "out",
        "--output-format",
        "json",
        "--metrics-addr",
        "127.0.0.1:9000",
        "--exclude-pattern",
        "(?i)giveaway",
    ])
    .unwrap();

    assert_eq!(cli.output_format, OutputFormat::Json);
    assert_eq!(
        cli.metrics_addr,
        Some("127.0.0.1:9000".parse::<SocketAddr>().unwrap())
    );
    let Commands::Download(args) = cli.command else {
        panic!("expected download command");
    };
    assert_eq!(args.exclude_pattern.as_deref(), Some("(?i)giveaway"));
}

#[test]
fn test_download_rejects_bad_values() {
    let base = [
        BIN,
        "download",
        "--search",
        "q",
        "--start-time",
        "2022-07-01",
        "--output",
        "out",
    ];

    for extra in [
        ["--posts-per-request", "501"],
        ["--max-query-length", "0"],
        ["--max-retries", "21"],
        ["--output-format", "xml"],
    ] {
        let args = base.iter().chain(extra.iter()).copied();
        assert!(Cli::try_parse_from(args).is_err(), "{extra:?}");
    }

    assert!(Cli::try_parse_from([BIN, "download", "--search", "q"]).is_err());
}

#[test]
fn test_anonymise_command() {
    let cli = Cli::try_parse_from([
        BIN,
        "anonymise",
        "--input",
        "users.jsonl",
        "--type",
        "user",
        "--credentials",
        "lab.toml",
    ])
    .unwrap();

    let Commands::Anonymise(command) = cli.command else {
        panic!("expected anonymise command");
    };
    assert_eq!(command.input, PathBuf::from("users.jsonl"));
    assert_eq!(command.record_type, RecordType::User);
    assert_eq!(command.credentials, PathBuf::from("lab.toml"));

    assert!(Cli::try_parse_from([BIN, "anonymise", "--input", "x", "--type", "place"]).is_err());
}

#[test]
fn test_validate_command() {
    let cli = Cli::try_parse_from([BIN, "validate", "credentials"]).unwrap();
    let Commands::Validate(command) = cli.command else {
        panic!("expected validate command");
    };
    assert!(matches!(
        command.target,
        ValidateTarget::Credentials { ref path } if path == &PathBuf::from("credentials.toml")
    ));

    let cli = Cli::try_parse_from([BIN, "validate", "pattern", "^RT"]).unwrap();
    let Commands::Validate(command) = cli.command else {
        panic!("expected validate command");
    };
    assert!(matches!(
        command.target,
        ValidateTarget::Pattern { ref pattern } if pattern == "^RT"
    ));
}

#[test]
fn test_anonymise_help_states_hash_scheme() {
    let mut command = Cli::command();
    let help = command
        .find_subcommand_mut("anonymise")
        .unwrap()
        .render_long_help()
        .to_string();

    assert!(help.contains("SHA-256"));
    assert!(help.contains("SHAKE128"));
}
