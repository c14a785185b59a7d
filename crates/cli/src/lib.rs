pub mod commands;

use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use renoquote_core::config::{AppConfig, LoadOptions, LogFormat, LoggingConfig};
use tracing::Level;

use commands::feedback::{LearnArgs, RecordArgs};
use commands::quote::QuoteArgs;

#[derive(Debug, Parser)]
#[command(
    name = "renoquote",
    about = "Renovation quote engine CLI",
    long_about = "Price free-text renovation jobs, feed back actual hours, and record quote outcomes.",
    after_help = "Examples:\n  renoquote quote --transcript \"Redo my 6 m2 bathroom in Lyon\"\n  renoquote quote --transcript \"...\" --scenario all --seasonality peak\n  renoquote learn --city Lyon --task tiling_floor --actual-hours 14 --estimated-hours 12\n  renoquote record --quote-id Q-20250101120000-abcd1234 --accepted"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Price a transcript and print the quote as JSON")]
    Quote(QuoteArgs),
    #[command(about = "Feed actual vs. estimated hours back into the learned multipliers")]
    Learn(LearnArgs),
    #[command(about = "Record whether a client accepted or rejected a quote")]
    Record(RecordArgs),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

/// Installs the global subscriber. Events go to stderr so stdout stays pure JSON.
pub fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow!("failed to install tracing subscriber: {error}"))
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // Config errors surface through the command itself; logging just falls back to defaults.
    let logging = AppConfig::load(LoadOptions::default())
        .map(|config| config.logging)
        .unwrap_or_else(|_| AppConfig::default().logging);
    if let Err(error) = init_logging(&logging) {
        eprintln!("{error}");
    }

    let result = match cli.command {
        Command::Quote(args) => commands::quote::run(&args),
        Command::Learn(args) => commands::feedback::learn(&args),
        Command::Record(args) => commands::feedback::record(&args),
        Command::Config => commands::config::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn quote_arguments_parse_with_defaults() {
        let cli = Cli::try_parse_from(["renoquote", "quote", "--transcript", "retile the floor"])
            .expect("quote args should parse");
        let Command::Quote(args) = cli.command else {
            panic!("expected quote subcommand");
        };
        assert_eq!(args.transcript, "retile the floor");
        assert_eq!(args.scenario, "mid");
        assert_eq!(args.seasonality, "neutral");
        assert_eq!(args.inflation, 0.0);
    }

    #[test]
    fn record_requires_exactly_one_outcome_flag() {
        assert!(Cli::try_parse_from(["renoquote", "record", "--quote-id", "Q-1"]).is_err());
        assert!(Cli::try_parse_from([
            "renoquote",
            "record",
            "--quote-id",
            "Q-1",
            "--accepted",
            "--rejected"
        ])
        .is_err());

        let cli = Cli::try_parse_from(["renoquote", "record", "--quote-id", "Q-1", "--rejected"])
            .expect("rejected alone is valid");
        let Command::Record(args) = cli.command else {
            panic!("expected record subcommand");
        };
        assert!(args.rejected);
        assert!(!args.accepted);
    }

    #[test]
    fn learn_parses_hours() {
        let cli = Cli::try_parse_from([
            "renoquote",
            "learn",
            "--city",
            "Lyon",
            "--task",
            "tiling_floor",
            "--actual-hours",
            "14",
            "--estimated-hours",
            "12.5",
        ])
        .expect("learn args should parse");
        let Command::Learn(args) = cli.command else {
            panic!("expected learn subcommand");
        };
        assert_eq!(args.estimated_hours, 12.5);
    }
}
