//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use clap::{Parser, Subcommand};

use crate::client::{TimeWindow, USGS_BASE_URL};
use crate::output::Format;

/// Live earthquake dashboard backed by the USGS feed.
#[derive(Parser, Debug)]
#[command(name = "quakeview")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web dashboard (map, list and stats)
    Serve(ServeArgs),

    /// Fetch once, print the filtered list and stats, and exit
    Snapshot(SnapshotArgs),
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, short = 'p', default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Initial time window: day, week or month
    #[arg(long, short = 'w', default_value = "day", value_parser = parse_window)]
    pub window: TimeWindow,

    /// Initial minimum magnitude
    #[arg(long, default_value = "0")]
    pub min_magnitude: f64,

    /// Periodic refresh interval in seconds (minimum 30)
    #[arg(long, default_value = "300")]
    pub refresh_secs: u64,

    /// Feed host, for mirrors or local testing
    #[arg(long, default_value = USGS_BASE_URL)]
    pub feed_url: String,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

/// Arguments for the `snapshot` command.
#[derive(Parser, Debug)]
pub struct SnapshotArgs {
    /// Time window: day, week or month
    #[arg(long, short = 'w', default_value = "day", value_parser = parse_window)]
    pub window: TimeWindow,

    /// Minimum magnitude to show
    #[arg(long, default_value = "0")]
    pub min_magnitude: f64,

    /// Maximum number of events to print (stats cover all of them)
    #[arg(long, short = 'n', default_value = "50")]
    pub limit: usize,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,

    /// Feed host, for mirrors or local testing
    #[arg(long, default_value = USGS_BASE_URL)]
    pub feed_url: String,
}

/// Parse a time window; unknown values fall back to the past day.
#[allow(clippy::unnecessary_wraps, reason = "clap value parsers return Result")]
fn parse_window(s: &str) -> Result<TimeWindow, String> {
    Ok(TimeWindow::parse_lenient(s))
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["quakeview", "serve"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 8080);
        assert_eq!(args.window, TimeWindow::Day);
        assert_eq!(args.refresh_secs, 300);
        assert_eq!(args.feed_url, USGS_BASE_URL);
    }

    #[test]
    fn test_snapshot_args() {
        let cli = Cli::try_parse_from([
            "quakeview",
            "snapshot",
            "--window",
            "week",
            "--min-magnitude",
            "2.5",
            "-f",
            "json",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Snapshot(args) = cli.command else {
            panic!("expected snapshot");
        };
        assert_eq!(args.window, TimeWindow::Week);
        assert!((args.min_magnitude - 2.5).abs() < f64::EPSILON);
        assert_eq!(args.format, Format::Json);
    }

    #[test]
    fn test_unknown_window_falls_back_to_day() {
        let cli = Cli::try_parse_from(["quakeview", "snapshot", "-w", "year"]).unwrap();
        let Command::Snapshot(args) = cli.command else {
            panic!("expected snapshot");
        };
        assert_eq!(args.window, TimeWindow::Day);
    }
}
