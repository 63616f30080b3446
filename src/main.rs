//! quakeview - Live earthquake dashboard.
//!
//! Pulls the USGS summary feed on a fixed cadence and keeps a map, a list
//! and a stats footer in sync over one shared selection.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::error;

mod cli;
mod client;
mod dashboard;
mod errors;
mod filters;
mod models;
mod normalize;
mod output;
mod scheduler;
mod selection;
mod server;
mod stats;
mod views;

use cli::{Cli, Command};
use client::{FeedSource, UsgsClient};
use filters::FilterCriteria;
use scheduler::{MIN_REFRESH_INTERVAL, SchedulerConfig};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Snapshot(args) => cmd_snapshot(args),
    }
}

/// Initialize tracing subscriber. `RUST_LOG` wins over the flags.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to create tokio runtime")
}

/// Execute the `serve` command - start the dashboard.
fn cmd_serve(args: cli::ServeArgs) -> Result<()> {
    let requested = Duration::from_secs(args.refresh_secs);
    let refresh_interval = requested.max(MIN_REFRESH_INTERVAL);
    if refresh_interval != requested {
        tracing::warn!(
            "refresh interval clamped to minimum of {} seconds",
            MIN_REFRESH_INTERVAL.as_secs()
        );
    }

    let config = server::ServerConfig {
        port: args.port,
        host: args.host.clone(),
        feed_base_url: args.feed_url.clone(),
        scheduler: SchedulerConfig {
            refresh_interval,
            criteria: FilterCriteria::new(args.min_magnitude, args.window),
            ..SchedulerConfig::default()
        },
    };

    // Print startup message
    let url = format!("http://{}:{}", args.host, args.port);
    println!("\x1b[1m🌍 quakeview\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:   \x1b[96m{url}\x1b[0m");
    println!("  Window:  past {}", args.window);
    println!("  Refresh: every {}s", refresh_interval.as_secs());
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    if args.open {
        open_browser(&url);
    }

    runtime()?.block_on(server::run_server(config))
}

fn open_browser(url: &str) {
    #[cfg(target_os = "linux")]
    let spawned = std::process::Command::new("xdg-open").arg(url).spawn();
    #[cfg(target_os = "macos")]
    let spawned = std::process::Command::new("open").arg(url).spawn();
    #[cfg(target_os = "windows")]
    let spawned = std::process::Command::new("cmd")
        .args(["/c", "start", url])
        .spawn();
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    let spawned: io::Result<std::process::Child> =
        Err(io::Error::new(io::ErrorKind::Unsupported, "no browser launcher"));

    if let Err(e) = spawned {
        tracing::warn!("could not open browser: {}", e);
    }
}

/// Execute the `snapshot` command - one-shot fetch, filter and stats.
fn cmd_snapshot(args: cli::SnapshotArgs) -> Result<()> {
    let client = UsgsClient::with_base_url(&args.feed_url).context("failed to create USGS client")?;

    let records = runtime()?
        .block_on(client.fetch(args.window))
        .with_context(|| format!("failed to fetch {} earthquake feed", args.window))?;

    let events = normalize::normalize(records, Utc::now());
    let criteria = FilterCriteria::new(args.min_magnitude, args.window);
    let mut visible = filters::filter(&events, &criteria);
    let stats = stats::compute(&visible);
    tracing::debug!(
        "{} of {} events pass M{:.1}",
        visible.len(),
        events.len(),
        criteria.min_magnitude
    );

    // Stats cover the whole visible subset; only the listing is limited
    visible.truncate(args.limit);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_report(&mut handle, &visible, &stats, args.format)?;

    Ok(())
}
