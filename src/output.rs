//! Terminal output for the one-shot `snapshot` command.
//!
//! Supports human-readable (with colors), JSON, and NDJSON formats.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Earthquake;
use crate::stats::DerivedStats;
use crate::views::{Severity, relative_time};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

// Same bands as the map markers
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const ORANGE: &str = "\x1b[38;5;208m";
const RED: &str = "\x1b[91m";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// JSON object with events and stats
    Json,
    /// Newline-delimited JSON (one event per line)
    Ndjson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            _ => Err(format!("unknown format: {s} (expected: human, json, ndjson)")),
        }
    }
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Minor => GREEN,
        Severity::Light => YELLOW,
        Severity::Moderate => ORANGE,
        Severity::Strong => RED,
    }
}

/// Write events and stats in human-readable format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(
    writer: &mut W,
    events: &[Earthquake],
    stats: &DerivedStats,
    now: DateTime<Utc>,
) -> io::Result<()> {
    if events.is_empty() {
        writeln!(writer, "{DIM}No earthquakes found.{RESET}")?;
    }

    for event in events {
        let color = severity_color(Severity::of(event.magnitude));
        let when = event
            .time_utc()
            .map_or_else(|| "unknown".into(), |t| relative_time(t, now));

        writeln!(
            writer,
            "{color}{BOLD}M{mag:.1}{RESET} │ {DIM}{depth:>4}km{RESET} │ {when:>14} │ {place}",
            mag = event.magnitude,
            depth = event.depth,
            place = event.place,
        )?;
    }

    writeln!(
        writer,
        "{DIM}──────────────────────────────────────────────{RESET}"
    )?;
    writeln!(
        writer,
        "{BOLD}{}{RESET} events │ max M{:.1} │ mean depth {} km",
        stats.total_count, stats.max_magnitude, stats.mean_depth_rounded
    )
}

#[derive(Serialize)]
struct JsonReport<'a> {
    events: &'a [Earthquake],
    stats: &'a DerivedStats,
}

/// Write events and stats as one JSON object.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(
    writer: &mut W,
    events: &[Earthquake],
    stats: &DerivedStats,
) -> io::Result<()> {
    let json = serde_json::to_string_pretty(&JsonReport { events, stats })
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write events as newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(writer: &mut W, events: &[Earthquake]) -> io::Result<()> {
    for event in events {
        let json = serde_json::to_string(event)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}

/// Write a snapshot in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_report<W: Write>(
    writer: &mut W,
    events: &[Earthquake],
    stats: &DerivedStats,
    format: Format,
) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, events, stats, Utc::now()),
        Format::Json => write_json(writer, events, stats),
        Format::Ndjson => write_ndjson(writer, events),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;
    use crate::stats;

    fn sample() -> Vec<Earthquake> {
        vec![Earthquake {
            id: "ak0001".into(),
            magnitude: 3.2,
            place: "50 km S of Anchorage".into(),
            time: 1_700_000_000_000,
            depth: 33.0,
            coordinates: Coordinates {
                longitude: -150.0,
                latitude: 60.7,
            },
            url: None,
            significance: Some(160),
        }]
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("human".parse::<Format>().unwrap(), Format::Human);
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("ndjson".parse::<Format>().unwrap(), Format::Ndjson);
        assert!("invalid".parse::<Format>().is_err());
    }

    #[test]
    fn test_human_includes_stats() {
        let events = sample();
        let mut out = Vec::new();
        write_human(&mut out, &events, &stats::compute(&events), Utc::now()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("M3.2"));
        assert!(text.contains("Anchorage"));
        assert!(text.contains("mean depth 33 km"));
    }

    #[test]
    fn test_json_report_shape() {
        let events = sample();
        let mut out = Vec::new();
        write_json(&mut out, &events, &stats::compute(&events)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["events"][0]["id"], "ak0001");
        assert_eq!(value["stats"]["total_count"], 1);
        assert_eq!(value["events"][0]["coordinates"]["latitude"], 60.7);
    }

    #[test]
    fn test_ndjson_one_line_per_event() {
        let mut events = sample();
        events.push(events[0].clone());
        let mut out = Vec::new();
        write_ndjson(&mut out, &events).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }
}
