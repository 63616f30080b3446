//! View models shared by the map, list and footer.
//!
//! Pure functions from a [`Snapshot`] to what each view draws. Both the
//! web page and the terminal output use these so the three views always
//! agree on styling and selection.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::dashboard::{RefreshStatus, Snapshot};
use crate::models::Earthquake;

/// World view used when nothing is loaded.
const WORLD_CENTER: (f64, f64) = (20.0, 0.0);
const WORLD_ZOOM: u8 = 2;

/// Zoom level when focusing a selected event.
const FOCUS_ZOOM: u8 = 7;

/// Selected markers are drawn larger by this factor.
const SELECTED_SCALE: f64 = 1.3;

/// Magnitude band used for marker color and legend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Light,
    Moderate,
    Strong,
}

impl Severity {
    #[must_use]
    pub fn of(magnitude: f64) -> Self {
        match magnitude {
            m if m < 2.0 => Self::Minor,
            m if m < 4.0 => Self::Light,
            m if m < 6.0 => Self::Moderate,
            _ => Self::Strong,
        }
    }

    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Minor => "#4ade80",
            Self::Light => "#fbbf24",
            Self::Moderate => "#f97316",
            Self::Strong => "#ef4444",
        }
    }

    /// Marker diameter in pixels.
    #[must_use]
    pub const fn size(self) -> u32 {
        match self {
            Self::Minor => 16,
            Self::Light => 22,
            Self::Moderate => 28,
            Self::Strong => 34,
        }
    }

    #[must_use]
    pub const fn legend(self) -> &'static str {
        match self {
            Self::Minor => "< 2.0",
            Self::Light => "2.0 - 3.9",
            Self::Moderate => "4.0 - 5.9",
            Self::Strong => "6.0+",
        }
    }
}

/// One map marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub place: String,
    pub detail_url: String,
    pub label: String,
    pub color: &'static str,
    pub size: f64,
    pub selected: bool,
    pub tooltip: String,
    /// Relative event time, e.g. "3 hours ago"
    pub age: String,
}

impl Marker {
    #[must_use]
    pub fn new(event: &Earthquake, selected: bool, now: DateTime<Utc>) -> Self {
        let severity = Severity::of(event.magnitude);
        let base = f64::from(severity.size());
        Self {
            id: event.id.clone(),
            latitude: event.coordinates.latitude,
            longitude: event.coordinates.longitude,
            place: event.place.clone(),
            detail_url: event.detail_url(),
            label: format!("{:.1}", event.magnitude),
            color: severity.color(),
            size: if selected { base * SELECTED_SCALE } else { base },
            selected,
            tooltip: format!("M{:.1} · {} km", event.magnitude, event.depth),
            age: age_label(event, now),
        }
    }
}

/// Where the map should look.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Viewport {
    /// Center on one event
    Focus {
        latitude: f64,
        longitude: f64,
        zoom: u8,
    },
    /// Fit all visible events
    Bounds {
        south: f64,
        west: f64,
        north: f64,
        east: f64,
    },
    World {
        latitude: f64,
        longitude: f64,
        zoom: u8,
    },
}

/// Pick the map viewport: the selection wins, then the visible bounds.
#[must_use]
pub fn viewport(visible: &[Earthquake], selected: Option<&Earthquake>) -> Viewport {
    if let Some(event) = selected {
        return Viewport::Focus {
            latitude: event.coordinates.latitude,
            longitude: event.coordinates.longitude,
            zoom: FOCUS_ZOOM,
        };
    }

    let bounds = visible.iter().fold(None, |acc: Option<(f64, f64, f64, f64)>, e| {
        let (lat, lon) = (e.coordinates.latitude, e.coordinates.longitude);
        Some(match acc {
            None => (lat, lon, lat, lon),
            Some((s, w, n, east)) => (s.min(lat), w.min(lon), n.max(lat), east.max(lon)),
        })
    });

    match bounds {
        Some((south, west, north, east)) => Viewport::Bounds {
            south,
            west,
            north,
            east,
        },
        None => Viewport::World {
            latitude: WORLD_CENTER.0,
            longitude: WORLD_CENTER.1,
            zoom: WORLD_ZOOM,
        },
    }
}

/// Human "time ago" label.
#[must_use]
pub fn relative_time(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(time);
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {unit} ago")
        } else {
            format!("{n} {unit}s ago")
        }
    };

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        plural(diff.num_minutes(), "minute")
    } else if diff.num_hours() < 24 {
        plural(diff.num_hours(), "hour")
    } else {
        plural(diff.num_days(), "day")
    }
}

fn age_label(event: &Earthquake, now: DateTime<Utc>) -> String {
    event
        .time_utc()
        .map_or_else(String::new, |t| relative_time(t, now))
}

/// Footer status line.
#[must_use]
pub fn status_line(status: &RefreshStatus) -> String {
    let last = status.last_success_at.map_or_else(
        || "Not refreshed yet".to_string(),
        |at| {
            format!(
                "Last refreshed: {}",
                at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            )
        },
    );
    if status.in_flight {
        format!("{last} · Refreshing…")
    } else {
        last
    }
}

/// Everything the web page renders, computed in one place.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    pub markers: Vec<Marker>,
    pub viewport: Viewport,
    pub status_line: String,
    pub ages: Vec<String>,
}

impl DashboardView {
    #[must_use]
    pub fn new(snapshot: Snapshot, now: DateTime<Utc>) -> Self {
        let selected_id = snapshot.selected.as_ref().map(|e| e.id.as_str());
        let markers = snapshot
            .visible
            .iter()
            .map(|e| Marker::new(e, Some(e.id.as_str()) == selected_id, now))
            .collect();
        let viewport = viewport(&snapshot.visible, snapshot.selected.as_ref());
        let status_line = status_line(&snapshot.status);
        let ages = snapshot
            .visible
            .iter()
            .map(|e| age_label(e, now))
            .collect();

        Self {
            snapshot,
            markers,
            viewport,
            status_line,
            ages,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::Coordinates;

    fn quake(id: &str, magnitude: f64, lat: f64, lon: f64) -> Earthquake {
        Earthquake {
            id: id.into(),
            magnitude,
            place: "Test".into(),
            time: 1_700_000_000_000,
            depth: 12.0,
            coordinates: Coordinates {
                longitude: lon,
                latitude: lat,
            },
            url: None,
            significance: None,
        }
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(Severity::of(1.99), Severity::Minor);
        assert_eq!(Severity::of(2.0), Severity::Light);
        assert_eq!(Severity::of(4.0), Severity::Moderate);
        assert_eq!(Severity::of(6.0), Severity::Strong);
        assert_eq!(Severity::of(-1.0), Severity::Minor);
    }

    #[test]
    fn test_selected_marker_is_larger() {
        let event = quake("a", 4.5, 1.0, 2.0);
        let plain = Marker::new(&event, false, Utc::now());
        let picked = Marker::new(&event, true, Utc::now());
        assert!((plain.size - 28.0).abs() < f64::EPSILON);
        assert!(picked.size > plain.size);
        assert_eq!(plain.color, "#f97316");
        assert_eq!(plain.tooltip, "M4.5 · 12 km");
    }

    #[test]
    fn test_viewport_prefers_selection() {
        let events = vec![quake("a", 1.0, 10.0, 20.0), quake("b", 1.0, -5.0, 40.0)];
        let focus = viewport(&events, Some(&events[1]));
        assert_eq!(
            focus,
            Viewport::Focus {
                latitude: -5.0,
                longitude: 40.0,
                zoom: 7
            }
        );

        let fit = viewport(&events, None);
        assert_eq!(
            fit,
            Viewport::Bounds {
                south: -5.0,
                west: 20.0,
                north: 10.0,
                east: 40.0
            }
        );

        assert!(matches!(viewport(&[], None), Viewport::World { zoom: 2, .. }));
    }

    #[test]
    fn test_relative_time() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let at = |h: u32, m: u32| Utc.with_ymd_and_hms(2024, 5, 1, h, m, 0).unwrap();
        assert_eq!(relative_time(now, now), "just now");
        assert_eq!(relative_time(at(11, 59), now), "1 minute ago");
        assert_eq!(relative_time(at(11, 15), now), "45 minutes ago");
        assert_eq!(relative_time(at(9, 0), now), "3 hours ago");
        let two_days = Utc.with_ymd_and_hms(2024, 4, 29, 11, 0, 0).unwrap();
        assert_eq!(relative_time(two_days, now), "2 days ago");
    }

    #[test]
    fn test_status_line() {
        let idle = RefreshStatus::default();
        assert_eq!(status_line(&idle), "Not refreshed yet");

        let busy = RefreshStatus {
            in_flight: true,
            last_success_at: Some(Utc::now()),
        };
        let line = status_line(&busy);
        assert!(line.starts_with("Last refreshed: "));
        assert!(line.ends_with("Refreshing…"));
    }

    #[test]
    fn test_view_marks_selected_marker() {
        let events = vec![quake("a", 1.0, 0.0, 0.0), quake("b", 5.0, 1.0, 1.0)];
        let snapshot = Snapshot {
            visible: events.clone(),
            selected: Some(events[1].clone()),
            ..Snapshot::default()
        };
        let now = Utc.timestamp_millis_opt(1_700_000_000_000 + 3 * 3_600_000).unwrap();
        let view = DashboardView::new(snapshot, now);
        assert_eq!(view.markers[0].age, "3 hours ago");
        assert_eq!(view.ages[1], view.markers[1].age);
        let flags: Vec<bool> = view.markers.iter().map(|m| m.selected).collect();
        assert_eq!(flags, [false, true]);
        assert_eq!(view.ages.len(), 2);
        assert!(matches!(view.viewport, Viewport::Focus { .. }));
    }
}
