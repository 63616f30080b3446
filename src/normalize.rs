//! Raw feed records to canonical earthquakes.
//!
//! Malformed records are dropped silently; nothing here returns an error.
//! Output order follows input order.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{Coordinates, Earthquake, RawFeedRecord};

/// Place used when the feed omits one.
pub const UNKNOWN_PLACE: &str = "Unknown location";

/// Normalize a batch of raw records.
///
/// `now` stands in for records that carry no event time.
#[must_use]
pub fn normalize(records: Vec<RawFeedRecord>, now: DateTime<Utc>) -> Vec<Earthquake> {
    let total = records.len();
    let mut seen = HashSet::with_capacity(total);

    let events: Vec<Earthquake> = records
        .into_iter()
        .filter_map(|record| normalize_record(record, now))
        .filter(|event| seen.insert(event.id.clone()))
        .collect();

    if events.len() < total {
        debug!("normalizer dropped {} of {} records", total - events.len(), total);
    }

    // Postcondition: never more events than records
    debug_assert!(events.len() <= total);
    events
}

/// Normalize one record, or `None` if it is unusable.
fn normalize_record(record: RawFeedRecord, now: DateTime<Utc>) -> Option<Earthquake> {
    let id = record.id.filter(|id| !id.trim().is_empty())?;
    let magnitude = record.properties.mag?;

    let coordinates = record.geometry.map(|g| g.coordinates).unwrap_or_default();
    if coordinates.len() < 2 {
        return None;
    }
    let longitude = coordinates[0]?;
    let latitude = coordinates[1]?;
    let depth = coordinates.get(2).copied().flatten().unwrap_or(0.0);

    Some(Earthquake {
        id,
        magnitude,
        place: record
            .properties
            .place
            .unwrap_or_else(|| UNKNOWN_PLACE.to_string()),
        time: record
            .properties
            .time
            .unwrap_or_else(|| now.timestamp_millis()),
        depth: depth.round().max(0.0),
        coordinates: Coordinates {
            longitude,
            latitude,
        },
        url: record.properties.url,
        significance: record.properties.sig,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawGeometry, RawProperties};

    fn record(id: &str, mag: Option<f64>, coords: &[Option<f64>]) -> RawFeedRecord {
        RawFeedRecord {
            id: Some(id.to_string()),
            properties: RawProperties {
                mag,
                place: Some(format!("near {id}")),
                time: Some(1_700_000_000_000),
                sig: Some(10),
                url: None,
            },
            geometry: Some(RawGeometry {
                coordinates: coords.to_vec(),
            }),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_800_000_000_000).expect("valid time")
    }

    #[test]
    fn test_drops_null_magnitude() {
        let records = vec![
            record("a", Some(2.5), &[Some(10.0), Some(20.0), Some(5.0)]),
            record("b", None, &[Some(10.0), Some(20.0), Some(5.0)]),
        ];
        let events = normalize(records, now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "a");
        assert!((events[0].magnitude - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_drops_short_or_bad_geometry() {
        let mut no_geometry = record("c", Some(1.0), &[]);
        no_geometry.geometry = None;
        let records = vec![
            record("a", Some(1.0), &[Some(10.0)]),
            record("b", Some(1.0), &[None, Some(20.0)]),
            no_geometry,
            record("d", Some(1.0), &[Some(-1.0), Some(1.0)]),
        ];
        let events = normalize(records, now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "d");
        assert!((events[0].depth - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_defaults_and_depth_rounding() {
        let raw = RawFeedRecord {
            id: Some("x".into()),
            properties: RawProperties {
                mag: Some(0.4),
                ..RawProperties::default()
            },
            geometry: Some(RawGeometry {
                coordinates: vec![Some(1.0), Some(2.0), Some(12.6)],
            }),
        };
        let events = normalize(vec![raw], now());
        let quake = &events[0];
        assert_eq!(quake.place, UNKNOWN_PLACE);
        assert_eq!(quake.time, now().timestamp_millis());
        assert_eq!(quake.significance, None);
        assert!((quake.depth - 13.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_negative_depth_clamps_to_zero() {
        let records = vec![record("a", Some(1.0), &[Some(1.0), Some(2.0), Some(-2.4)])];
        let events = normalize(records, now());
        assert!(events[0].depth.abs() < f64::EPSILON);
    }

    #[test]
    fn test_order_preserved_and_duplicates_dropped() {
        let coords = [Some(0.0), Some(0.0), Some(1.0)];
        let records = vec![
            record("c", Some(3.0), &coords),
            record("a", Some(1.0), &coords),
            record("c", Some(9.0), &coords),
            record("b", Some(2.0), &coords),
        ];
        let ids: Vec<String> = normalize(records, now()).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, ["c", "a", "b"]);
    }

    #[test]
    fn test_output_never_longer_than_input() {
        let coords = [Some(5.0), Some(6.0)];
        let mut missing_id = record("z", Some(1.0), &coords);
        missing_id.id = None;
        let records = vec![
            record("a", Some(1.0), &coords),
            missing_id,
            record(" ", Some(1.0), &coords),
            record("b", None, &coords),
        ];
        let input_len = records.len();
        let events = normalize(records, now());
        assert!(events.len() <= input_len);
        for event in &events {
            assert!(event.magnitude.is_finite());
            assert!(event.coordinates.longitude.is_finite());
            assert!(event.coordinates.latitude.is_finite());
        }
        assert_eq!(events.len(), 1);
    }
}
