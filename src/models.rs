//! Data models for the USGS feed and the dashboard's canonical events.
//!
//! Raw records mirror the GeoJSON features from USGS summary feeds but
//! decode leniently: a field with the wrong type becomes `None` instead of
//! failing the whole document. The normalizer decides what to keep.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Event page on the USGS site, keyed by event id.
const DETAIL_URL_BASE: &str = "https://earthquake.usgs.gov/earthquakes/eventpage";

/// A single feature as delivered by the feed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFeedRecord {
    /// Event ID
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,

    /// Event properties
    #[serde(default)]
    pub properties: RawProperties,

    /// Geographic location
    #[serde(default)]
    pub geometry: Option<RawGeometry>,
}

/// The subset of feed properties the dashboard reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProperties {
    /// Magnitude value
    #[serde(default, deserialize_with = "lenient_f64")]
    pub mag: Option<f64>,

    /// Human-readable place description
    #[serde(default, deserialize_with = "lenient_string")]
    pub place: Option<String>,

    /// Event time (ms since epoch)
    #[serde(default, deserialize_with = "lenient_i64")]
    pub time: Option<i64>,

    /// Significance score (0-1000+)
    #[serde(default, deserialize_with = "lenient_i64")]
    pub sig: Option<i64>,

    /// Event page URL
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: Option<String>,
}

/// Point geometry for an event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGeometry {
    /// Coordinates: [longitude, latitude, depth_km]
    #[serde(default, deserialize_with = "lenient_coordinates")]
    pub coordinates: Vec<Option<f64>>,
}

/// Longitude/latitude pair in degrees. Both components are finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

/// A normalized earthquake: the unit of the canonical event set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Earthquake {
    /// Unique event ID
    pub id: String,
    pub magnitude: f64,
    pub place: String,
    /// Event time (ms since epoch)
    pub time: i64,
    /// Depth in whole kilometers, never negative
    pub depth: f64,
    pub coordinates: Coordinates,
    pub url: Option<String>,
    pub significance: Option<i64>,
}

impl Earthquake {
    /// Get the event time as a `DateTime<Utc>`.
    #[must_use]
    pub fn time_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.time).single()
    }

    /// Link to the USGS event page.
    #[must_use]
    pub fn detail_url(&self) -> String {
        format!("{DETAIL_URL_BASE}/{}", self.id)
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(round_to_i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

fn lenient_coordinates<'de, D>(deserializer: D) -> Result<Vec<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().map(value_as_f64).collect(),
        _ => Vec::new(),
    })
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}

#[allow(clippy::cast_possible_truncation, reason = "feed times fit in i64 millis")]
fn round_to_i64(v: f64) -> i64 {
    v.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_usgs_feature() {
        let json = r#"{
            "type": "Feature",
            "id": "ci40000001",
            "properties": {
                "mag": 2.3, "place": "10km NE of Ridgecrest, CA",
                "time": 1700000000000, "sig": 81,
                "url": "https://earthquake.usgs.gov/earthquakes/eventpage/ci40000001",
                "status": "automatic"
            },
            "geometry": { "type": "Point", "coordinates": [-117.6, 35.7, 8.2] }
        }"#;
        let record: RawFeedRecord = serde_json::from_str(json).expect("failed to parse");
        assert_eq!(record.id.as_deref(), Some("ci40000001"));
        assert_eq!(record.properties.mag, Some(2.3));
        assert_eq!(record.properties.sig, Some(81));
        let geometry = record.geometry.expect("geometry");
        assert_eq!(geometry.coordinates, vec![Some(-117.6), Some(35.7), Some(8.2)]);
    }

    #[test]
    fn test_wrong_types_decode_as_absent() {
        let json = r#"{
            "id": "x1",
            "properties": { "mag": null, "time": "not a time", "sig": {}, "place": 7 },
            "geometry": { "coordinates": "nope" }
        }"#;
        let record: RawFeedRecord = serde_json::from_str(json).expect("failed to parse");
        assert_eq!(record.properties.mag, None);
        assert_eq!(record.properties.time, None);
        assert_eq!(record.properties.sig, None);
        assert_eq!(record.properties.place.as_deref(), Some("7"));
        assert!(record.geometry.expect("geometry").coordinates.is_empty());
    }

    #[test]
    fn test_missing_sections_default() {
        let record: RawFeedRecord = serde_json::from_str("{}").expect("failed to parse");
        assert!(record.id.is_none());
        assert!(record.geometry.is_none());
        assert!(record.properties.mag.is_none());
    }

    #[test]
    fn test_detail_url() {
        let quake = Earthquake {
            id: "us7000abcd".into(),
            magnitude: 4.1,
            place: "Somewhere".into(),
            time: 0,
            depth: 10.0,
            coordinates: Coordinates {
                longitude: 0.0,
                latitude: 0.0,
            },
            url: None,
            significance: None,
        };
        assert_eq!(
            quake.detail_url(),
            "https://earthquake.usgs.gov/earthquakes/eventpage/us7000abcd"
        );
        assert!(quake.time_utc().is_some());
    }
}
