//! Event filtering logic.
//!
//! The time window is applied upstream by choosing the feed; only the
//! magnitude threshold filters client-side.

use serde::{Deserialize, Serialize};

use crate::client::TimeWindow;
use crate::models::Earthquake;

/// User-controlled filter criteria.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Inclusive magnitude threshold, never negative
    pub min_magnitude: f64,
    pub time_window: TimeWindow,
}

impl FilterCriteria {
    #[must_use]
    pub fn new(min_magnitude: f64, time_window: TimeWindow) -> Self {
        Self {
            min_magnitude: sanitize_min_magnitude(min_magnitude),
            time_window,
        }
    }

    /// Check if an event passes the criteria.
    #[must_use]
    pub fn matches(&self, event: &Earthquake) -> bool {
        event.magnitude >= self.min_magnitude
    }
}

/// Clamp user input to a usable threshold: non-finite or negative becomes 0.
#[must_use]
pub fn sanitize_min_magnitude(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

/// Compute the visible subset. Pure; keeps input order.
#[must_use]
pub fn filter(events: &[Earthquake], criteria: &FilterCriteria) -> Vec<Earthquake> {
    events
        .iter()
        .filter(|e| criteria.matches(e))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinates;

    fn quake(id: &str, magnitude: f64) -> Earthquake {
        Earthquake {
            id: id.into(),
            magnitude,
            place: "Test".into(),
            time: 0,
            depth: 5.0,
            coordinates: Coordinates {
                longitude: 0.0,
                latitude: 0.0,
            },
            url: None,
            significance: None,
        }
    }

    fn sample() -> Vec<Earthquake> {
        vec![
            quake("a", 0.5),
            quake("b", 2.0),
            quake("c", 4.7),
            quake("d", 2.0),
            quake("e", -0.3),
        ]
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let criteria = FilterCriteria::new(2.0, TimeWindow::Day);
        let ids: Vec<String> = filter(&sample(), &criteria).into_iter().map(|e| e.id).collect();
        assert_eq!(ids, ["b", "c", "d"]);
    }

    #[test]
    fn test_default_shows_non_negative() {
        let visible = filter(&sample(), &FilterCriteria::default());
        assert_eq!(visible.len(), 4);
    }

    #[test]
    fn test_idempotent() {
        let criteria = FilterCriteria::new(1.0, TimeWindow::Week);
        let once = filter(&sample(), &criteria);
        let twice = filter(&once, &criteria);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_monotonic_in_threshold() {
        let events = sample();
        let mut previous = usize::MAX;
        for step in 0..12 {
            let criteria = FilterCriteria::new(f64::from(step) * 0.5, TimeWindow::Day);
            let count = filter(&events, &criteria).len();
            assert!(count <= previous, "raising threshold grew the subset");
            previous = count;
        }
    }

    #[test]
    fn test_sanitize() {
        assert!((sanitize_min_magnitude(-3.0)).abs() < f64::EPSILON);
        assert!((sanitize_min_magnitude(f64::NAN)).abs() < f64::EPSILON);
        assert!((sanitize_min_magnitude(3.5) - 3.5).abs() < f64::EPSILON);
    }
}
