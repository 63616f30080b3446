//! Summary aggregates over the visible subset.

use serde::Serialize;

use crate::models::Earthquake;

/// Derived from the visible subset on every change, never stored elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DerivedStats {
    pub total_count: usize,
    /// 0 when there are no events
    pub max_magnitude: f64,
    /// 0 when there are no events
    pub mean_depth_rounded: i64,
}

/// Compute stats for `events`.
#[must_use]
pub fn compute(events: &[Earthquake]) -> DerivedStats {
    if events.is_empty() {
        return DerivedStats::default();
    }

    let max_magnitude = events
        .iter()
        .map(|e| e.magnitude)
        .reduce(f64::max)
        .unwrap_or(0.0);

    let depth_sum: f64 = events.iter().map(|e| e.depth).sum();
    #[allow(clippy::cast_precision_loss, reason = "event counts are small")]
    let mean_depth = depth_sum / events.len() as f64;
    #[allow(clippy::cast_possible_truncation, reason = "depths are bounded km")]
    let mean_depth_rounded = mean_depth.round() as i64;

    DerivedStats {
        total_count: events.len(),
        max_magnitude,
        mean_depth_rounded,
    }
}
