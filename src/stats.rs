use std::fmt;

use serde::{Deserialize, Serialize};

/// Running counters for one target instance, logged when a temporal id
/// completes and carried in the persisted completion log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetStats {
    /// Point requests issued to the interpolator.
    pub point_requests: usize,
    /// Distinct points filled across all temporal ids.
    pub points_filled: usize,
    /// Offsets skipped as duplicates or pre-marked invalid.
    pub offsets_skipped: usize,
    /// Temporal ids brought to completion.
    pub completions: usize,
    /// Point requests deferred on stale map coverage.
    pub deferrals: usize,
}

impl fmt::Display for TargetStats {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            fmt,
            "requests={} filled={} skipped={} completions={} deferrals={}",
            self.point_requests,
            self.points_filled,
            self.offsets_skipped,
            self.completions,
            self.deferrals
        )
    }
}
