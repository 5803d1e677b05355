//! # Follow target topics
//!
//! This module defines the messages which flow between the target estimator, the follow
//! controller and anyone observing the controller.
//!
//! All vectors are expressed in the local North-East-Down (NED) frame, so that a higher altitude
//! is a more negative z component.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Estimate of the target's state produced by the target estimator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FollowTargetEstimate {
    /// Monotonic time at which the estimate was produced.
    ///
    /// Units: microseconds
    pub timestamp_us: u64,

    /// True if the estimator considers this estimate usable.
    pub valid: bool,

    /// Estimated target position.
    ///
    /// Units: meters,
    /// Frame: NED
    pub position_m: [f64; 3],

    /// Estimated target velocity.
    ///
    /// Units: meters/second,
    /// Frame: NED
    pub velocity_ms: [f64; 3],

    /// Estimated target acceleration.
    ///
    /// Units: meters/second^2,
    /// Frame: NED
    pub acceleration_mss: [f64; 3],
}

/// Diagnostic status published by the follow controller once per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FollowTargetStatus {
    /// Time of the cycle which produced this status.
    ///
    /// Units: microseconds
    pub timestamp_us: u64,

    /// Filtered target position, x (north) component. NaN until the target is first seen.
    pub x_est_filtered_m: f64,

    /// Filtered target position, y (east) component.
    pub y_est_filtered_m: f64,

    /// Filtered target position, z (down) component.
    pub z_est_filtered_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl FollowTargetEstimate {
    /// An estimate is fresh if it has been stamped and the estimator marked it valid.
    pub fn is_fresh(&self) -> bool {
        self.timestamp_us > 0 && self.valid
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_estimate_is_stale() {
        assert!(!FollowTargetEstimate::default().is_fresh());
    }

    #[test]
    fn test_freshness() {
        let mut est = FollowTargetEstimate {
            timestamp_us: 1_000,
            valid: true,
            ..Default::default()
        };
        assert!(est.is_fresh());

        est.valid = false;
        assert!(!est.is_fresh());

        est.valid = true;
        est.timestamp_us = 0;
        assert!(!est.is_fresh());
    }

    #[test]
    fn test_estimate_from_json() {
        let json = r#"{
            "timestamp_us": 42,
            "valid": true,
            "position_m": [1.0, 2.0, -3.0],
            "velocity_ms": [0.5, 0.0, 0.0],
            "acceleration_mss": [0.0, 0.0, 0.0]
        }"#;

        let est: FollowTargetEstimate = serde_json::from_str(json).unwrap();

        assert!(est.is_fresh());
        assert_eq!(est.position_m, [1.0, 2.0, -3.0]);
        assert_eq!(est.velocity_ms[0], 0.5);
    }
}
