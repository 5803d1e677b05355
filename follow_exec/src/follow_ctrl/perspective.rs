//! # Follow perspectives and altitude modes
//!
//! Decoding of the perspective and altitude mode selectors, and the mapping
//! from a perspective to the angle the vehicle views the target from.
//!
//! Angles are measured clockwise (viewed from above) from the target's
//! direction of travel, so 0 degrees places the vehicle in front of the
//! target and 180 degrees behind it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use std::convert::TryFrom;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

pub const BEHIND_ANGLE_DEG: f64 = 180.0;
pub const FRONT_ANGLE_DEG: f64 = 0.0;
pub const FRONT_RIGHT_ANGLE_DEG: f64 = 45.0;
pub const FRONT_LEFT_ANGLE_DEG: f64 = 315.0;
pub const MID_RIGHT_ANGLE_DEG: f64 = 90.0;
pub const MID_LEFT_ANGLE_DEG: f64 = 270.0;
pub const BEHIND_RIGHT_ANGLE_DEG: f64 = 135.0;
pub const BEHIND_LEFT_ANGLE_DEG: f64 = 225.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The perspective from which the vehicle views the target.
///
/// The discriminants are the selector codes used in the parameters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Perspective {
    /// No offset, the vehicle flies over the target.
    None = 0,
    Behind = 1,
    Front = 2,
    FrontRight = 3,
    FrontLeft = 4,
    MidRight = 5,
    MidLeft = 6,
    BehindRight = 7,
    BehindLeft = 8,
    /// Kept for compatibility with older settings, identical to `Behind`.
    MiddleFollow = 9
}

/// How the vehicle's altitude is chosen.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum AltitudeMode {
    /// Hold the current altitude setpoint, never going below the minimum
    /// follow height.
    Constant = 0,

    /// Stay the minimum follow height above the target.
    TrackTarget = 1
}

/// A selector parameter held a code which is not recognised.
#[derive(Debug, Copy, Clone, PartialEq, thiserror::Error)]
pub enum SelectorError {
    #[error("Unknown follow perspective selector {0}")]
    UnknownPerspective(i32),

    #[error("Unknown altitude mode selector {0}")]
    UnknownAltitudeMode(i32)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Perspective {
    /// Decode a selector, following from behind if the code is unknown.
    pub fn from_param(code: i32) -> Self {
        Self::try_from(code).unwrap_or(Perspective::Behind)
    }

    /// The angle to view the target from, or `None` if no offset should be
    /// applied.
    ///
    /// Units: degrees
    pub fn angle_deg(self) -> Option<f64> {
        match self {
            Perspective::None => None,
            Perspective::Behind => Some(BEHIND_ANGLE_DEG),
            Perspective::Front => Some(FRONT_ANGLE_DEG),
            Perspective::FrontRight => Some(FRONT_RIGHT_ANGLE_DEG),
            Perspective::FrontLeft => Some(FRONT_LEFT_ANGLE_DEG),
            Perspective::MidRight => Some(MID_RIGHT_ANGLE_DEG),
            Perspective::MidLeft => Some(MID_LEFT_ANGLE_DEG),
            Perspective::BehindRight => Some(BEHIND_RIGHT_ANGLE_DEG),
            Perspective::BehindLeft => Some(BEHIND_LEFT_ANGLE_DEG),
            Perspective::MiddleFollow => Some(BEHIND_ANGLE_DEG)
        }
    }
}

impl TryFrom<i32> for Perspective {
    type Error = SelectorError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Perspective::None,
            1 => Perspective::Behind,
            2 => Perspective::Front,
            3 => Perspective::FrontRight,
            4 => Perspective::FrontLeft,
            5 => Perspective::MidRight,
            6 => Perspective::MidLeft,
            7 => Perspective::BehindRight,
            8 => Perspective::BehindLeft,
            9 => Perspective::MiddleFollow,
            c => return Err(SelectorError::UnknownPerspective(c))
        })
    }
}

impl AltitudeMode {
    /// Decode a selector, using constant altitude if the code is unknown.
    pub fn from_param(code: i32) -> Self {
        Self::try_from(code).unwrap_or(AltitudeMode::Constant)
    }
}

impl TryFrom<i32> for AltitudeMode {
    type Error = SelectorError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(AltitudeMode::Constant),
            1 => Ok(AltitudeMode::TrackTarget),
            c => Err(SelectorError::UnknownAltitudeMode(c))
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Choose the representation of `new_deg` which is closest to `current_deg`.
///
/// The follow angle is low-pass filtered, so changing from 270 to 0 degrees
/// would sweep the vehicle three quarters of the way around the target.
/// Returning 360 instead makes the filter take the shorter way round.
///
/// The result is equivalent to `new_deg` modulo 360 and no more than 180
/// degrees from `current_deg`. An exactly opposite angle is left on the side
/// it was given. Non-finite inputs return `new_deg` unchanged.
pub fn unwrap_follow_angle(current_deg: f64, new_deg: f64) -> f64 {
    if !current_deg.is_finite() || !new_deg.is_finite() {
        return new_deg;
    }

    let mut assigned = new_deg;

    while current_deg - assigned > 180.0 {
        assigned += 360.0;
    }
    while current_deg - assigned < -180.0 {
        assigned -= 360.0;
    }

    assigned
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// True if the two angles are the same direction.
    fn same_direction_deg(a: f64, b: f64) -> bool {
        let d = util::maths::rem_euclid(a - b, 360.0);
        d < 1e-9 || (360.0 - d) < 1e-9
    }

    #[test]
    fn test_angle_table() {
        assert_eq!(Perspective::None.angle_deg(), None);
        assert_eq!(Perspective::Front.angle_deg(), Some(0.0));
        assert_eq!(Perspective::FrontRight.angle_deg(), Some(45.0));
        assert_eq!(Perspective::MidRight.angle_deg(), Some(90.0));
        assert_eq!(Perspective::BehindRight.angle_deg(), Some(135.0));
        assert_eq!(Perspective::Behind.angle_deg(), Some(180.0));
        assert_eq!(Perspective::BehindLeft.angle_deg(), Some(225.0));
        assert_eq!(Perspective::MidLeft.angle_deg(), Some(270.0));
        assert_eq!(Perspective::FrontLeft.angle_deg(), Some(315.0));
        assert_eq!(Perspective::MiddleFollow.angle_deg(), Some(180.0));
    }

    #[test]
    fn test_selector_codes() {
        for code in 0..=9 {
            let p = Perspective::try_from(code).unwrap();
            assert_eq!(p as i32, code);
        }

        assert_eq!(
            Perspective::try_from(10),
            Err(SelectorError::UnknownPerspective(10))
        );
        assert_eq!(Perspective::from_param(-1), Perspective::Behind);
        assert_eq!(Perspective::from_param(42).angle_deg(), Some(180.0));
    }

    #[test]
    fn test_altitude_mode_codes() {
        assert_eq!(AltitudeMode::from_param(0), AltitudeMode::Constant);
        assert_eq!(AltitudeMode::from_param(1), AltitudeMode::TrackTarget);
        assert_eq!(AltitudeMode::from_param(7), AltitudeMode::Constant);
        assert_eq!(
            AltitudeMode::try_from(7),
            Err(SelectorError::UnknownAltitudeMode(7))
        );
    }

    #[test]
    fn test_unwrap_takes_short_way() {
        // 270 -> 0 should go forward to 360
        assert_eq!(unwrap_follow_angle(270.0, 0.0), 360.0);

        // 0 -> 270 should go backwards to -90
        assert_eq!(unwrap_follow_angle(0.0, 270.0), -90.0);

        // Small changes are unaffected
        assert_eq!(unwrap_follow_angle(135.0, 180.0), 180.0);
    }

    #[test]
    fn test_unwrap_opposite_keeps_new_angle() {
        // A half turn either way is equally short, the new angle is taken
        // as given. Behind to front therefore assigns 0 rather than 360.
        assert_eq!(unwrap_follow_angle(180.0, 0.0), 0.0);
        assert_eq!(unwrap_follow_angle(0.0, 180.0), 180.0);
        assert_eq!(unwrap_follow_angle(90.0, 270.0), 270.0);
    }

    #[test]
    fn test_unwrap_properties() {
        let targets = [0.0, 45.0, 90.0, 135.0, 180.0, 225.0, 270.0, 315.0];

        let mut current = -1000.0;
        while current <= 1000.0 {
            for &new in targets.iter() {
                let assigned = unwrap_follow_angle(current, new);

                assert!(
                    (current - assigned).abs() <= 180.0,
                    "current {} new {} assigned {}", current, new, assigned
                );
                assert!(same_direction_deg(assigned, new));
            }
            current += 7.25;
        }
    }

    #[test]
    fn test_unwrap_after_drift() {
        // A raw angle which has drifted a full turn negative still takes the
        // short way to the next setting.
        assert_eq!(unwrap_follow_angle(-360.0, 225.0), -495.0);
    }

    #[test]
    fn test_unwrap_non_finite() {
        assert_eq!(unwrap_follow_angle(std::f64::INFINITY, 90.0), 90.0);
        assert_eq!(unwrap_follow_angle(std::f64::NAN, 90.0), 90.0);
    }
}
