//! # Follow control module
//!
//! Follow control generates the position, velocity and yaw setpoints which
//! make the vehicle follow a moving target from a chosen perspective,
//! distance and height.
//!
//! Every cycle the latest target estimate is pulled from the estimator topic.
//! The estimated target position is low-pass filtered to smooth out estimator
//! noise, with the sample fed to the filter predicted forward in time to
//! cancel some of the filter lag. The vehicle is placed on a circle around
//! the filtered target position, at an angle from the target's direction of
//! travel which is set by the perspective parameter. Both the angle and the
//! resulting offset direction are themselves filtered so that perspective
//! changes and target turns produce smooth sweeps rather than jumps.
//!
//! The vehicle always yaws to face the target. If the estimate is stale the
//! vehicle holds its horizontal position, and if it gets too close to the
//! ground it climbs slowly regardless of what the target is doing.
//!
//! All positions are in the local NED frame.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod perspective;
mod predict;
mod state;


// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use perspective::*;
pub use predict::*;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Speed above which the target's heading is updated. Below this the last
/// heading is kept to prevent jitter while the target is almost stationary.
///
/// Units: meters/second
pub const MIN_SPEED_FOR_HEADING_CHANGE_MS: f64 = 0.1;

/// Minimum horizontal distance between the vehicle and the target for yaw
/// control.
///
/// Units: meters
pub const MIN_DIST_FOR_YAW_CONTROL_M: f64 = 1.0;

/// Distance to the ground below which the emergency ascent is triggered.
///
/// Units: meters
pub const MIN_SAFETY_ALTITUDE_M: f64 = 1.0;

/// Maximum altitude error for which horizontal control is performed.
///
/// Units: meters
pub const ALT_ACCEPTANCE_THRESHOLD_M: f64 = 3.0;

/// Climb rate during an emergency ascent.
///
/// Units: meters/second
pub const EMERGENCY_ASCENT_SPEED_MS: f64 = 0.2;

/// Time constant of the target position filter. Also used as the horizon
/// for predicting the target position.
///
/// Units: seconds
pub const POSITION_FILTER_TC_S: f64 = 1.5;

/// Time constant of the follow angle filter.
///
/// Units: seconds
pub const FOLLOW_ANGLE_FILTER_TC_S: f64 = 3.0;

/// Time constant of the offset direction filter.
///
/// Units: seconds
pub const DIRECTION_FILTER_TC_S: f64 = 3.0;

/// Time constant of the velocity feed-forward ramp.
///
/// Units: seconds
pub const VELOCITY_FF_FILTER_TC_S: f64 = 1.0;

/// Smallest follow distance accepted from a parameter file. Smaller values
/// met at runtime are raised to this.
///
/// Units: meters
pub const MIN_FOLLOW_DISTANCE_M: f64 = 1.0;

/// Smallest minimum follow height accepted from a parameter file.
///
/// Units: meters
pub const MIN_FOLLOW_HEIGHT_M: f64 = 8.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur while setting up FollowCtrl.
///
/// Cyclic processing never fails, all faults are handled by holding position.
#[derive(Debug, thiserror::Error)]
pub enum FollowCtrlError {
    #[error("Could not load parameters: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Could not initialise the archive: {0}")]
    ArchiveInitError(util::archive::ArchiveError),

    #[error("Parameter {0} is out of range: {1}")]
    InvalidParam(&'static str, f64),
}
