//! # Follow simulation
//!
//! A simple kinematic simulation used to exercise follow control without a
//! vehicle. The target drives around a circular track and its estimator
//! publishes perfect estimates at a fixed rate, apart from a dropout window
//! during which the estimates are marked invalid. The vehicle tracks the
//! controller's setpoints with a proportional position loop plus velocity
//! feed-forward.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector3;
use serde::Deserialize;

// Internal
use crate::follow_ctrl::{Setpoint, SharedParams, VehicleState};
use comms_if::topics::FollowTargetEstimate;
use util::maths::{clamp, get_ang_dist_2pi};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors in the simulation setup.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("The cycle period must be finite and positive, found {0}")]
    InvalidCyclePeriod(f64),

    #[error("Invalid run duration \"{0}\", expected a finite number of seconds")]
    InvalidDuration(String)
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the simulation.
#[derive(Deserialize, Debug, Clone)]
pub struct SimParams {
    /// Period of one control cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Centre of the target's track.
    ///
    /// Units: meters,
    /// Frame: NED
    pub track_centre_m: [f64; 3],

    /// Radius of the target's track. Zero gives a stationary target.
    ///
    /// Units: meters
    pub track_radius_m: f64,

    /// Speed of the target along its track.
    ///
    /// Units: meters/second
    pub target_speed_ms: f64,

    /// Time between target estimates.
    ///
    /// Units: seconds
    pub estimate_period_s: f64,

    /// Time at which the estimator starts producing invalid estimates.
    ///
    /// Units: seconds
    pub dropout_start_s: f64,

    /// Length of the estimator dropout.
    ///
    /// Units: seconds
    pub dropout_duration_s: f64,

    /// Initial vehicle position.
    ///
    /// Units: meters,
    /// Frame: NED
    pub vehicle_start_m: [f64; 3],

    /// Initial vehicle heading.
    ///
    /// Units: radians
    pub vehicle_start_yaw_rad: f64,

    /// Height of the ground, as a down coordinate.
    ///
    /// Units: meters
    pub ground_down_m: f64,

    /// Gain of the vehicle's position loop.
    ///
    /// Units: 1/seconds
    pub position_gain: f64,

    /// Maximum vehicle speed.
    ///
    /// Units: meters/second
    pub max_speed_ms: f64,

    /// Maximum vehicle yaw rate.
    ///
    /// Units: radians/second
    pub max_yaw_rate_rads: f64,

    /// Perspective changes to apply during the run.
    #[serde(default)]
    pub perspective_schedule: Vec<PerspectiveChange>
}

/// A change of the perspective selector at a given time.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveChange {
    /// Units: seconds
    pub time_s: f64,

    pub perspective: i32
}

/// A target moving around a circular track.
#[derive(Debug, Clone)]
pub struct TargetSim {
    centre_m: Vector3<f64>,
    radius_m: f64,

    /// Units: radians/second
    angular_rate_rads: f64,

    estimate_period_s: f64,
    dropout_start_s: f64,
    dropout_end_s: f64,

    time_s: f64,
    next_estimate_s: f64
}

/// A kinematic vehicle which tracks position and velocity setpoints.
#[derive(Debug, Clone)]
pub struct VehicleSim {
    position_m: Vector3<f64>,
    velocity_ms: Vector3<f64>,
    yaw_rad: f64,

    ground_down_m: f64,
    position_gain: f64,
    max_speed_ms: f64,
    max_yaw_rate_rads: f64
}

/// Applies a `PerspectiveChange` schedule to a set of shared parameters.
#[derive(Debug, Clone)]
pub struct PerspectiveSchedule {
    changes: Vec<PerspectiveChange>,
    next: usize
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimParams {
    /// Check the parameters the main loop depends on.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.cycle_period_s.is_finite() && self.cycle_period_s > 0.0 {
            Ok(())
        }
        else {
            Err(SimError::InvalidCyclePeriod(self.cycle_period_s))
        }
    }
}

/// Parse the run duration argument, which must be a finite, non-negative
/// number of seconds.
pub fn parse_duration_s(arg: &str) -> Result<f64, SimError> {
    match arg.trim().parse::<f64>() {
        Ok(d) if d.is_finite() && d >= 0.0 => Ok(d),
        _ => Err(SimError::InvalidDuration(arg.to_string()))
    }
}

impl TargetSim {
    pub fn new(params: &SimParams) -> Self {
        let angular_rate_rads = if params.track_radius_m > std::f64::EPSILON {
            params.target_speed_ms / params.track_radius_m
        }
        else {
            0.0
        };

        Self {
            centre_m: Vector3::from(params.track_centre_m),
            radius_m: params.track_radius_m.max(0.0),
            angular_rate_rads,
            estimate_period_s: params.estimate_period_s,
            dropout_start_s: params.dropout_start_s,
            dropout_end_s: params.dropout_start_s + params.dropout_duration_s,
            time_s: 0.0,
            next_estimate_s: 0.0
        }
    }

    /// Advance the target by `dt_s` seconds.
    pub fn step(&mut self, dt_s: f64) {
        self.time_s += dt_s;
    }

    pub fn position_m(&self) -> Vector3<f64> {
        let angle = self.angular_rate_rads * self.time_s;

        self.centre_m + Vector3::new(angle.cos(), angle.sin(), 0.0) * self.radius_m
    }

    pub fn velocity_ms(&self) -> Vector3<f64> {
        let angle = self.angular_rate_rads * self.time_s;

        Vector3::new(-angle.sin(), angle.cos(), 0.0) * self.radius_m * self.angular_rate_rads
    }

    /// Centripetal acceleration of the target.
    pub fn acceleration_mss(&self) -> Vector3<f64> {
        let angle = self.angular_rate_rads * self.time_s;

        Vector3::new(-angle.cos(), -angle.sin(), 0.0)
            * self.radius_m * self.angular_rate_rads.powi(2)
    }

    /// True while the estimator is in its dropout window.
    pub fn in_dropout(&self) -> bool {
        self.time_s >= self.dropout_start_s && self.time_s < self.dropout_end_s
    }

    /// Get a new estimate if one is due, stamped with `timestamp_us`.
    pub fn estimate(&mut self, timestamp_us: u64) -> Option<FollowTargetEstimate> {
        if self.time_s + 1e-9 < self.next_estimate_s {
            return None
        }

        while self.next_estimate_s <= self.time_s + 1e-9 {
            self.next_estimate_s += self.estimate_period_s.max(1e-3);
        }

        let mut position_m = [0.0; 3];
        let mut velocity_ms = [0.0; 3];
        let mut acceleration_mss = [0.0; 3];
        position_m.copy_from_slice(self.position_m().as_slice());
        velocity_ms.copy_from_slice(self.velocity_ms().as_slice());
        acceleration_mss.copy_from_slice(self.acceleration_mss().as_slice());

        Some(FollowTargetEstimate {
            timestamp_us,
            valid: !self.in_dropout(),
            position_m,
            velocity_ms,
            acceleration_mss
        })
    }
}

impl VehicleSim {
    pub fn new(params: &SimParams) -> Self {
        Self {
            position_m: Vector3::from(params.vehicle_start_m),
            velocity_ms: Vector3::zeros(),
            yaw_rad: params.vehicle_start_yaw_rad,
            ground_down_m: params.ground_down_m,
            position_gain: params.position_gain,
            max_speed_ms: params.max_speed_ms,
            max_yaw_rate_rads: params.max_yaw_rate_rads
        }
    }

    /// Advance the vehicle by `dt_s` seconds towards the setpoint.
    ///
    /// Axes with a NaN position setpoint are velocity controlled, axes with
    /// neither setpoint finite come to a stop.
    pub fn step(&mut self, setpoint: &Setpoint, dt_s: f64) {
        let mut velocity_ms: Vector3<f64> = Vector3::zeros();

        for i in 0..3 {
            let ff = if setpoint.velocity_ms[i].is_finite() {
                setpoint.velocity_ms[i]
            }
            else {
                0.0
            };

            velocity_ms[i] = if setpoint.position_m[i].is_finite() {
                self.position_gain * (setpoint.position_m[i] - self.position_m[i]) + ff
            }
            else {
                ff
            };
        }

        let speed_ms = velocity_ms.norm();
        if speed_ms > self.max_speed_ms && speed_ms > std::f64::EPSILON {
            velocity_ms *= self.max_speed_ms / speed_ms;
        }

        self.velocity_ms = velocity_ms;
        self.position_m += velocity_ms * dt_s;

        if setpoint.yaw_rad.is_finite() {
            let max_step = self.max_yaw_rate_rads * dt_s;
            let error = get_ang_dist_2pi(self.yaw_rad, setpoint.yaw_rad);

            self.yaw_rad += clamp(&error, &-max_step, &max_step);
        }
    }

    pub fn position_m(&self) -> Vector3<f64> {
        self.position_m
    }

    pub fn velocity_ms(&self) -> Vector3<f64> {
        self.velocity_ms
    }

    /// Get the vehicle state as seen by follow control.
    pub fn state(&self, timestamp_us: u64, dt_s: f64) -> VehicleState {
        VehicleState {
            timestamp_us,
            dt_s,
            position_m: self.position_m,
            yaw_rad: self.yaw_rad,
            dist_to_bottom_m: self.ground_down_m - self.position_m.z
        }
    }
}

impl PerspectiveSchedule {
    pub fn new(changes: &[PerspectiveChange]) -> Self {
        let mut changes = changes.to_vec();
        changes.sort_by(|a, b| a.time_s.partial_cmp(&b.time_s)
            .unwrap_or(std::cmp::Ordering::Equal));

        Self { changes, next: 0 }
    }

    /// Apply all changes due by `time_s`, returning the last one applied.
    pub fn apply(&mut self, time_s: f64, params: &SharedParams) -> Option<PerspectiveChange> {
        let mut applied = None;

        while let Some(change) = self.changes.get(self.next) {
            if change.time_s > time_s {
                break;
            }

            params.modify(|p| p.perspective = change.perspective);
            applied = Some(*change);
            self.next += 1;
        }

        applied
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
