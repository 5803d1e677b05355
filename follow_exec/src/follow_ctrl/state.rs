//! Follow control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use nalgebra::{Rotation2, Vector2, Vector3};
use serde::Serialize;
use std::convert::{Infallible, TryFrom};

// Internal
use super::*;
use crate::alpha_filter::AlphaFilter;
use comms_if::{
    bus::{Publication, Subscription},
    topics::{FollowTargetEstimate, FollowTargetStatus}
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    maths::{all_finite, unit_or_zero},
    module::State,
    session::{self, Session}
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Follow control module state.
///
/// `C` provides the parameters, which are re-read every cycle.
pub struct FollowCtrl<C> {
    config: C,

    estimate_sub: Subscription<FollowTargetEstimate>,
    status_pub: Publication<FollowTargetStatus>,

    /// The most recent target estimate received.
    pub(crate) estimate: FollowTargetEstimate,

    /// Follow angle setting, before filtering. This is not wrapped into
    /// [0, 360) so that the filter can always take the short way round.
    ///
    /// Units: degrees
    pub(crate) follow_angle_deg: f64,
    pub(crate) follow_angle_filtered: AlphaFilter<f64>,

    /// Filtered target position, NaN until the first fresh estimate.
    pub(crate) target_position_filtered: AlphaFilter<Vector3<f64>>,

    /// Filtered direction from the target to the vehicle.
    pub(crate) offset_vector_filtered: AlphaFilter<Vector2<f64>>,

    /// Velocity feed-forward ramp in [0, 1].
    pub(crate) velocity_ff_scale: AlphaFilter<f64>,

    /// Last known horizontal direction of travel of the target.
    pub(crate) target_velocity_unit_vector: Vector2<f64>,

    pub(crate) setpoint: Setpoint,
    pub(crate) report: StatusReport,

    /// Mode of the previous cycle, `None` straight after activation.
    prev_mode: Option<FollowMode>,

    prev_perspective: Option<Perspective>,

    /// True while the emergency ascent is active.
    ascending: bool,

    /// Last unknown selector codes which were warned about.
    bad_perspective_code: Option<i32>,
    bad_alt_mode_code: Option<i32>,

    arch: Archiver
}

/// Setpoints for the position controller.
///
/// A NaN component means that axis is not controlled by position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Setpoint {
    /// Units: meters,
    /// Frame: NED
    pub position_m: Vector3<f64>,

    /// Units: meters/second,
    /// Frame: NED
    pub velocity_ms: Vector3<f64>,

    /// Units: radians
    pub yaw_rad: f64,

    /// Units: radians/second
    pub yawspeed_rads: f64
}

/// Vehicle state, input to each cycle of FollowCtrl.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VehicleState {
    /// Time of this cycle.
    ///
    /// Units: microseconds
    pub timestamp_us: u64,

    /// Time since the previous cycle.
    ///
    /// Units: seconds
    pub dt_s: f64,

    /// Current vehicle position.
    ///
    /// Units: meters,
    /// Frame: NED
    pub position_m: Vector3<f64>,

    /// Current vehicle heading.
    ///
    /// Units: radians
    pub yaw_rad: f64,

    /// Distance to the ground below the vehicle, non-finite if unknown.
    ///
    /// Units: meters
    pub dist_to_bottom_m: f64
}

/// Data needed to activate FollowCtrl.
#[derive(Debug, Clone, Copy)]
pub struct ActivationData {
    /// The setpoint which was being flown before follow mode was entered.
    pub last_setpoint: Setpoint,

    /// The vehicle's state at activation.
    pub vehicle: VehicleState
}

/// The status report containing the decoded settings and the branches taken
/// in the last cycle.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct StatusReport {
    pub mode: FollowMode,

    pub perspective: Perspective,

    pub alt_mode: AltitudeMode,

    /// Filtered follow angle.
    ///
    /// Units: degrees
    pub follow_angle_deg: f64,

    /// Current velocity feed-forward scale.
    pub velocity_ff_scale: f64,

    /// True if horizontal control was suspended to correct the altitude.
    pub alt_first: bool,

    /// True if the emergency ascent overrode the setpoints.
    pub emergency_ascent: bool,

    /// True if the yaw setpoint was updated to face the target.
    pub yaw_control: bool
}

/// The two behaviours of FollowCtrl, chosen every cycle from the freshness
/// of the target estimate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum FollowMode {
    /// No usable estimate, hold the horizontal position.
    Holding,

    /// Following the target.
    Tracking
}

/// A flat record of one cycle for the CSV archive.
#[derive(Debug, Serialize)]
struct ArchRecord {
    time_s: f64,
    estimate_timestamp_us: u64,
    mode: FollowMode,
    perspective: Perspective,
    target_x_m: f64,
    target_y_m: f64,
    target_z_m: f64,
    pos_sp_x_m: f64,
    pos_sp_y_m: f64,
    pos_sp_z_m: f64,
    vel_sp_x_ms: f64,
    vel_sp_y_ms: f64,
    vel_sp_z_ms: f64,
    yaw_sp_rad: f64,
    follow_angle_deg: f64,
    velocity_ff_scale: f64,
    alt_first: bool,
    emergency_ascent: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Setpoint {
    /// No control on any axis.
    fn default() -> Self {
        Self {
            position_m: Vector3::repeat(std::f64::NAN),
            velocity_ms: Vector3::repeat(std::f64::NAN),
            yaw_rad: std::f64::NAN,
            yawspeed_rads: std::f64::NAN
        }
    }
}

impl Default for StatusReport {
    fn default() -> Self {
        Self {
            mode: FollowMode::Holding,
            perspective: Perspective::Behind,
            alt_mode: AltitudeMode::Constant,
            follow_angle_deg: 0.0,
            velocity_ff_scale: 0.0,
            alt_first: false,
            emergency_ascent: false,
            yaw_control: false
        }
    }
}

impl<C: ConfigProvider> State for FollowCtrl<C> {
    type InitData = ActivationData;
    type InitError = Infallible;

    type InputData = VehicleState;
    type OutputData = Setpoint;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// Activate follow control.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        self.activate(&init_data.last_setpoint, &init_data.vehicle);
        Ok(())
    }

    /// Perform one cycle of follow control. Never fails.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        Ok(self.update(input_data))
    }
}

impl<C> Archived for FollowCtrl<C> {
    fn write(&mut self) -> Result<(), ArchiveError> {
        // Archiving is optional
        if !self.arch.is_init() {
            return Ok(())
        }

        let target = self.target_position_filtered.state();

        self.arch.serialise(ArchRecord {
            time_s: session::get_elapsed_seconds(),
            estimate_timestamp_us: self.estimate.timestamp_us,
            mode: self.report.mode,
            perspective: self.report.perspective,
            target_x_m: target.x,
            target_y_m: target.y,
            target_z_m: target.z,
            pos_sp_x_m: self.setpoint.position_m.x,
            pos_sp_y_m: self.setpoint.position_m.y,
            pos_sp_z_m: self.setpoint.position_m.z,
            vel_sp_x_ms: self.setpoint.velocity_ms.x,
            vel_sp_y_ms: self.setpoint.velocity_ms.y,
            vel_sp_z_ms: self.setpoint.velocity_ms.z,
            yaw_sp_rad: self.setpoint.yaw_rad,
            follow_angle_deg: self.report.follow_angle_deg,
            velocity_ff_scale: self.report.velocity_ff_scale,
            alt_first: self.report.alt_first,
            emergency_ascent: self.report.emergency_ascent
        })
    }
}

impl<C: ConfigProvider> FollowCtrl<C> {
    /// Create a new instance of FollowCtrl.
    ///
    /// The controller must be activated before it is first updated.
    pub fn new(
        config: C,
        estimate_sub: Subscription<FollowTargetEstimate>,
        status_pub: Publication<FollowTargetStatus>
    ) -> Self {
        Self {
            config,
            estimate_sub,
            status_pub,
            estimate: FollowTargetEstimate::default(),
            follow_angle_deg: 0.0,
            follow_angle_filtered: AlphaFilter::new(0.0),
            target_position_filtered: AlphaFilter::new(Vector3::repeat(std::f64::NAN)),
            offset_vector_filtered: AlphaFilter::new(Vector2::new(1.0, 0.0)),
            velocity_ff_scale: AlphaFilter::new(0.0),
            target_velocity_unit_vector: Vector2::zeros(),
            setpoint: Setpoint::default(),
            report: StatusReport::default(),
            prev_mode: None,
            prev_perspective: None,
            ascending: false,
            bad_perspective_code: None,
            bad_alt_mode_code: None,
            arch: Archiver::default()
        }
    }

    /// Start archiving each cycle into the session's archive directory.
    pub fn init_archive(&mut self, session: &Session) -> Result<(), FollowCtrlError> {
        self.arch = Archiver::from_path(session, "follow_ctrl/status.csv")
            .map_err(FollowCtrlError::ArchiveInitError)?;

        Ok(())
    }

    /// Activate follow control, resetting all filters.
    ///
    /// The position setpoint starts at the vehicle's current position, and
    /// the offset direction starts along the vehicle's heading so that the
    /// vehicle isn't flung around before the target's heading is known.
    pub fn activate(&mut self, last_setpoint: &Setpoint, vehicle: &VehicleState) {
        self.setpoint.position_m = vehicle.position_m;
        self.setpoint.velocity_ms = Vector3::zeros();
        self.setpoint.yaw_rad = if last_setpoint.yaw_rad.is_finite() {
            last_setpoint.yaw_rad
        }
        else {
            vehicle.yaw_rad
        };
        self.setpoint.yawspeed_rads = 0.0;

        self.target_position_filtered.reset(Vector3::repeat(std::f64::NAN));

        let heading = Vector2::new(vehicle.yaw_rad.cos(), vehicle.yaw_rad.sin());
        if all_finite(&heading) {
            self.offset_vector_filtered.reset(heading);
        }
        else {
            self.offset_vector_filtered.reset(Vector2::new(1.0, 0.0));
        }

        self.follow_angle_deg = 0.0;
        self.follow_angle_filtered.reset(0.0);
        self.velocity_ff_scale.reset(0.0);
        self.target_velocity_unit_vector = Vector2::zeros();

        self.report = StatusReport::default();
        self.prev_mode = None;
        self.prev_perspective = None;
        self.ascending = false;

        info!(
            "FollowCtrl activated at {:?}, yaw {:.3} rad",
            vehicle.position_m.as_slice(),
            self.setpoint.yaw_rad
        );
    }

    /// Process follow control for one cycle.
    ///
    /// Processing involves:
    ///  1. Reading the parameters and polling for a new target estimate.
    ///  1. If the estimate is fresh, tracking the target, otherwise holding
    ///     the horizontal position.
    ///  1. Publishing the follow status.
    pub fn update(&mut self, input: &VehicleState) -> (Setpoint, StatusReport) {
        let params = self.config.params();
        let perspective = self.decode_perspective(params.perspective);
        let alt_mode = self.decode_alt_mode(params.alt_mode);

        self.report = StatusReport {
            perspective,
            alt_mode,
            ..StatusReport::default()
        };

        if let Some(estimate) = self.estimate_sub.poll() {
            self.estimate = estimate;
        }

        let mode = if self.estimate.is_fresh() {
            self.mode_tracking(input, &params, perspective, alt_mode);
            FollowMode::Tracking
        }
        else {
            self.mode_holding();
            FollowMode::Holding
        };

        if self.prev_mode != Some(mode) {
            match mode {
                FollowMode::Tracking => info!("Target estimate available, tracking target"),
                FollowMode::Holding => info!("No fresh target estimate, holding position")
            }
        }
        self.prev_mode = Some(mode);

        self.report.mode = mode;
        self.report.follow_angle_deg = self.follow_angle_filtered.state();
        self.report.velocity_ff_scale = self.velocity_ff_scale.state();

        self.publish_status(input.timestamp_us);

        trace!(
            "FollowCtrl output:\n    pos: {:?}\n    vel: {:?}\n    yaw: {:.3}",
            self.setpoint.position_m.as_slice(),
            self.setpoint.velocity_ms.as_slice(),
            self.setpoint.yaw_rad
        );

        (self.setpoint, self.report)
    }

    /// Filtered target position, NaN if the target has not been seen yet.
    pub fn target_position_filtered(&self) -> Vector3<f64> {
        self.target_position_filtered.state()
    }

    /// Filtered follow angle in degrees.
    pub fn follow_angle_filtered_deg(&self) -> f64 {
        self.follow_angle_filtered.state()
    }

    /// The setpoint produced by the last cycle.
    pub fn setpoint(&self) -> &Setpoint {
        &self.setpoint
    }

    /// Mode holding position.
    ///
    /// Horizontal position control is released and the horizontal velocity
    /// zeroed, so the vehicle brakes and then stays where it is. The altitude
    /// setpoint is left untouched.
    fn mode_holding(&mut self) {
        self.setpoint.position_m.x = std::f64::NAN;
        self.setpoint.position_m.y = std::f64::NAN;
        self.setpoint.velocity_ms.x = 0.0;
        self.setpoint.velocity_ms.y = 0.0;
        self.ascending = false;
    }

    /// Mode tracking the target.
    fn mode_tracking(
        &mut self,
        input: &VehicleState,
        params: &Params,
        perspective: Perspective,
        alt_mode: AltitudeMode
    ) {
        let dt_s = input.dt_s;
        let position_m = Vector3::from(self.estimate.position_m);
        let velocity_ms = Vector3::from(self.estimate.velocity_ms);
        let acceleration_mss = Vector3::from(self.estimate.acceleration_mss);

        // ---- TARGET POSITION ----

        // Start the filter from the first estimate rather than from zero
        if !all_finite(&self.target_position_filtered.state()) && all_finite(&position_m) {
            self.target_position_filtered.reset(position_m);
        }

        // Feed the filter with a prediction one time constant ahead, which
        // cancels most of the lag for a target moving at constant velocity.
        let predicted_m = predict_target_position(
            POSITION_FILTER_TC_S, &position_m, &velocity_ms, &acceleration_mss);

        if all_finite(&predicted_m) {
            self.target_position_filtered.set_parameters(dt_s, POSITION_FILTER_TC_S);
            self.target_position_filtered.update(predicted_m);
        }

        // ---- OFFSET DIRECTION ----

        match perspective.angle_deg() {
            // Switching to or from no perspective jumps the setpoint
            None => self.offset_vector_filtered.reset(Vector2::zeros()),
            Some(angle_deg) => self.update_offset(dt_s, angle_deg, &velocity_ms)
        }

        // ---- DESIRED POSITION ----

        let target_m = self.target_position_filtered.state();
        let offset_m = unit_or_zero(&self.offset_vector_filtered.state())
            * params.follow_distance_m.max(MIN_FOLLOW_DISTANCE_M);

        let desired_z_m = match alt_mode {
            AltitudeMode::TrackTarget => target_m.z - params.min_follow_height_m,
            // Keep the current altitude setpoint unless it's below the
            // minimum height. `f64::min` ignores a NaN setpoint.
            AltitudeMode::Constant => self.setpoint.position_m.z
                .min(-params.min_follow_height_m)
        };

        let desired_m = Vector3::new(
            target_m.x + offset_m.x,
            target_m.y + offset_m.y,
            desired_z_m
        );

        // ---- POSITION AND VELOCITY SETPOINTS ----

        let desired_finite = all_finite(&desired_m);

        // Only control horizontally once at the right altitude
        let within_alt_band = desired_finite
            && (desired_m.z - input.position_m.z).abs() < ALT_ACCEPTANCE_THRESHOLD_M;

        if within_alt_band {
            let prev_position_m = self.setpoint.position_m;

            self.setpoint.velocity_ms = if all_finite(&prev_position_m) && dt_s > 0.0 {
                (desired_m - prev_position_m) / dt_s * self.velocity_ff_scale.state()
            }
            else {
                Vector3::zeros()
            };
            self.setpoint.position_m = desired_m;
        }
        else if desired_finite {
            self.setpoint.position_m = Vector3::new(
                input.position_m.x,
                input.position_m.y,
                desired_m.z
            );
            self.setpoint.velocity_ms = Vector3::zeros();
            self.report.alt_first = true;
        }
        else {
            self.setpoint.position_m = input.position_m;
            self.setpoint.velocity_ms = Vector3::zeros();
        }

        // Ramp the feed-forward after using it, so a jump in the desired
        // position never reaches the velocity setpoint on the cycle it occurs.
        // Outside the band the position setpoint is off the desired track and
        // the ramp starts again from zero.
        if within_alt_band {
            // No feed-forward while the target is static
            let ff_target = if velocity_ms.norm() >= MIN_SPEED_FOR_HEADING_CHANGE_MS {
                1.0
            }
            else {
                0.0
            };
            self.velocity_ff_scale.set_parameters(dt_s, VELOCITY_FF_FILTER_TC_S);
            self.velocity_ff_scale.update(ff_target);
        }
        else {
            self.velocity_ff_scale.reset(0.0);
        }

        // ---- GROUND CLEARANCE ----

        if input.dist_to_bottom_m.is_finite()
            && input.dist_to_bottom_m < MIN_SAFETY_ALTITUDE_M
        {
            self.setpoint.position_m = Vector3::new(
                std::f64::NAN,
                std::f64::NAN,
                input.position_m.z
            );
            self.setpoint.velocity_ms = Vector3::new(0.0, 0.0, -EMERGENCY_ASCENT_SPEED_MS);
            self.report.emergency_ascent = true;

            if !self.ascending {
                warn!(
                    "Only {:.2} m above ground, ascending at {} m/s",
                    input.dist_to_bottom_m,
                    EMERGENCY_ASCENT_SPEED_MS
                );
            }
        }
        else if self.ascending {
            info!("Ground clearance recovered");
        }
        self.ascending = self.report.emergency_ascent;

        // ---- YAW ----

        // Face the target, unless it's (almost) directly below
        let target_to_vehicle_m = Vector2::new(
            input.position_m.x - target_m.x,
            input.position_m.y - target_m.y
        );

        if target_to_vehicle_m.norm() >= MIN_DIST_FOR_YAW_CONTROL_M {
            self.setpoint.yaw_rad = (-target_to_vehicle_m.y).atan2(-target_to_vehicle_m.x);
            self.report.yaw_control = true;
        }
    }

    /// Update the follow angle and the offset direction filters.
    fn update_offset(&mut self, dt_s: f64, angle_deg: f64, velocity_ms: &Vector3<f64>) {
        self.follow_angle_deg = unwrap_follow_angle(self.follow_angle_deg, angle_deg);

        self.follow_angle_filtered.set_parameters(dt_s, FOLLOW_ANGLE_FILTER_TC_S);
        self.follow_angle_filtered.update(self.follow_angle_deg);

        // Keep the magnitudes bounded, this doesn't change the direction
        let filtered_deg = self.follow_angle_filtered.state();
        if filtered_deg > 360.0 {
            self.follow_angle_filtered.reset(filtered_deg - 360.0);
            self.follow_angle_deg -= 360.0;
        }
        else if filtered_deg < -360.0 {
            self.follow_angle_filtered.reset(filtered_deg + 360.0);
            self.follow_angle_deg += 360.0;
        }

        // The target's direction of travel is taken as its heading
        let velocity_xy_ms = Vector2::new(velocity_ms.x, velocity_ms.y);
        let speed_xy_ms = velocity_xy_ms.norm();

        if speed_xy_ms > MIN_SPEED_FOR_HEADING_CHANGE_MS && speed_xy_ms > std::f64::EPSILON {
            self.target_velocity_unit_vector = unit_or_zero(&velocity_xy_ms);
        }

        let rotation = Rotation2::new(self.follow_angle_filtered.state().to_radians());
        let offset = rotation * self.target_velocity_unit_vector;

        if all_finite(&offset) {
            self.offset_vector_filtered.set_parameters(dt_s, DIRECTION_FILTER_TC_S);
            self.offset_vector_filtered.update(offset);
        }
    }

    /// Decode the perspective selector, warning once per unknown code.
    fn decode_perspective(&mut self, code: i32) -> Perspective {
        let perspective = match Perspective::try_from(code) {
            Ok(p) => {
                self.bad_perspective_code = None;
                p
            },
            Err(e) => {
                if self.bad_perspective_code != Some(code) {
                    warn!("{}, following from behind", e);
                    self.bad_perspective_code = Some(code);
                }
                Perspective::Behind
            }
        };

        if self.prev_perspective != Some(perspective) {
            debug!("Follow perspective set to {:?}", perspective);
            self.prev_perspective = Some(perspective);
        }

        perspective
    }

    /// Decode the altitude mode selector, warning once per unknown code.
    fn decode_alt_mode(&mut self, code: i32) -> AltitudeMode {
        match AltitudeMode::try_from(code) {
            Ok(m) => {
                self.bad_alt_mode_code = None;
                m
            },
            Err(e) => {
                if self.bad_alt_mode_code != Some(code) {
                    warn!("{}, using constant altitude", e);
                    self.bad_alt_mode_code = Some(code);
                }
                AltitudeMode::Constant
            }
        }
    }

    /// Publish the follow status. Dropped messages are not an error.
    fn publish_status(&self, timestamp_us: u64) {
        let target_m = self.target_position_filtered.state();

        let status = FollowTargetStatus {
            timestamp_us,
            x_est_filtered_m: target_m.x,
            y_est_filtered_m: target_m.y,
            z_est_filtered_m: target_m.z
        };

        if let Err(e) = self.status_pub.publish(status) {
            trace!("Follow status not published: {}", e);
        }
    }
}
