//! Follow executable entry point.
//!
//! # Architecture
//!
//! The executable runs follow control in closed loop against the simulation:
//!
//!     - Initialise session, logging and parameters
//!     - Activate FollowCtrl from the simulated vehicle's state
//!     - Main loop:
//!         - Apply any scheduled perspective change
//!         - Publish a target estimate if one is due
//!         - FollowCtrl processing
//!         - Step the simulated vehicle and target
//!         - Archive and report the follow status
//!
//! The optional single argument is the duration of the run in seconds.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::{debug, info, warn};
use std::env;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use comms_if::bus;
use follow_lib::{
    follow_ctrl::{
        ActivationData, ConfigProvider, FollowCtrl, Params, Perspective, Setpoint,
        SharedParams
    },
    sim::{parse_duration_s, PerspectiveSchedule, SimParams, TargetSim, VehicleSim}
};
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
    time::seconds_to_micros
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Duration of the run if none is given.
const DEFAULT_DURATION_S: f64 = 60.0;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "follow_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Follow Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let ctrl_params = Params::load("follow_ctrl.toml")
        .wrap_err("Could not load FollowCtrl params")?;

    let sim_params: SimParams = util::params::load("follow_sim.toml")
        .wrap_err("Could not load simulation params")?;

    sim_params.validate()
        .wrap_err("Invalid simulation params")?;

    info!("Exec parameters loaded");

    // ---- PARSE ARGUMENTS ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let duration_s = match args.len() {
        1 => DEFAULT_DURATION_S,
        2 => parse_duration_s(&args[1])
            .wrap_err("Could not parse the CLI arguments")?,
        n => return Err(eyre!(
            "Expected either zero or one argument, found {}", n - 1
        ))
    };

    info!("Running for {:.01} s\n", duration_s);

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let shared_params = SharedParams::new(ctrl_params);
    let (estimate_pub, estimate_sub) = bus::channel();
    let (status_pub, mut status_sub) = bus::channel();

    let mut follow_ctrl = FollowCtrl::new(shared_params.clone(), estimate_sub, status_pub);
    follow_ctrl.init_archive(&session)
        .wrap_err("Failed to initialise the FollowCtrl archive")?;

    let mut target = TargetSim::new(&sim_params);
    let mut vehicle = VehicleSim::new(&sim_params);
    let mut schedule = PerspectiveSchedule::new(&sim_params.perspective_schedule);

    let period_s = sim_params.cycle_period_s;
    let cycles_per_second = ((1.0 / period_s).round() as u64).max(1);

    follow_ctrl.init(ActivationData {
        last_setpoint: Setpoint::default(),
        vehicle: vehicle.state(seconds_to_micros(period_s), period_s)
    }).wrap_err("Failed to activate FollowCtrl")?;

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let mut num_cycles: u64 = 0;

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        let time_s = num_cycles as f64 * period_s;
        if time_s >= duration_s {
            break;
        }

        // Timestamps start one period in so that they are never zero
        let timestamp_us = seconds_to_micros(time_s + period_s);

        // ---- PARAMETER CHANGES ----

        if let Some(change) = schedule.apply(time_s, &shared_params) {
            info!(
                "Switching perspective to {:?}",
                Perspective::from_param(change.perspective)
            );
        }

        // ---- TARGET ESTIMATION ----

        if let Some(estimate) = target.estimate(timestamp_us) {
            if let Err(e) = estimate_pub.publish(estimate) {
                warn!("Could not publish target estimate: {}", e);
            }
        }

        // ---- CONTROL ALGORITHM PROCESSING ----

        let (setpoint, report) = match follow_ctrl.proc(
            &vehicle.state(timestamp_us, period_s)
        ) {
            Ok(o) => o,
            Err(e) => match e {}
        };

        // ---- SIMULATION ----

        vehicle.step(&setpoint, period_s);
        target.step(period_s);

        // ---- WRITE ARCHIVES ----

        if let Err(e) = follow_ctrl.write() {
            warn!("Could not archive FollowCtrl status: {}", e);
        }

        // ---- STATUS ----

        if let Some(status) = status_sub.poll() {
            if num_cycles % cycles_per_second == 0 {
                let separation_m = (vehicle.position_m() - target.position_m()).norm();

                info!(
                    "[{:?}] target at ({:.2}, {:.2}, {:.2}), vehicle {:.2} m away, \
                     follow angle {:.1} deg",
                    report.mode,
                    status.x_est_filtered_m,
                    status.y_est_filtered_m,
                    status.z_est_filtered_m,
                    separation_m,
                    report.follow_angle_deg
                );
            }
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(period_s).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - period_s
            )
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    session.save("follow_ctrl_params.json", &shared_params.params());

    info!("End of execution after {} cycles", num_cycles);

    Ok(())
}
