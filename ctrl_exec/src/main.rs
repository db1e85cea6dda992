//! Main control executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Start the odometry thread
//!     - Main loop:
//!         - Scripted input replay onto the bus
//!         - Pose acquisition
//!         - Velocity arbitration
//!         - Locomotion control processing
//!         - Actuator demands and telemetry
//!     - Stop the wheels and join the odometry thread
//!
//! # Modules
//!
//! All cyclic modules (e.g. `loco_ctrl`) shall provide a public struct implementing the
//! `util::module::State` trait.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

#[cfg(feature = "sim")]
use ctrl_lib::actuator::SimActuator;
use ctrl_lib::{
    actuator::SharedActuator,
    ctrl_loop::{CtrlLoop, LoopControl},
    loc::{LocParams, LocSource, OdomWorker, PoseEstimator, PoseHandle},
    loco_ctrl::{self, LocoCtrl},
    params::{self, CtrlExecParams},
    path_follow::{LookaheadCtrl, PathFollowParams, PathFollower},
    vel_arb::{self, VelArb},
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, warn};
use std::path::PathBuf;
use structopt::StructOpt;

// Internal
use comms_if::bus::Bus;
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingMsgs, ScriptInterpreter},
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Differential drive control executable
#[derive(Debug, StructOpt)]
#[structopt(name = "ctrl_exec")]
struct Opts {
    /// Drive the simulated actuator
    #[structopt(long)]
    sim: bool,

    /// Replay a script of bus messages
    #[structopt(long, parse(from_os_str))]
    script: Option<PathBuf>,

    /// Stop after this many seconds
    #[structopt(long)]
    max_duration_s: Option<f64>,

    /// Log every cycle into the session log file
    #[structopt(long)]
    trace: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("ctrl_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = if opts.trace {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Differential Drive Control Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", opts);

    // ---- LOAD PARAMETERS ----

    let exec_params: CtrlExecParams = util::params::load_or_default("ctrl_exec.toml")
        .wrap_err("Could not load exec params")?;
    let loc_params: LocParams =
        util::params::load_or_default("loc.toml").wrap_err("Could not load loc params")?;
    let vel_arb_params: vel_arb::Params = util::params::load_or_default("vel_arb.toml")
        .wrap_err("Could not load vel_arb params")?;
    let loco_ctrl_params: loco_ctrl::Params = util::params::load_or_default("loco_ctrl.toml")
        .wrap_err("Could not load loco_ctrl params")?;
    let path_follow_params: PathFollowParams = util::params::load_or_default("path_follow.toml")
        .wrap_err("Could not load path_follow params")?;

    params::check_wheel_base(&loc_params, &loco_ctrl_params)
        .wrap_err("Inconsistent robot geometry")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE SCRIPT ----

    let mut script = match opts.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            let si = ScriptInterpreter::new(path).wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} messages\n",
                si.get_duration(),
                si.get_num_msgs()
            );

            Some(si)
        }
        None => {
            warn!("No script provided, nothing will publish inputs and the robot will idle\n");
            None
        }
    };

    // ---- INITIALISE ACTUATOR ----

    let actuator = init_actuator(&opts, &loc_params)?;

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let estimator = PoseEstimator::new(loc_params).wrap_err("Failed to initialise localisation")?;
    info!("PoseEstimator init complete");

    let cmd_staleness_s = vel_arb_params.cmd_staleness_s;
    let follower: Box<dyn PathFollower + Send> = Box::new(LookaheadCtrl::new(path_follow_params));
    let vel_arb =
        VelArb::init((vel_arb_params, follower)).wrap_err("Failed to initialise VelArb")?;
    info!("VelArb init complete");

    let loco_ctrl = LocoCtrl::init(loco_ctrl_params).wrap_err("Failed to initialise LocoCtrl")?;
    info!("LocoCtrl init complete");

    let mut ctrl_loop = CtrlLoop::new(
        exec_params.clone(),
        Bus::new(),
        actuator.clone(),
        PoseHandle::new(),
        vel_arb,
        loco_ctrl,
    )
    .wrap_err("Failed to initialise the control loop")?;

    match exec_params.loc_source {
        LocSource::Odometry => {
            ctrl_loop.attach_odometry(OdomWorker::start(
                estimator,
                actuator,
                exec_params.odom_period_s,
            ));
        }
        LocSource::Bus => info!("Poses will be taken from the bus, odometry is disabled"),
    }

    if exec_params.archive {
        let archiver = Archiver::from_path(&session, "ctrl_loop.csv")
            .wrap_err("Failed to create the control loop archive")?;
        ctrl_loop.attach_archive(archiver);
    }

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    let start_s = util::time::now_unix_s();
    let mut script_end_s: Option<f64> = None;

    ctrl_loop.run(|bus, now_s| {
        let elapsed_s = now_s - start_s;

        if let Some(max_s) = opts.max_duration_s {
            if elapsed_s >= max_s {
                info!("Maximum duration of {:.02} s reached, stopping", max_s);
                return LoopControl::Stop;
            }
        }

        if let Some(ref mut si) = script {
            match si.get_pending(elapsed_s) {
                PendingMsgs::None => (),
                PendingMsgs::Some(msgs) => {
                    for msg in msgs {
                        if let Err(e) = bus.publish_stamped(msg.topic, msg.payload, now_s) {
                            warn!("Scripted {} message rejected: {}", msg.topic, e);
                        }
                    }
                }
                // Run on long enough for the robot to come to a stop
                PendingMsgs::EndOfScript => {
                    let end_s = *script_end_s.get_or_insert_with(|| {
                        info!("End of script reached");
                        elapsed_s
                    });
                    if elapsed_s - end_s >= cmd_staleness_s {
                        info!("Stopping");
                        return LoopControl::Stop;
                    }
                }
            }
        }

        LoopControl::Continue
    });

    // ---- SHUTDOWN ----

    ctrl_loop.shutdown();

    info!("End of execution");

    Ok(())
}

/// Create the actuator selected on the command line.
#[cfg(feature = "sim")]
fn init_actuator(opts: &Opts, loc_params: &LocParams) -> Result<SharedActuator, Report> {
    if !opts.sim {
        return Err(eyre!(
            "No hardware actuator driver is available, run with --sim to use the simulator"
        ));
    }

    info!("Using the simulated actuator");

    Ok(std::sync::Arc::new(std::sync::Mutex::new(SimActuator::new(
        loc_params.wheel_diameter_m,
    ))))
}

#[cfg(not(feature = "sim"))]
fn init_actuator(_opts: &Opts, _loc_params: &LocParams) -> Result<SharedActuator, Report> {
    Err(eyre!(
        "Built without the sim feature and no hardware actuator driver is available"
    ))
}
