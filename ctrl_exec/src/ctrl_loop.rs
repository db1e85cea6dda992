//! # Control loop
//!
//! Ties the bus, localisation, arbitration, locomotion control and the
//! actuator together at a fixed rate. Each cycle:
//!
//! - Drain the latest bus messages
//! - Take the latest pose snapshot
//! - Run the velocity arbiter
//! - Decompose the velocity into wheel demands
//! - Forward the demands to the actuator, zeroed while localisation is not initialised
//! - Publish the realised wheel velocities

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{error, info, trace, warn};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use crate::{
    actuator::{self, SharedActuator, WheelSide},
    data_store::DataStore,
    loc::{LocSource, OdomWorker, Pose, PoseHandle, PoseStamped},
    loco_ctrl::{self, LocoCtrl, WheelDems},
    params::CtrlExecParams,
    vel_arb::{self, ArbState, CmdSource, VelArb, VelocityCommand},
};
use comms_if::{bus::Bus, msg::WheelVelsMsg};
use util::{archive::Archiver, module::State};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The fixed rate control loop.
pub struct CtrlLoop {
    params: CtrlExecParams,

    bus: Bus,

    actuator: SharedActuator,

    pose: PoseHandle,

    vel_arb: VelArb,

    loco_ctrl: LocoCtrl,

    odom: Option<OdomWorker>,

    archiver: Option<Archiver>,

    ds: DataStore,
}

/// Summary of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub state: ArbState,

    pub cmd: VelocityCommand,

    /// Demands produced by LocoCtrl, before gating
    pub dems: WheelDems,

    /// True if zero was commanded because localisation is not initialised
    pub gated: bool,

    /// True if actuator errors were found and cleared this cycle
    pub errors_cleared: bool,

    pub wheel_vels: Option<WheelVelsMsg>,
}

/// One row of the control loop archive.
#[derive(Serialize)]
struct ArchiveRow {
    time_s: f64,
    state: ArbState,
    source: CmdSource,
    linear_mps: f64,
    angular_radps: f64,
    left_mps: f64,
    right_mps: f64,
    gated: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Returned by the per-cycle hook of `CtrlLoop::run`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

#[derive(Debug, thiserror::Error)]
pub enum CtrlLoopError {
    #[error("Cycle frequency must be positive and finite, found {0} Hz")]
    InvalidCycleFrequency(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CtrlLoop {
    /// Create a new control loop.
    ///
    /// The bus, actuator and pose handle are shared with whoever else needs
    /// them. With `LocSource::Odometry` the pose handle should be the one
    /// written by the odometry thread.
    pub fn new(
        params: CtrlExecParams,
        bus: Bus,
        actuator: SharedActuator,
        pose: PoseHandle,
        vel_arb: VelArb,
        loco_ctrl: LocoCtrl,
    ) -> Result<Self, CtrlLoopError> {
        if !(params.cycle_frequency_hz.is_finite() && params.cycle_frequency_hz > 0.0) {
            return Err(CtrlLoopError::InvalidCycleFrequency(
                params.cycle_frequency_hz,
            ));
        }

        Ok(Self {
            params,
            bus,
            actuator,
            pose,
            vel_arb,
            loco_ctrl,
            odom: None,
            archiver: None,
            ds: DataStore::default(),
        })
    }

    /// Hand the odometry thread to the loop so it is joined on shutdown.
    pub fn attach_odometry(&mut self, odom: OdomWorker) {
        self.pose = odom.pose_handle();
        self.odom = Some(odom);
    }

    /// Archive one row per cycle into the given archiver.
    pub fn attach_archive(&mut self, archiver: Archiver) {
        self.archiver = Some(archiver);
    }

    pub fn data_store(&self) -> &DataStore {
        &self.ds
    }

    pub fn vel_arb(&self) -> &VelArb {
        &self.vel_arb
    }

    /// Execute a single cycle at time `now_s`.
    ///
    /// Never fails. Actuator and processing errors are logged and the cycle
    /// carries on with a degraded decision.
    pub fn tick(&mut self, now_s: f64) -> TickReport {
        self.ds.cycle_start(self.params.error_check_period_cycles);

        // ---- DATA INPUT ----

        if let Some(msg) = self.bus.loc_init.take() {
            if msg.initialized != self.ds.loc_initialised {
                info!("Localisation initialised: {}", msg.initialized);
            }
            self.ds.loc_initialised = msg.initialized;
        }

        if let Some(msg) = self.bus.robot_pose.take() {
            let seq = self.ds.bus_pose.map(|p| p.seq + 1).unwrap_or(0);
            self.ds.bus_pose = Some(PoseStamped {
                pose: Pose::from(&msg),
                time_s: msg.timestamp,
                seq,
            });
        }

        let path_plan = self.bus.path_plan.take();
        let target_vel = self.bus.target_vel.take();

        // ---- LOCALISATION ----

        let stamped = match self.params.loc_source {
            LocSource::Odometry => self.pose.get(),
            LocSource::Bus => self.ds.bus_pose,
        };
        let staleness = self.params.pose_staleness_s;
        self.ds.pose = stamped.filter(|p| now_s - p.time_s <= staleness);

        // ---- VELOCITY ARBITRATION ----

        let arb_input = vel_arb::InputData {
            time_s: now_s,
            path_plan,
            target_vel,
            pose: self.ds.pose.map(|p| p.pose),
        };

        let cmd = match self.vel_arb.proc(&arb_input) {
            Ok((cmd, rpt)) => {
                self.ds.vel_arb_status_rpt = rpt;
                cmd
            }
            Err(e) => {
                warn!("Error during VelArb processing: {}", e);
                VelocityCommand::zero(now_s)
            }
        };
        self.ds.vel_arb_output = Some(cmd);

        // ---- LOCOMOTION CONTROL ----

        self.ds.loco_ctrl_input = loco_ctrl::InputData {
            linear_mps: cmd.linear_mps,
            angular_radps: cmd.angular_radps,
        };

        self.ds.loco_ctrl_output = match self.loco_ctrl.proc(&self.ds.loco_ctrl_input) {
            Ok((o, r)) => {
                self.ds.loco_ctrl_status_rpt = r;
                o
            }
            Err(e) => {
                warn!("Error during LocoCtrl processing: {}", e);
                self.loco_ctrl.make_safe()
            }
        };

        // Suppress actuation until localisation is initialised
        self.ds.gated = !self.ds.loc_initialised;
        let demands = if self.ds.gated {
            WheelDems::default()
        } else {
            self.ds.loco_ctrl_output
        };

        // ---- ACTUATION ----

        let errors_cleared = self.actuate(demands, now_s);

        if errors_cleared {
            self.ds.num_error_recoveries += 1;
            self.pose.request_recalibration();
        }

        if let Some(msg) = self.ds.wheel_vels {
            self.bus.wheel_vels.publish(msg);
        }

        // ---- WRITE ARCHIVES ----

        if let Some(ref mut archiver) = self.archiver {
            let row = ArchiveRow {
                time_s: now_s,
                state: self.ds.vel_arb_status_rpt.state,
                source: cmd.source,
                linear_mps: cmd.linear_mps,
                angular_radps: cmd.angular_radps,
                left_mps: demands.left_mps,
                right_mps: demands.right_mps,
                gated: self.ds.gated,
            };
            if let Err(e) = archiver.serialise(row) {
                warn!("Could not write control loop archive: {}", e);
            }
        }

        trace!(
            "Cycle {}: {:?}, demands ({:.4}, {:.4}) m/s{}",
            self.ds.num_cycles,
            self.ds.vel_arb_status_rpt.state,
            demands.left_mps,
            demands.right_mps,
            if self.ds.gated { " (gated)" } else { "" }
        );

        self.ds.cycle_end();

        TickReport {
            state: self.ds.vel_arb_status_rpt.state,
            cmd,
            dems: self.ds.loco_ctrl_output,
            gated: self.ds.gated,
            errors_cleared,
            wheel_vels: self.ds.wheel_vels,
        }
    }

    /// Run cycles at the configured frequency until `pre_cycle` returns
    /// `LoopControl::Stop`.
    ///
    /// `pre_cycle` is called at the start of every cycle with the bus and the
    /// cycle time, so inputs can be fed in before the cycle executes. An
    /// overrunning cycle is followed immediately by the next one.
    pub fn run<F>(&mut self, mut pre_cycle: F)
    where
        F: FnMut(&Bus, f64) -> LoopControl,
    {
        let cycle_period = Duration::from_secs_f64(self.params.cycle_period_s());

        info!(
            "Begining control loop at {:.1} Hz",
            self.params.cycle_frequency_hz
        );

        loop {
            // Get cycle start time
            let cycle_start_instant = Instant::now();
            let now_s = util::time::now_unix_s();

            if pre_cycle(&self.bus, now_s) == LoopControl::Stop {
                break;
            }

            self.tick(now_s);

            // ---- CYCLE MANAGEMENT ----

            let cycle_dur = cycle_start_instant.elapsed();

            match cycle_period.checked_sub(cycle_dur) {
                Some(d) => {
                    self.ds.num_consec_cycle_overruns = 0;
                    thread::sleep(d);
                }
                None => {
                    warn!(
                        "Cycle overran by {:.06} s",
                        cycle_dur.as_secs_f64() - cycle_period.as_secs_f64()
                    );
                    self.ds.num_consec_cycle_overruns += 1;
                    self.ds.num_cycle_overruns += 1;

                    if self.ds.num_consec_cycle_overruns == self.params.overrun_error_limit {
                        error!(
                            "{} consecutive cycle overruns, the loop cannot keep up",
                            self.ds.num_consec_cycle_overruns
                        );
                    }
                }
            }
        }

        info!(
            "Control loop stopped after {} cycles ({} overruns)",
            self.ds.num_cycles, self.ds.num_cycle_overruns
        );
    }

    /// Stop both wheels and join the odometry thread.
    pub fn shutdown(&mut self) {
        self.loco_ctrl.make_safe();

        {
            let mut act = actuator::lock(&self.actuator);
            for &side in WheelSide::BOTH.iter() {
                if let Err(e) = act.stop(side) {
                    error!("Could not stop the {} wheel: {}", side, e);
                }
            }
        }

        if let Some(odom) = self.odom.take() {
            odom.stop();
        }

        info!("Control loop shut down");
    }

    /// Send demands to the actuator and read back the realised velocities.
    ///
    /// Returns true if actuator errors were found and cleared.
    fn actuate(&mut self, demands: WheelDems, now_s: f64) -> bool {
        let mut act = actuator::lock(&self.actuator);

        for &(side, dem) in [
            (WheelSide::Left, demands.left_mps),
            (WheelSide::Right, demands.right_mps),
        ]
        .iter()
        {
            if let Err(e) = act.set_wheel_velocity(side, dem) {
                warn!("Could not set the {} wheel velocity: {}", side, e);
            }
        }

        self.ds.wheel_vels = match (
            act.get_wheel_velocity(WheelSide::Left),
            act.get_wheel_velocity(WheelSide::Right),
        ) {
            (Ok(left), Ok(right)) => Some(WheelVelsMsg {
                timestamp: now_s,
                left_vel_mps: left,
                right_vel_mps: right,
            }),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Could not read the wheel velocities: {}", e);
                None
            }
        };

        if !self.ds.is_error_check_cycle {
            return false;
        }

        match act.has_errors() {
            Ok(true) => {
                warn!("Actuator reported errors, clearing them");
                for &side in WheelSide::BOTH.iter() {
                    if let Err(e) = act.clear_errors(side) {
                        warn!("Could not clear {} wheel errors: {}", side, e);
                    }
                }
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("Could not check the actuator for errors: {}", e);
                false
            }
        }
    }
}

impl Drop for CtrlLoop {
    fn drop(&mut self) {
        if self.odom.is_some() {
            self.shutdown();
        }
    }
}
