//! # Data Store

use crate::{
    loc::PoseStamped,
    loco_ctrl,
    vel_arb::{self, VelocityCommand},
};
use comms_if::msg::WheelVelsMsg;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Per-cycle data for the control loop.
#[derive(Debug, Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u64,

    /// True if the actuator should be checked for errors this cycle
    pub is_error_check_cycle: bool,

    // Localisation
    /// Latest value of the externally reported localisation flag
    pub loc_initialised: bool,

    /// Last pose received on the bus
    pub bus_pose: Option<PoseStamped>,

    /// Pose passed to the arbiter this cycle
    pub pose: Option<PoseStamped>,

    // VelArb
    pub vel_arb_output: Option<VelocityCommand>,
    pub vel_arb_status_rpt: vel_arb::StatusReport,

    // LocoCtrl
    pub loco_ctrl_input: loco_ctrl::InputData,
    pub loco_ctrl_output: loco_ctrl::WheelDems,
    pub loco_ctrl_status_rpt: loco_ctrl::StatusReport,

    /// True if actuation was suppressed this cycle
    pub gated: bool,

    /// Wheel velocities read back from the actuator
    pub wheel_vels: Option<WheelVelsMsg>,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Total number of cycle overruns
    pub num_cycle_overruns: u64,

    /// Number of times actuator errors have been cleared
    pub num_error_recoveries: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and sets the error check
    /// flag.
    pub fn cycle_start(&mut self, error_check_period_cycles: u64) {
        self.is_error_check_cycle =
            error_check_period_cycles > 0 && self.num_cycles % error_check_period_cycles == 0;

        self.pose = None;
        self.vel_arb_output = None;
        self.vel_arb_status_rpt = vel_arb::StatusReport::default();
        self.loco_ctrl_input = loco_ctrl::InputData::default();
        self.loco_ctrl_output = loco_ctrl::WheelDems::default();
        self.loco_ctrl_status_rpt = loco_ctrl::StatusReport::default();
        self.gated = false;
        self.wheel_vels = None;
    }

    /// Perform actions required at the end of a cycle.
    pub fn cycle_end(&mut self) {
        self.num_cycles += 1;
    }
}
