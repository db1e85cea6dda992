//! Implementations for the LocoCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;

// Internal
use super::{LocoCtrlError, Params};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Locomotion control module state
#[derive(Debug, Clone)]
pub struct LocoCtrl {
    pub(crate) params: Params,

    pub(crate) report: StatusReport,

    pub(crate) output: Option<WheelDems>,
}

/// Input data to Locomotion Control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Units: meters/second
    pub linear_mps: f64,

    /// Units: radians/second, positive turns left
    pub angular_radps: f64,
}

/// Wheel velocity demands, the output of LocoCtrl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WheelDems {
    /// Units: meters/second
    pub left_mps: f64,

    /// Units: meters/second
    pub right_mps: f64,
}

/// Status report for LocoCtrl processing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusReport {
    pub left_limited: bool,
    pub right_limited: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for LocoCtrl {
    type InitData = Params;
    type InitError = LocoCtrlError;

    type InputData = InputData;
    type OutputData = WheelDems;
    type StatusReport = StatusReport;
    type ProcError = LocoCtrlError;

    /// Initialise the LocoCtrl module from its parameters.
    fn init(params: Self::InitData) -> Result<Self, Self::InitError> {
        if !(params.wheel_base_m.is_finite() && params.wheel_base_m > 0.0) {
            return Err(LocoCtrlError::InvalidWheelBase(params.wheel_base_m));
        }
        if !(params.max_wheel_speed_mps.is_finite() && params.max_wheel_speed_mps > 0.0) {
            return Err(LocoCtrlError::InvalidMaxWheelSpeed(params.max_wheel_speed_mps));
        }

        Ok(Self {
            params,
            report: StatusReport::default(),
            output: None,
        })
    }

    /// Perform cyclic processing of Locomotion Control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Clear the status report
        self.report = StatusReport::default();

        if !(input_data.linear_mps.is_finite() && input_data.angular_radps.is_finite()) {
            return Err(LocoCtrlError::InvalidCmd(
                input_data.linear_mps,
                input_data.angular_radps,
            ));
        }

        let target = self.calc_skid_steer(input_data.linear_mps, input_data.angular_radps);
        let output = self.enforce_limits(target);

        trace!(
            "LocoCtrl output: left {:.4} m/s, right {:.4} m/s",
            output.left_mps,
            output.right_mps
        );

        self.output = Some(output);

        Ok((output, self.report))
    }
}

impl LocoCtrl {
    /// Zero the demands.
    ///
    /// Stop shall never error and must always succeed in bringing the robot
    /// to a stop.
    pub fn make_safe(&mut self) -> WheelDems {
        let output = WheelDems::default();
        self.output = Some(output);
        self.report = StatusReport::default();
        output
    }

    /// The last demands produced, if any.
    pub fn output(&self) -> Option<WheelDems> {
        self.output
    }

    /// Enforce the limits of the robot's drive capabilities.
    ///
    /// Each wheel is clamped to the maximum speed on its own, raising the
    /// corresponding flag in the status report.
    fn enforce_limits(&mut self, mut target: WheelDems) -> WheelDems {
        let max = self.params.max_wheel_speed_mps;

        if target.left_mps.abs() > max {
            target.left_mps = target.left_mps.clamp(-max, max);
            self.report.left_limited = true;
        }
        if target.right_mps.abs() > max {
            target.right_mps = target.right_mps.clamp(-max, max);
            self.report.right_limited = true;
        }

        target
    }
}
