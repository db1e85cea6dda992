//! # Control Executable Parameters
//!
//! This module provide parameters for the control executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::{
    loc::{LocParams, LocSource},
    loco_ctrl,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Largest difference allowed between two copies of the same geometry.
///
/// Units: meters
const GEOMETRY_TOLERANCE_M: f64 = 1e-6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CtrlExecParams {
    /// Target frequency of the control loop.
    ///
    /// Units: hertz
    pub cycle_frequency_hz: f64,

    /// Where the control loop takes its pose from
    pub loc_source: LocSource,

    /// Period at which the odometry thread polls the wheel encoders.
    ///
    /// Units: seconds
    pub odom_period_s: f64,

    /// The actuator is checked for errors once every this many cycles.
    pub error_check_period_cycles: u64,

    /// Poses older than this are not passed to the arbiter.
    ///
    /// Units: seconds
    pub pose_staleness_s: f64,

    /// Number of consecutive cycle overruns after which an error is logged.
    pub overrun_error_limit: u64,

    /// Archive one row per cycle into the session directory
    pub archive: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamsError {
    #[error(
        "Odometry uses a wheel base of {0} m but locomotion control uses {1} m, \
        loc.toml and loco_ctrl.toml must agree"
    )]
    WheelBaseMismatch(f64, f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for CtrlExecParams {
    fn default() -> Self {
        Self {
            cycle_frequency_hz: 300.0,
            loc_source: LocSource::Odometry,
            odom_period_s: 0.005,
            error_check_period_cycles: 20,
            pose_staleness_s: 1.0,
            overrun_error_limit: 300,
            archive: true,
        }
    }
}

impl CtrlExecParams {
    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub fn cycle_period_s(&self) -> f64 {
        1.0 / self.cycle_frequency_hz
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Check that odometry and locomotion control describe the same robot.
pub fn check_wheel_base(loc: &LocParams, loco: &loco_ctrl::Params) -> Result<(), ParamsError> {
    if (loc.wheel_base_m - loco.wheel_base_m).abs() <= GEOMETRY_TOLERANCE_M {
        Ok(())
    } else {
        Err(ParamsError::WheelBaseMismatch(loc.wheel_base_m, loco.wheel_base_m))
    }
}
