//! # Actuator interface
//!
//! The motor driver seen from the control core. Implementations own their
//! low-level protocol, the control loop and odometry thread only use this
//! trait. All calls are synchronous and a failed call is reported as an
//! error, never a panic.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

#[cfg(feature = "sim")]
mod sim;

#[cfg(feature = "sim")]
pub use sim::SimActuator;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Longest an `Actuator` call may take before it is reported as a timeout.
///
/// Shorter than the odometry period and a fraction of one control cycle.
pub const CALL_DEADLINE: Duration = Duration::from_millis(2);

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A two-wheel motor driver.
///
/// # Deadlines
///
/// Every call must return within `CALL_DEADLINE`. An implementation whose
/// link can block bounds each exchange itself and reports an expired one as
/// `ActuatorError::Timeout`. Callers hold the shared lock for the whole call,
/// so a blocking implementation would stall both the control loop and the
/// odometry thread.
///
/// A timed out read is treated as no fresh sample: the odometry thread drops
/// it and the control loop publishes no wheel velocities for that cycle.
pub trait Actuator {
    /// Demand a wheel velocity.
    ///
    /// Units: meters/second
    fn set_wheel_velocity(&mut self, side: WheelSide, vel_mps: f64) -> Result<(), ActuatorError>;

    /// Cumulative rotation of the wheel since power on, with the mounting
    /// direction corrected so that positive is forwards.
    ///
    /// Units: turns
    fn get_wheel_position_turns(&mut self, side: WheelSide) -> Result<f64, ActuatorError>;

    /// Realised wheel velocity.
    ///
    /// Units: meters/second
    fn get_wheel_velocity(&mut self, side: WheelSide) -> Result<f64, ActuatorError>;

    /// Stop the wheel.
    fn stop(&mut self, side: WheelSide) -> Result<(), ActuatorError>;

    /// Clear any latched errors on the wheel's axis.
    fn clear_errors(&mut self, side: WheelSide) -> Result<(), ActuatorError>;

    /// True if either axis has latched an error.
    fn has_errors(&mut self) -> Result<bool, ActuatorError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An actuator shared between the control loop and the odometry thread.
pub type SharedActuator = Arc<Mutex<dyn Actuator + Send>>;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The side of the robot a wheel is on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum WheelSide {
    Left,
    Right,
}

/// Errors reported by an actuator.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ActuatorError {
    #[error("The actuator did not respond on the {0} axis")]
    Timeout(WheelSide),

    #[error("The {0} axis reported a fault: {1}")]
    AxisFault(WheelSide, String),

    #[error("The actuator connection is closed")]
    Disconnected,

    #[error("Demand of {1} m/s on the {0} axis is not a finite number")]
    InvalidDemand(WheelSide, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WheelSide {
    pub const BOTH: [WheelSide; 2] = [WheelSide::Left, WheelSide::Right];
}

impl fmt::Display for WheelSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WheelSide::Left => f.write_str("left"),
            WheelSide::Right => f.write_str("right"),
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Lock a shared actuator, recovering the guard if the lock is poisoned.
pub fn lock(actuator: &SharedActuator) -> MutexGuard<'_, dyn Actuator + Send + 'static> {
    actuator.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read both wheel positions under a single lock.
///
/// Units: turns
pub fn read_wheel_positions(actuator: &SharedActuator) -> Result<(f64, f64), ActuatorError> {
    let mut act = lock(actuator);

    let start = Instant::now();
    let left = act.get_wheel_position_turns(WheelSide::Left)?;
    let right = act.get_wheel_position_turns(WheelSide::Right)?;

    let elapsed = start.elapsed();
    if elapsed > 2 * CALL_DEADLINE {
        warn!(
            "Reading the wheel positions took {:.06} s, the actuator is not keeping to its deadline",
            elapsed.as_secs_f64()
        );
    }

    Ok((left, right))
}
