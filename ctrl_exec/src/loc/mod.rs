//! # Localisation module
//!
//! This module provides localisation for the robot in the form of wheel
//! odometry. Cumulative wheel rotations read from the actuator are integrated
//! into a planar pose by the `PoseEstimator`, which runs on the `OdomWorker`
//! background thread and shares its latest estimate through a `PoseHandle`.
//!
//! # Frame
//!
//! `x` is forward and `z` is left of the robot's starting position, yaw is
//! counter-clockwise from `+x` in the range [0, 2pi).

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod odom_worker;
mod params;

pub use odom_worker::*;
pub use params::LocParams;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use comms_if::msg::RobotPoseMsg;
use util::maths::wrap_2pi;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Heading changes smaller than this are integrated as straight line motion.
///
/// Units: radians
const STRAIGHT_LINE_DTHETA_RAD: f64 = 1e-6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The planar pose of the robot.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Forward position
    ///
    /// Units: meters
    pub x: f64,

    /// Leftward position
    ///
    /// Units: meters
    pub z: f64,

    /// Heading, counter-clockwise from `+x`
    ///
    /// Units: radians, range [0, 2pi)
    pub yaw: f64,
}

/// A pose along with the time it was estimated.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PoseStamped {
    pub pose: Pose,

    /// Units: unix seconds
    pub time_s: f64,

    /// Incremented every time a new pose is published
    pub seq: u64,
}

/// Integrates wheel rotations into a pose.
#[derive(Debug, Clone)]
pub struct PoseEstimator {
    params: LocParams,

    pose: Pose,

    /// Last successfully read wheel positions (left, right), `None` until the
    /// first calibration read.
    prev_turns: Option<(f64, f64)>,
}

/// Shared access to the latest pose estimate.
///
/// Clones refer to the same estimate. The odometry thread writes, the
/// control loop reads a consistent copy.
#[derive(Debug, Clone, Default)]
pub struct PoseHandle {
    latest: Arc<Mutex<Option<PoseStamped>>>,
    recal_req: Arc<AtomicBool>,
    reset_req: Arc<AtomicBool>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Where the control loop gets its pose from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocSource {
    /// The on-board wheel odometry
    Odometry,

    /// Poses published on `/localization/robot_pose`
    Bus,
}

/// Errors associated with localisation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LocError {
    #[error("Wheel diameter must be positive and finite, found {0} m")]
    InvalidWheelDiameter(f64),

    #[error("Wheel base must be positive and finite, found {0} m")]
    InvalidWheelBase(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(x: f64, z: f64, yaw: f64) -> Self {
        Self {
            x,
            z,
            yaw: wrap_2pi(yaw),
        }
    }
}

impl From<&RobotPoseMsg> for Pose {
    fn from(msg: &RobotPoseMsg) -> Self {
        Pose::new(msg.x_m, msg.y_m, msg.theta_rad)
    }
}

impl PoseEstimator {
    /// Create a new estimator at the origin.
    ///
    /// Fails if the wheel geometry is not positive and finite.
    pub fn new(params: LocParams) -> Result<Self, LocError> {
        if !(params.wheel_diameter_m.is_finite() && params.wheel_diameter_m > 0.0) {
            return Err(LocError::InvalidWheelDiameter(params.wheel_diameter_m));
        }
        if !(params.wheel_base_m.is_finite() && params.wheel_base_m > 0.0) {
            return Err(LocError::InvalidWheelBase(params.wheel_base_m));
        }

        Ok(Self {
            params,
            pose: Pose::default(),
            prev_turns: None,
        })
    }

    /// Integrate a new pair of cumulative wheel positions.
    ///
    /// The first reading (and the first after `reset` or `recalibrate`) is
    /// only cached and the pose returned unchanged.
    ///
    /// Readings are not validated, non-finite values will corrupt the pose.
    ///
    /// Units: turns
    pub fn update(&mut self, left_turns: f64, right_turns: f64) -> Pose {
        let (prev_left, prev_right) = match self.prev_turns.replace((left_turns, right_turns)) {
            Some(p) => p,
            None => return self.pose,
        };

        let circ_m = PI * self.params.wheel_diameter_m;
        let dl = (left_turns - prev_left) * circ_m;
        let dr = (right_turns - prev_right) * circ_m;

        let dc = 0.5 * (dl + dr);
        let dtheta = (dr - dl) / self.params.wheel_base_m;

        // Advance along the mean heading of the step when turning
        let heading = if dtheta.abs() > STRAIGHT_LINE_DTHETA_RAD {
            self.pose.yaw + 0.5 * dtheta
        } else {
            self.pose.yaw
        };

        self.pose.x += dc * heading.cos();
        self.pose.z += dc * heading.sin();
        self.pose.yaw = wrap_2pi(self.pose.yaw + dtheta);

        self.pose
    }

    /// The current pose estimate.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Return to the origin and forget the cached wheel positions.
    pub fn reset(&mut self) {
        self.pose = Pose::default();
        self.prev_turns = None;
    }

    /// Forget the cached wheel positions but keep the pose.
    ///
    /// Used when the encoder counts may have jumped, for instance after the
    /// actuator has cleared an error.
    pub fn recalibrate(&mut self) {
        self.prev_turns = None;
    }

    /// True once a calibration reading has been taken.
    pub fn is_calibrated(&self) -> bool {
        self.prev_turns.is_some()
    }
}

impl PoseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new estimate.
    pub fn set(&self, pose: Pose, time_s: f64) {
        let mut latest = self.lock();
        let seq = latest.map(|p| p.seq + 1).unwrap_or(0);
        *latest = Some(PoseStamped { pose, time_s, seq });
    }

    /// Get a copy of the latest estimate.
    pub fn get(&self) -> Option<PoseStamped> {
        *self.lock()
    }

    /// Ask the estimator to recalibrate before its next update.
    pub fn request_recalibration(&self) {
        self.recal_req.store(true, Ordering::Relaxed);
    }

    /// Ask the estimator to return to the origin before its next update.
    pub fn request_reset(&self) {
        self.reset_req.store(true, Ordering::Relaxed);
    }

    /// Apply any outstanding requests to the estimator, clearing them.
    pub fn apply_requests(&self, estimator: &mut PoseEstimator) {
        if self.reset_req.swap(false, Ordering::Relaxed) {
            estimator.reset();
        }
        if self.recal_req.swap(false, Ordering::Relaxed) {
            estimator.recalibrate();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<PoseStamped>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
