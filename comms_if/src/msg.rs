//! # Bus messages
//!
//! One struct per topic. Field names match the JSON payloads published by the
//! other nodes on the robot. All timestamps are unix seconds.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A message whose contents can be checked before being accepted onto the bus.
pub trait Validate {
    /// Returns `Ok(())` if the message is usable.
    fn validate(&self) -> Result<(), MsgError>;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Localisation initialised flag, published on `/localization/initialized_flag`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocInitMsg {
    pub timestamp: f64,

    /// True once the localisation system has a valid pose estimate
    pub initialized: bool,
}

/// Direct velocity command, published on `/control/target_velocity`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetVelMsg {
    pub timestamp: f64,

    /// Units: meters/second
    pub linear_velocity_mps: f64,

    /// Units: radians/second
    pub angular_velocity_radps: f64,
}

/// Robot pose from the localisation system, published on
/// `/localization/robot_pose`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotPoseMsg {
    pub timestamp: f64,

    /// Units: meters
    pub x_m: f64,

    /// Units: meters
    pub y_m: f64,

    /// Units: radians
    pub theta_rad: f64,
}

/// A single waypoint in a path plan.
///
/// On the wire a waypoint is either `[x, y]` or `[x, y, yaw]`, a missing yaw
/// is taken as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawPathPose", into = "RawPathPose")]
pub struct PathPose {
    /// Units: meters
    pub x: f64,

    /// Units: meters
    pub y: f64,

    /// Units: radians
    pub yaw: f64,
}

/// Path plan from the planner, published on `/planning/path_plan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPlanMsg {
    pub timestamp: f64,

    pub path_pose_list: Vec<PathPose>,
}

/// Realised wheel velocities, published on `/wheel_velocities_mps`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelVelsMsg {
    pub timestamp: f64,

    /// Units: meters/second
    pub left_vel_mps: f64,

    /// Units: meters/second
    pub right_vel_mps: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Reasons a message is rejected.
#[derive(Debug, Error, PartialEq)]
pub enum MsgError {
    #[error("Field `{0}` is not a finite number")]
    NonFinite(&'static str),

    #[error("The path plan contains no poses")]
    EmptyPath,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawPathPose {
    Full(f64, f64, f64),
    Planar(f64, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PathPose {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }
}

impl From<RawPathPose> for PathPose {
    fn from(raw: RawPathPose) -> Self {
        match raw {
            RawPathPose::Full(x, y, yaw) => Self { x, y, yaw },
            RawPathPose::Planar(x, y) => Self { x, y, yaw: 0.0 },
        }
    }
}

impl From<PathPose> for RawPathPose {
    fn from(p: PathPose) -> Self {
        RawPathPose::Full(p.x, p.y, p.yaw)
    }
}

impl Validate for LocInitMsg {
    fn validate(&self) -> Result<(), MsgError> {
        check_finite("timestamp", self.timestamp)
    }
}

impl Validate for TargetVelMsg {
    fn validate(&self) -> Result<(), MsgError> {
        check_finite("timestamp", self.timestamp)?;
        check_finite("linear_velocity_mps", self.linear_velocity_mps)?;
        check_finite("angular_velocity_radps", self.angular_velocity_radps)
    }
}

impl Validate for RobotPoseMsg {
    fn validate(&self) -> Result<(), MsgError> {
        check_finite("timestamp", self.timestamp)?;
        check_finite("x_m", self.x_m)?;
        check_finite("y_m", self.y_m)?;
        check_finite("theta_rad", self.theta_rad)
    }
}

impl Validate for PathPlanMsg {
    fn validate(&self) -> Result<(), MsgError> {
        check_finite("timestamp", self.timestamp)?;

        if self.path_pose_list.is_empty() {
            return Err(MsgError::EmptyPath);
        }

        for p in self.path_pose_list.iter() {
            check_finite("path_pose_list", p.x)?;
            check_finite("path_pose_list", p.y)?;
            check_finite("path_pose_list", p.yaw)?;
        }

        Ok(())
    }
}

impl Validate for WheelVelsMsg {
    fn validate(&self) -> Result<(), MsgError> {
        check_finite("timestamp", self.timestamp)?;
        check_finite("left_vel_mps", self.left_vel_mps)?;
        check_finite("right_vel_mps", self.right_vel_mps)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn check_finite(field: &'static str, value: f64) -> Result<(), MsgError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(MsgError::NonFinite(field))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_path_pose_formats() {
        let plan: PathPlanMsg = serde_json::from_str(
            r#"{"timestamp": 10.0, "path_pose_list": [[0.0, 0.0], [1.0, 0.5, 0.3]]}"#,
        )
        .unwrap();

        assert_eq!(
            plan.path_pose_list,
            vec![PathPose::new(0.0, 0.0, 0.0), PathPose::new(1.0, 0.5, 0.3)]
        );
        assert_eq!(plan.validate(), Ok(()));

        // Always written out with the yaw
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["path_pose_list"][0], serde_json::json!([0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_validation() {
        let plan = PathPlanMsg {
            timestamp: 1.0,
            path_pose_list: vec![],
        };
        assert_eq!(plan.validate(), Err(MsgError::EmptyPath));

        let cmd = TargetVelMsg {
            timestamp: 1.0,
            linear_velocity_mps: f64::NAN,
            angular_velocity_radps: 0.0,
        };
        assert_eq!(
            cmd.validate(),
            Err(MsgError::NonFinite("linear_velocity_mps"))
        );
    }

    #[test]
    fn test_missing_field_rejected() {
        let r: Result<TargetVelMsg, _> =
            serde_json::from_str(r#"{"timestamp": 1.0, "linear_velocity_mps": 0.2}"#);
        assert!(r.is_err());
    }
}
