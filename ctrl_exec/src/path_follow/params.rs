//! Parameters structure for path following

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the lookahead controller.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathFollowParams {
    /// The goal is the first point past the closest one at least this far
    /// from the robot.
    ///
    /// Units: meters
    pub lookahead_distance_m: f64,

    /// Units: meters/second
    pub max_linear_velocity_mps: f64,

    /// Units: radians/second
    pub max_angular_velocity_radps: f64,

    // ---- LINEAR CONTROLLER ----
    pub lin_k_p: f64,
    pub lin_k_i: f64,
    pub lin_k_d: f64,

    // ---- ANGULAR CONTROLLER ----
    pub ang_k_p: f64,
    pub ang_k_i: f64,
    pub ang_k_d: f64,
}

impl Default for PathFollowParams {
    fn default() -> Self {
        Self {
            lookahead_distance_m: 0.10,
            max_linear_velocity_mps: 0.40,
            max_angular_velocity_radps: 1.5,
            lin_k_p: 0.4,
            lin_k_i: 0.0,
            lin_k_d: 0.0,
            ang_k_p: 1.2,
            ang_k_i: 0.0,
            ang_k_d: 0.0,
        }
    }
}
