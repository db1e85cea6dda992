//! Parameters structure for LocoCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Locomotion control.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {
    // ---- GEOMETRY ----
    /// The distance between the left and right wheels.
    ///
    /// Units: meters
    pub wheel_base_m: f64,

    // ---- CAPABILITIES ----
    /// Maximum wheel speed in either direction.
    ///
    /// Units: meters/second
    pub max_wheel_speed_mps: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            wheel_base_m: 0.425,
            max_wheel_speed_mps: 1.0,
        }
    }
}
