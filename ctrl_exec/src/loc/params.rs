//! Parameters structure for localisation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the pose estimator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocParams {
    // ---- GEOMETRY ----
    /// The diameter of the drive wheels.
    ///
    /// Units: meters
    pub wheel_diameter_m: f64,

    /// The distance between the contact points of the left and right wheels.
    ///
    /// Units: meters
    pub wheel_base_m: f64,
}

impl Default for LocParams {
    fn default() -> Self {
        Self {
            wheel_diameter_m: 0.165,
            wheel_base_m: 0.425,
        }
    }
}
