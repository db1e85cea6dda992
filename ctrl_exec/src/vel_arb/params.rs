//! Parameters structure for velocity arbitration

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the velocity arbiter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {
    /// A held path plan older than this is dropped.
    ///
    /// Units: seconds
    pub plan_staleness_s: f64,

    /// The last adopted command is only used to seed a stop while younger
    /// than this.
    ///
    /// Units: seconds
    pub cmd_staleness_s: f64,

    /// Duration of the deceleration to a stop.
    ///
    /// Units: seconds
    pub stop_duration_s: f64,

    /// Spacing of the stopping profile entries.
    ///
    /// Units: seconds
    pub stop_resolution_s: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            plan_staleness_s: 5.0,
            cmd_staleness_s: 2.0,
            stop_duration_s: 2.0,
            stop_resolution_s: crate::stop_profile::DEFAULT_RESOLUTION_S,
        }
    }
}
