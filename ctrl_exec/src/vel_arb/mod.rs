//! # Velocity arbitration module
//!
//! Each cycle the arbiter picks exactly one velocity source, in order of
//! precedence:
//!
//! 1. `Following` - a fresh path plan is held and a pose is available, the
//!    path follower's request is used.
//! 2. `ExternalCommand` - a direct velocity command arrived this cycle and is
//!    used verbatim.
//! 3. `Stopping` - the last adopted command is still recent, the robot
//!    decelerates along a stopping profile seeded from it.
//! 4. `Idle` - zero velocity.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use crate::stop_profile::StopProfileError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The velocity selected for one cycle.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct VelocityCommand {
    /// Units: meters/second
    pub linear_mps: f64,

    /// Units: radians/second
    pub angular_radps: f64,

    /// Time the command was issued. For external commands this is the
    /// message's own timestamp.
    ///
    /// Units: unix seconds
    pub timestamp_s: f64,

    pub source: CmdSource,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Where a velocity command came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum CmdSource {
    Path,
    External,
    Stopping,
    Zero,
}

/// The arbiter's state, which is the source chosen on the last cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ArbState {
    Following,
    ExternalCommand,
    Stopping,
    Idle,
}

/// Possible errors during velocity arbitration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VelArbError {
    #[error("Parameter `{0}` must be positive and finite, found {1}")]
    InvalidParam(&'static str, f64),

    #[error("Could not generate a stopping profile: {0}")]
    StopProfileError(#[from] StopProfileError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VelocityCommand {
    /// A zero velocity command.
    pub fn zero(timestamp_s: f64) -> Self {
        Self {
            linear_mps: 0.0,
            angular_radps: 0.0,
            timestamp_s,
            source: CmdSource::Zero,
        }
    }
}

impl Default for ArbState {
    fn default() -> Self {
        ArbState::Idle
    }
}
