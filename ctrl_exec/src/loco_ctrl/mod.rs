//! Locomotion control module
//!
//! Converts the body velocity chosen by the arbiter into left and right wheel
//! velocity demands.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod calc_skid_steer;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during LocoCtrl operation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LocoCtrlError {
    #[error("Wheel base must be positive and finite, found {0} m")]
    InvalidWheelBase(f64),

    #[error("Maximum wheel speed must be positive and finite, found {0} m/s")]
    InvalidMaxWheelSpeed(f64),

    #[error("Recieved a non-finite velocity command: ({0}, {1})")]
    InvalidCmd(f64, f64),
}
