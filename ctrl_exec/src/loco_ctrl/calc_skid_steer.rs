//! Skid steer calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal imports
use super::{LocoCtrl, WheelDems};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocoCtrl {
    /// Perform the skid steer calculations.
    ///
    /// Each wheel runs at the body's linear velocity plus or minus the
    /// tangential velocity of the turn at half the wheel base. Positive
    /// angular velocity turns left, so the right wheel runs faster.
    pub(crate) fn calc_skid_steer(&self, linear_mps: f64, angular_radps: f64) -> WheelDems {
        let half_track_mps = angular_radps * self.params.wheel_base_m / 2.0;

        WheelDems {
            left_mps: linear_mps - half_track_mps,
            right_mps: linear_mps + half_track_mps,
        }
    }
}
