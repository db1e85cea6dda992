//! # Path following module
//!
//! Converts a path plan and the current pose into a requested body velocity.
//! The velocity arbiter only sees the `PathFollower` trait.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod lookahead;
mod params;
mod pid;

pub use lookahead::LookaheadCtrl;
pub use params::PathFollowParams;
pub use pid::PidController;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::loc::Pose;
use comms_if::msg::PathPose;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A path following algorithm.
pub trait PathFollower {
    /// Get the (linear, angular) velocity which moves the robot along the
    /// path from the given pose.
    ///
    /// Units: meters/second, radians/second
    fn request_velocity(&mut self, path: &[PathPose], pose: &Pose, time_s: f64) -> (f64, f64);

    /// Start again from the beginning of the path, called when the path is
    /// replaced.
    fn reset_progress(&mut self);
}
