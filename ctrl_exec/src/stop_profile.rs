//! # Stopping profile
//!
//! When the robot loses its velocity source it ramps down to a stop instead of
//! cutting the motors. A `StoppingProfile` is a dense table of absolute
//! timestamps to (linear, angular) velocities, decaying linearly from the last
//! commanded velocity to zero. It is generated once per stop and then sampled
//! every cycle by nearest timestamp.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default spacing of the profile entries.
///
/// Units: seconds
pub const DEFAULT_RESOLUTION_S: f64 = 0.01;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One entry in a stopping profile.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ProfileEntry {
    /// Units: unix seconds
    pub time_s: f64,

    /// Units: meters/second
    pub linear_mps: f64,

    /// Units: radians/second
    pub angular_radps: f64,
}

/// A time indexed deceleration curve, sorted by time.
#[derive(Debug, Clone, PartialEq)]
pub struct StoppingProfile {
    entries: Vec<ProfileEntry>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum StopProfileError {
    #[error("Deceleration time must be positive and finite, found {0} s")]
    InvalidDecelTime(f64),

    #[error("Profile resolution must be positive and finite, found {0} s")]
    InvalidResolution(f64),

    #[error("Seed velocity ({0}, {1}) is not finite")]
    InvalidSeed(f64, f64),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Generate a profile at the default resolution.
///
/// See `generate_with_resolution`.
pub fn generate(
    linear_mps: f64,
    angular_radps: f64,
    decel_time_s: f64,
    now_s: f64,
) -> Result<StoppingProfile, StopProfileError> {
    generate_with_resolution(
        linear_mps,
        angular_radps,
        decel_time_s,
        now_s,
        DEFAULT_RESOLUTION_S,
    )
}

/// Generate a profile which ramps both axes from the seed velocity at `now_s`
/// to zero at `now_s + decel_time_s`.
///
/// Entries are spaced by `resolution_s` with both ends included. If the
/// deceleration time is not a whole number of steps the final entry is placed
/// exactly at the end of the deceleration.
pub fn generate_with_resolution(
    linear_mps: f64,
    angular_radps: f64,
    decel_time_s: f64,
    now_s: f64,
    resolution_s: f64,
) -> Result<StoppingProfile, StopProfileError> {
    if !(decel_time_s.is_finite() && decel_time_s > 0.0) {
        return Err(StopProfileError::InvalidDecelTime(decel_time_s));
    }
    if !(resolution_s.is_finite() && resolution_s > 0.0) {
        return Err(StopProfileError::InvalidResolution(resolution_s));
    }
    if !(linear_mps.is_finite() && angular_radps.is_finite()) {
        return Err(StopProfileError::InvalidSeed(linear_mps, angular_radps));
    }

    let entry = |t: f64| {
        let remaining = 1.0 - t / decel_time_s;
        ProfileEntry {
            time_s: now_s + t,
            linear_mps: linear_mps * remaining,
            angular_radps: angular_radps * remaining,
        }
    };

    let num_steps = (decel_time_s / resolution_s).floor() as usize;
    let mut entries: Vec<ProfileEntry> = (0..=num_steps)
        .map(|i| entry((i as f64 * resolution_s).min(decel_time_s)))
        .collect();

    // Tolerance for floating point error in the step count
    if decel_time_s - num_steps as f64 * resolution_s > resolution_s * 1e-6 {
        entries.push(entry(decel_time_s));
    }

    Ok(StoppingProfile { entries })
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl StoppingProfile {
    /// Get the velocity of the entry nearest to `time_s`.
    ///
    /// Times before the profile give the seed velocity, times after give zero.
    pub fn sample(&self, time_s: f64) -> (f64, f64) {
        let e = self.nearest(time_s);
        (e.linear_mps, e.angular_radps)
    }

    /// Get the entry nearest to `time_s`, ties going to the earlier entry.
    pub fn nearest(&self, time_s: f64) -> &ProfileEntry {
        // Index of the first entry at or after the time
        let idx = self.entries.partition_point(|e| e.time_s < time_s);

        if idx == 0 {
            return &self.entries[0];
        }
        if idx == self.entries.len() {
            return &self.entries[idx - 1];
        }

        let before = &self.entries[idx - 1];
        let after = &self.entries[idx];

        if after.time_s - time_s < time_s - before.time_s {
            after
        } else {
            before
        }
    }

    /// Time of the first entry.
    ///
    /// Units: unix seconds
    pub fn start_time(&self) -> f64 {
        self.entries[0].time_s
    }

    /// Time of the last (zero velocity) entry.
    ///
    /// Units: unix seconds
    pub fn end_time(&self) -> f64 {
        self.entries[self.entries.len() - 1].time_s
    }

    pub fn entries(&self) -> &[ProfileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false, a profile has at least its start and end entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
