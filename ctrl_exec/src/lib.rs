//! # Control library.
//!
//! This library allows other crates in the workspace (and the integration tests) to access items
//! defined inside the control crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator interface - drives the wheels and reports their positions
pub mod actuator;

/// Control loop - fixed rate scheduler tying all modules together
pub mod ctrl_loop;

/// Data store - per-cycle bookkeeping for the control loop
pub mod data_store;

/// Localisation module - integrates wheel encoder readings into a pose
pub mod loc;

/// Locomotion control module - converts body velocity commands into wheel demands
pub mod loco_ctrl;

/// Executable parameters
pub mod params;

/// Path following - converts a path plan and pose into a velocity request
pub mod path_follow;

/// Stopping profile generation
pub mod stop_profile;

/// Velocity arbitration - selects the velocity source for each cycle
pub mod vel_arb;
