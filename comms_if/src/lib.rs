//! # Communications interface crate.
//!
//! Provides the typed messages exchanged with the rest of the robot and the
//! in-process bus they travel on.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Message definitions for every topic the control core consumes or produces
pub mod msg;

/// Latest-value mailbox bus
pub mod bus;
