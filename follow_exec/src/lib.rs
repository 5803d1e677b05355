//! # Follow library.
//!
//! This library allows other crates in the workspace, and the benchmarks, to access items defined
//! inside the follow crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Alpha filter - first order low-pass filter used to smooth the controller's internal state
pub mod alpha_filter;

/// Follow control module - generates setpoints which keep the vehicle following a target
pub mod follow_ctrl;

/// Simulation - kinematic target and vehicle models used to drive follow control
pub mod sim;
