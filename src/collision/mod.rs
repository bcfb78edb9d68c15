//! Closed-form collision search and resolution for equal-radius hard spheres.
//!
//! `solvers` answers "when would this next happen" for the three event kinds;
//! `colliders` applies the velocity updates once an event fires.

pub mod colliders;
pub mod solvers;

/// Solutions closer than this to the current time are the event that just
/// fired and must not retrigger.
pub const TIME_EPSILON: f64 = 1e-12;

/// Squared-magnitude threshold under which relative motion is treated as zero.
pub const VELOCITY_SQ_EPSILON: f64 = 1e-24;

/// Per-component velocity threshold, the square root of the above.
pub const VELOCITY_EPSILON: f64 = 1e-12;
