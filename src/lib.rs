//! Event-driven hard-sphere molecular dynamics.
//!
//! N equal-radius rigid balls in a rectangular 2D or 3D box, advanced from
//! one exactly-solved event to the next: ball-ball collisions, ball-wall
//! collisions, and cell-boundary transits of the spatial grid that prunes
//! the collision search. Balls carry their own local clocks; a min-heap of
//! predicted events with lazy generation-based invalidation keeps global
//! causality intact.

pub mod ball;
pub mod collision;
pub mod config;
pub mod error;
pub mod events;
pub mod grid;
pub mod output;
pub mod queue;
pub mod simulation;
pub mod wall;
pub mod world_gen;
