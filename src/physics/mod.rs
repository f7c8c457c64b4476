//! Physics Module
//!
//! Rigid-body simulation of moves.
//!
//! ## Module Structure
//!
//! - `backend`: The integrator seam (`PhysicsBackend`)
//! - `box_world`: Default axis-aligned box integrator
//! - `world`: Per-move world built from a tower
//! - `simulate`: Removal, placement, push and replace verdicts
//! - `tuning`: Step budgets, impulses and collapse floors

pub mod backend;
pub mod box_world;
pub mod simulate;
pub mod tuning;
pub mod world;

pub use backend::{BodyDesc, BodyHandle, BodyKind, PhysicsBackend, PhysicsError};
pub use box_world::BoxWorld;
pub use simulate::{CollapseReason, PushVerdict, SimulationVerdict, Simulator};
pub use tuning::{ImpactBand, PhysicsConfig};
pub use world::PhysicsWorld;
