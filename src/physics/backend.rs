//! Physics Backend Interface
//!
//! The narrow seam between the simulations and whatever integrates rigid
//! bodies: build a world, step it, read positions and contacts back.
//! Rules and stability code never see past this trait.

use glam::Vec3;

use crate::physics::tuning::PhysicsConfig;

/// Index of a body inside one backend instance.
pub type BodyHandle = usize;

/// Static bodies never move and have no mass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    /// Immovable.
    Static,
    /// Integrated every step.
    Dynamic,
}

/// Description of a box body to insert.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyDesc {
    /// Centre of the box.
    pub position: Vec3,
    /// Half-extents along X, Y, Z.
    pub half_extents: Vec3,
    /// Static or dynamic.
    pub kind: BodyKind,
    /// Initial velocity (ignored for static bodies).
    pub velocity: Vec3,
}

impl BodyDesc {
    /// Body at rest.
    pub fn new(position: Vec3, half_extents: Vec3, kind: BodyKind) -> Self {
        Self {
            position,
            half_extents,
            kind,
            velocity: Vec3::ZERO,
        }
    }

    /// Same body with an initial velocity.
    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }
}

/// Backend faults. These never reach the host: simulations convert them to
/// the stability fallback.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhysicsError {
    /// A body's position or velocity stopped being finite.
    #[error("non-finite state on body {0}")]
    NonFinite(BodyHandle),

    /// Handle not issued by this backend.
    #[error("unknown body handle {0}")]
    UnknownBody(BodyHandle),

    /// Body description rejected.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// Timestep rejected.
    #[error("invalid timestep {0}")]
    InvalidTimestep(f32),

    /// Anything else the backend reports.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// A rigid-body integrator over boxes.
pub trait PhysicsBackend {
    /// Fresh, empty world.
    fn create(config: &PhysicsConfig) -> Self
    where
        Self: Sized;

    /// Insert a body.
    fn add_body(&mut self, desc: BodyDesc) -> Result<BodyHandle, PhysicsError>;

    /// Overwrite a dynamic body's velocity.
    fn set_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> Result<(), PhysicsError>;

    /// Advance by `dt` seconds.
    fn step(&mut self, dt: f32) -> Result<(), PhysicsError>;

    /// Current centre of a body.
    fn position(&self, body: BodyHandle) -> Result<Vec3, PhysicsError>;

    /// Current velocity of a body.
    fn velocity(&self, body: BodyHandle) -> Result<Vec3, PhysicsError>;

    /// Bodies sharing a face contact with `body`.
    fn contacts(&self, body: BodyHandle) -> Result<Vec<BodyHandle>, PhysicsError>;

    /// Largest approach speed resolved on `body` so far.
    fn peak_impact(&self, body: BodyHandle) -> Result<f32, PhysicsError>;
}
