//! Physics World
//!
//! A call-scoped simulation session: one backend plus a map from block id
//! to body and the height it started at. Built from a tower for one move,
//! stepped, queried, dropped.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::core::geometry::{slot_center, Orientation};
use crate::game::tower::{BlockId, Tower};
use crate::physics::backend::{BodyDesc, BodyHandle, BodyKind, PhysicsBackend, PhysicsError};
use crate::physics::tuning::PhysicsConfig;

/// One block's body in the world.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedBody {
    /// Backend handle.
    pub handle: BodyHandle,
    /// Centre height when the body was created.
    pub initial_height: f32,
    /// Whether the backend integrates it.
    pub dynamic: bool,
}

/// Ephemeral simulation session for one move.
pub struct PhysicsWorld<'a, B: PhysicsBackend> {
    backend: B,
    bodies: BTreeMap<BlockId, TrackedBody>,
    by_handle: BTreeMap<BodyHandle, BlockId>,
    config: &'a PhysicsConfig,
}

impl<'a, B: PhysicsBackend> PhysicsWorld<'a, B> {
    /// Empty world.
    pub fn new(config: &'a PhysicsConfig) -> Self {
        Self {
            backend: B::create(config),
            bodies: BTreeMap::new(),
            by_handle: BTreeMap::new(),
            config,
        }
    }

    /// One body per block in `tower`. Levels at or above `dynamic_from`
    /// are dynamic, the rest static.
    pub fn from_tower(
        tower: &Tower,
        dynamic_from: usize,
        config: &'a PhysicsConfig,
    ) -> Result<Self, PhysicsError> {
        let mut world = Self::new(config);
        for (slot, id) in tower.blocks() {
            let kind = if slot.level >= dynamic_from {
                BodyKind::Dynamic
            } else {
                BodyKind::Static
            };
            let desc = BodyDesc::new(
                slot_center(slot.level, slot.block),
                Orientation::for_level(slot.level).half_extents(),
                kind,
            );
            world.insert(id, desc)?;
        }
        Ok(world)
    }

    /// Add a free dynamic block.
    pub fn spawn(
        &mut self,
        id: BlockId,
        position: Vec3,
        orientation: Orientation,
        velocity: Vec3,
    ) -> Result<(), PhysicsError> {
        let desc = BodyDesc::new(position, orientation.half_extents(), BodyKind::Dynamic)
            .with_velocity(velocity);
        self.insert(id, desc)
    }

    fn insert(&mut self, id: BlockId, desc: BodyDesc) -> Result<(), PhysicsError> {
        if self.bodies.contains_key(&id) {
            return Err(PhysicsError::InvalidBody(format!("block {id} already in world")));
        }
        let handle = self.backend.add_body(desc)?;
        self.bodies.insert(
            id,
            TrackedBody {
                handle,
                initial_height: desc.position.y,
                dynamic: desc.kind == BodyKind::Dynamic,
            },
        );
        self.by_handle.insert(handle, id);
        Ok(())
    }

    fn tracked(&self, id: BlockId) -> Result<&TrackedBody, PhysicsError> {
        self.bodies
            .get(&id)
            .ok_or_else(|| PhysicsError::InvalidBody(format!("block {id} not in world")))
    }

    /// Tracked body for `id`, if present.
    pub fn body(&self, id: BlockId) -> Option<&TrackedBody> {
        self.bodies.get(&id)
    }

    /// Number of dynamic bodies.
    pub fn dynamic_count(&self) -> usize {
        self.bodies.values().filter(|b| b.dynamic).count()
    }

    /// Add to a block's velocity.
    pub fn add_velocity(&mut self, id: BlockId, delta: Vec3) -> Result<(), PhysicsError> {
        let handle = self.tracked(id)?.handle;
        let current = self.backend.velocity(handle)?;
        self.backend.set_velocity(handle, current + delta)
    }

    /// Advance one fixed timestep.
    pub fn step(&mut self) -> Result<(), PhysicsError> {
        self.backend.step(self.config.timestep)
    }

    /// Current centre of a block.
    pub fn position(&self, id: BlockId) -> Result<Vec3, PhysicsError> {
        self.backend.position(self.tracked(id)?.handle)
    }

    /// Current speed of a block.
    pub fn speed(&self, id: BlockId) -> Result<f32, PhysicsError> {
        Ok(self.backend.velocity(self.tracked(id)?.handle)?.length())
    }

    /// Largest approach speed a block has absorbed.
    pub fn peak_impact(&self, id: BlockId) -> Result<f32, PhysicsError> {
        self.backend.peak_impact(self.tracked(id)?.handle)
    }

    /// Blocks in face contact with `id`.
    pub fn touching(&self, id: BlockId) -> Result<Vec<BlockId>, PhysicsError> {
        let handle = self.tracked(id)?.handle;
        Ok(self
            .backend
            .contacts(handle)?
            .into_iter()
            .filter_map(|h| self.by_handle.get(&h).copied())
            .collect())
    }

    /// How far a block has dropped below its start height.
    pub fn drop_of(&self, id: BlockId) -> Result<f32, PhysicsError> {
        let body = self.tracked(id)?;
        Ok(body.initial_height - self.backend.position(body.handle)?.y)
    }

    /// Whether a block dropped more than the fall threshold.
    pub fn has_fallen(&self, id: BlockId) -> Result<bool, PhysicsError> {
        Ok(self.drop_of(id)? > self.config.fall_drop)
    }

    /// Lowest-id dynamic block that has fallen, skipping `exclude`.
    pub fn first_fallen(&self, exclude: &[BlockId]) -> Result<Option<BlockId>, PhysicsError> {
        for (&id, body) in &self.bodies {
            if !body.dynamic || exclude.contains(&id) {
                continue;
            }
            if self.has_fallen(id)? {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Lowest-id dynamic block that started above the floor and is now
    /// below it, skipping `exclude`.
    pub fn first_below_floor(&self, exclude: &[BlockId]) -> Result<Option<BlockId>, PhysicsError> {
        let floor = self.config.floor_height;
        for (&id, body) in &self.bodies {
            if !body.dynamic || exclude.contains(&id) || body.initial_height <= floor {
                continue;
            }
            if self.backend.position(body.handle)?.y < floor {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }

    /// Mean drop of dynamic blocks, skipping `exclude`. Zero when none.
    pub fn average_drop(&self, exclude: &[BlockId]) -> Result<f32, PhysicsError> {
        let mut total = 0.0f32;
        let mut count = 0u32;
        for (&id, body) in &self.bodies {
            if !body.dynamic || exclude.contains(&id) {
                continue;
            }
            total += body.initial_height - self.backend.position(body.handle)?.y;
            count += 1;
        }
        Ok(if count == 0 { 0.0 } else { total / count as f32 })
    }

    /// Whether the dynamic part of the tower sagged past the threshold.
    pub fn has_sagged(&self, exclude: &[BlockId]) -> Result<bool, PhysicsError> {
        Ok(self.average_drop(exclude)? > self.config.sag_drop)
    }
}
