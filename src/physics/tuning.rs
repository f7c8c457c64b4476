//! Physics Tunables
//!
//! Step budgets, impulses and collapse floors. These encode game balance,
//! so they are data rather than literals.

use serde::{Deserialize, Serialize};

use crate::core::geometry::BLOCK_HALF_LENGTH;

/// Fixed simulation timestep (seconds).
pub const TIMESTEP: f32 = 1.0 / 60.0;

/// Step cap for a removal.
pub const REMOVAL_STEPS: u32 = 40;
/// Step cap for a poorly-timed removal.
pub const REMOVAL_STEPS_EXTENDED: u32 = 60;
/// Step cap for a push.
pub const PUSH_STEPS: u32 = 60;
/// Step cap for a replace check.
pub const REPLACE_STEPS: u32 = 80;
/// Step cap for a placement.
pub const PLACEMENT_STEPS: u32 = 120;

/// Gap left between the tower footprint and a respawned pushed block.
pub const PUSH_SPAWN_OFFSET: f32 = 4.0;

/// One row of the post-placement impact table.
///
/// A placement collapses when the measured impact reaches `min_impact`
/// (strictly exceeds it when `strict`) and the adjusted stability is below
/// `fail_below`. `fail_below: None` fails regardless of stability.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImpactBand {
    /// Impact speed the band starts at.
    pub min_impact: f32,
    /// Use `>` rather than `>=` for the impact comparison.
    #[serde(default)]
    pub strict: bool,
    /// Stability under which the band fails.
    pub fail_below: Option<f32>,
}

impl ImpactBand {
    /// Whether this band fails the placement.
    pub fn fails(&self, impact: f32, stability: f32) -> bool {
        let reached = if self.strict {
            impact > self.min_impact
        } else {
            impact >= self.min_impact
        };
        reached && self.fail_below.is_none_or(|limit| stability < limit)
    }
}

/// Default impact table.
pub fn default_impact_bands() -> Vec<ImpactBand> {
    vec![
        ImpactBand { min_impact: 0.2, strict: true, fail_below: Some(20.0) },
        ImpactBand { min_impact: 0.5, strict: false, fail_below: Some(50.0) },
        ImpactBand { min_impact: 1.0, strict: false, fail_below: Some(70.0) },
        ImpactBand { min_impact: 2.0, strict: false, fail_below: None },
    ]
}

/// Physics configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Seconds per step.
    pub timestep: f32,
    /// Downward acceleration.
    pub gravity: f32,
    /// Contact solver passes per step.
    pub solver_iterations: u32,
    /// Coulomb friction coefficient on resting contacts.
    pub friction: f32,
    /// Overlap below which boxes are treated as touching.
    pub contact_slop: f32,
    /// Vertical gap still counted as resting on a support.
    pub support_gap: f32,
    /// Sideways speed given to a block when it topples.
    pub topple_speed: f32,

    /// Step cap for removals.
    pub removal_steps: u32,
    /// Step cap for poorly-timed removals.
    pub removal_steps_extended: u32,
    /// Step cap for pushes.
    pub push_steps: u32,
    /// Step cap for replace checks.
    pub replace_steps: u32,
    /// Step cap for placements.
    pub placement_steps: u32,

    /// Levels at the top that stay dynamic during removal and push.
    pub active_window_levels: usize,
    /// Levels at the top that are dynamic during placement.
    pub placement_window_levels: usize,

    /// Downward speed of a placed block at 1.0× impulse.
    pub placement_impact_speed: f32,
    /// Speed of the placed block under which it counts as settled.
    pub settle_speed: f32,
    /// Impact table checked after the placement loop.
    pub impact_bands: Vec<ImpactBand>,

    /// Outward speed of a pulled block at 1.0× impulse.
    pub pull_speed: f32,
    /// Upward speed of a pulled block at 1.0× impulse.
    pub pull_lift: f32,
    /// Fraction of the pull velocity dragged onto blocks resting on it.
    pub pull_drag: f32,
    /// How far the pulled block is respawned along its long axis.
    pub pull_clearance: f32,

    /// Gap between the tower footprint and a pushed block's respawn point.
    pub push_offset: f32,
    /// Speed of a pushed block at full strength.
    pub push_speed: f32,

    /// Drop from its start height after which a body has fallen.
    pub fall_drop: f32,
    /// Drop in average dynamic height after which the tower has sagged.
    pub sag_drop: f32,
    /// Absolute height below which a body lies on the ground.
    pub floor_height: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            timestep: TIMESTEP,
            gravity: 9.81,
            solver_iterations: 4,
            friction: 0.5,
            contact_slop: 1.0e-3,
            support_gap: 0.02,
            topple_speed: 1.0,

            removal_steps: REMOVAL_STEPS,
            removal_steps_extended: REMOVAL_STEPS_EXTENDED,
            push_steps: PUSH_STEPS,
            replace_steps: REPLACE_STEPS,
            placement_steps: PLACEMENT_STEPS,

            active_window_levels: 4,
            placement_window_levels: 2,

            placement_impact_speed: 0.4,
            settle_speed: 0.05,
            impact_bands: default_impact_bands(),

            pull_speed: 2.0,
            pull_lift: 0.3,
            pull_drag: 0.15,
            pull_clearance: 2.0 * BLOCK_HALF_LENGTH + 0.1,

            push_offset: PUSH_SPAWN_OFFSET,
            push_speed: 6.0,

            fall_drop: 0.5,
            sag_drop: 0.25,
            floor_height: 0.6,
        }
    }
}
