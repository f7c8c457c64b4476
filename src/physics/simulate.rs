//! Move Simulations
//!
//! The four simulated move kinds. Each builds its own [`PhysicsWorld`],
//! steps it for a bounded budget, and returns a verdict. A backend fault
//! never escapes: it is logged and replaced with a stability-only decision.
//!
//! | Move      | Dynamic bodies              | Step cap |
//! |-----------|-----------------------------|----------|
//! | Removal   | removed level and up        | 40 (60)  |
//! | Push      | pushed level and up         | 60       |
//! | Replace   | everything                  | 80       |
//! | Placement | top two levels              | 120      |

use std::marker::PhantomData;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::core::geometry::{
    footprint_exit, slot_center, BLOCK_HALF_HEIGHT, ROWS_PER_LEVEL, SLOTS_PER_LEVEL,
};
use crate::game::accuracy::{accuracy_profile, AccuracyConfig, AccuracyProfile};
use crate::game::events::MoveKind;
use crate::game::stability::{stability_percent, StabilityConfig};
use crate::game::tower::{level_orientation, BlockId, RemoveSlot, SlotRef, Tower, TowerError};
use crate::physics::backend::{PhysicsBackend, PhysicsError};
use crate::physics::box_world::BoxWorld;
use crate::physics::tuning::PhysicsConfig;
use crate::physics::world::PhysicsWorld;

/// Why a simulated move counts as a collapse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollapseReason {
    /// The tower as a whole sagged or hit the floor.
    TowerFell,
    /// A block other than the moved one fell.
    NonMovedBlockFell,
    /// Placement impact too hard for the tower's stability.
    ImpactTooHigh,
    /// Stability under the move's threshold (also the fallback verdict).
    Unstable,
}

/// Outcome of a removal, placement or replace simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationVerdict {
    /// Whether the move brings the tower down.
    pub collapsed: bool,
    /// Why, when collapsed.
    pub reason: Option<CollapseReason>,
    /// Block that triggered the failure, if one did.
    pub failed_block: Option<BlockId>,
    /// Heuristic stability of the resulting tower.
    pub stability: f32,
    /// Peak impact of the moved block (placement only).
    pub impact: f32,
    /// Steps actually run.
    pub steps: u32,
    /// Whether the step loop ran at all.
    pub simulated: bool,
    /// Whether the stability fallback decided the verdict.
    pub fallback: bool,
}

impl SimulationVerdict {
    fn stable(stability: f32) -> Self {
        Self {
            collapsed: false,
            reason: None,
            failed_block: None,
            stability,
            impact: 0.0,
            steps: 0,
            simulated: false,
            fallback: false,
        }
    }

    fn collapse(&mut self, reason: CollapseReason, block: Option<BlockId>) {
        self.collapsed = true;
        self.reason = Some(reason);
        self.failed_block = block;
    }
}

/// Outcome of a push simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PushVerdict {
    /// Pushed block touched another block before clearing the tower.
    pub hit_tower: bool,
    /// First block it touched.
    pub hit_block: Option<BlockId>,
    /// The tower itself fell.
    pub tower_fell: bool,
    /// Why the tower fell.
    pub reason: Option<CollapseReason>,
    /// Tower block that fell first.
    pub failed_block: Option<BlockId>,
    /// Heuristic stability with the pushed block gone.
    pub stability: f32,
    /// Steps actually run.
    pub steps: u32,
    /// Whether the stability fallback decided the verdict.
    pub fallback: bool,
}

impl PushVerdict {
    /// Clean push: block out, nothing hit, tower standing.
    pub fn is_clean(&self) -> bool {
        !self.hit_tower && !self.tower_fell
    }
}

/// Raw result of one step loop.
struct Run {
    collapse: Option<(CollapseReason, Option<BlockId>)>,
    impact: f32,
    steps: u32,
}

/// Runs move simulations on a chosen physics backend.
///
/// Holds only configuration. Every call builds and drops its own world, so
/// one simulator can serve any number of games and threads.
pub struct Simulator<B: PhysicsBackend = BoxWorld> {
    physics: PhysicsConfig,
    stability: StabilityConfig,
    accuracy: AccuracyConfig,
    _backend: PhantomData<fn() -> B>,
}

impl<B: PhysicsBackend> Clone for Simulator<B> {
    fn clone(&self) -> Self {
        Self {
            physics: self.physics.clone(),
            stability: self.stability.clone(),
            accuracy: self.accuracy.clone(),
            _backend: PhantomData,
        }
    }
}

impl Simulator {
    /// Simulator on the default box integrator.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_backend(config)
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl<B: PhysicsBackend> Simulator<B> {
    /// Simulator on backend `B`.
    pub fn with_backend(config: &EngineConfig) -> Self {
        Self {
            physics: config.physics.clone(),
            stability: config.stability.clone(),
            accuracy: config.accuracy.clone(),
            _backend: PhantomData,
        }
    }

    /// Physics tunables in use.
    pub fn physics_config(&self) -> &PhysicsConfig {
        &self.physics
    }

    /// Heuristic stability of `tower`.
    pub fn stability(&self, tower: &Tower) -> f32 {
        stability_percent(tower, &self.stability)
    }

    /// Accuracy profile for a score.
    pub fn profile(&self, accuracy: Option<f32>) -> AccuracyProfile {
        accuracy_profile(accuracy, &self.accuracy)
    }

    /// First level that is dynamic when `affected` is disturbed.
    fn window_start(&self, tower: &Tower, affected: usize) -> usize {
        let top = tower.top_level().unwrap_or(0);
        let window = (top + 1).saturating_sub(self.physics.active_window_levels);
        window.min(affected)
    }

    fn fallback(
        &self,
        kind: MoveKind,
        err: &PhysicsError,
        stability: f32,
        profile: &AccuracyProfile,
    ) -> SimulationVerdict {
        let threshold = profile.threshold(self.stability.collapse_threshold);
        let adjusted = profile.adjusted_stability(stability);
        warn!(
            ?kind,
            error = %err,
            stability,
            threshold,
            "physics failed, deciding on stability"
        );

        let mut verdict = SimulationVerdict::stable(stability);
        verdict.fallback = true;
        if adjusted < threshold {
            verdict.collapse(CollapseReason::Unstable, None);
        }
        verdict
    }

    /// Apply the post-loop threshold gate.
    fn gate(&self, verdict: &mut SimulationVerdict, profile: &AccuracyProfile, block: BlockId) {
        if verdict.collapsed {
            return;
        }
        let threshold = profile.threshold(self.stability.collapse_threshold);
        if profile.adjusted_stability(verdict.stability) < threshold {
            verdict.collapse(CollapseReason::Unstable, Some(block));
        }
    }

    // =========================================================================
    // PLACEMENT
    // =========================================================================

    /// Simulate putting `placed` on top of `tower_before_place`.
    ///
    /// Errors only when `placed` is already in the tower.
    pub fn simulate_placement(
        &self,
        tower_before_place: &Tower,
        placed: BlockId,
        accuracy: Option<f32>,
    ) -> Result<SimulationVerdict, TowerError> {
        let (after, target) = tower_before_place.place_block(placed)?;
        let stability = self.stability(&after);
        let profile = self.profile(accuracy);

        if profile.skip_simulation {
            let mut verdict = SimulationVerdict::stable(stability);
            self.gate(&mut verdict, &profile, placed);
            debug!(placed, stability, collapsed = verdict.collapsed, "placement skipped physics");
            return Ok(verdict);
        }

        let verdict = match self.run_placement(tower_before_place, &after, placed, target, &profile)
        {
            Ok(run) => {
                let mut verdict = SimulationVerdict::stable(stability);
                verdict.simulated = true;
                verdict.impact = run.impact;
                verdict.steps = run.steps;
                if let Some((reason, block)) = run.collapse {
                    verdict.collapse(reason, block);
                }

                let adjusted = profile.adjusted_stability(stability);
                let too_hard = self
                    .physics
                    .impact_bands
                    .iter()
                    .any(|band| band.fails(run.impact, adjusted));
                if !verdict.collapsed && too_hard {
                    verdict.collapse(CollapseReason::ImpactTooHigh, Some(placed));
                }
                self.gate(&mut verdict, &profile, placed);
                verdict
            }
            Err(err) => self.fallback(MoveKind::Place, &err, stability, &profile),
        };

        debug!(
            placed,
            level = target.level,
            slot = target.block,
            steps = verdict.steps,
            impact = verdict.impact,
            collapsed = verdict.collapsed,
            "placement simulated"
        );
        Ok(verdict)
    }

    fn run_placement(
        &self,
        before: &Tower,
        after: &Tower,
        placed: BlockId,
        target: SlotRef,
        profile: &AccuracyProfile,
    ) -> Result<Run, PhysicsError> {
        let config = &self.physics;
        let top = after.top_level().unwrap_or(target.level);
        let dynamic_from = (top + 1).saturating_sub(config.placement_window_levels);

        let mut world = PhysicsWorld::<B>::from_tower(before, dynamic_from, config)?;
        let speed = config.placement_impact_speed * profile.impulse_multiplier;
        world.spawn(
            placed,
            slot_center(target.level, target.block),
            level_orientation(target.level),
            Vec3::NEG_Y * speed,
        )?;

        let solo = [placed];
        let mut settled = false;
        let mut collapse = None;
        let mut steps = 0;
        while steps < config.placement_steps {
            world.step()?;
            steps += 1;

            if !settled && world.speed(placed)? < config.settle_speed {
                settled = true;
            }

            if let Some(id) = world.first_below_floor(&[])? {
                collapse = Some((CollapseReason::TowerFell, Some(id)));
                break;
            }
            let sag_exclude: &[BlockId] = if settled { &[] } else { &solo };
            if world.has_sagged(sag_exclude)? {
                collapse = Some((CollapseReason::TowerFell, Some(placed)));
                break;
            }
            if let Some(id) = world.first_fallen(&solo)? {
                collapse = Some((CollapseReason::NonMovedBlockFell, Some(id)));
                break;
            }
        }

        Ok(Run {
            collapse,
            impact: world.peak_impact(placed)?,
            steps,
        })
    }

    // =========================================================================
    // REMOVAL
    // =========================================================================

    /// Simulate the tower after `removed` was pulled from `slot`.
    ///
    /// `impulse` is the pull velocity before accuracy scaling; it defaults
    /// to an outward pull along the block's long axis with a little lift.
    /// Errors when `slot` is not an empty slot of `tower_after_remove` or
    /// `removed` is still in the tower.
    pub fn simulate_removal(
        &self,
        tower_after_remove: &Tower,
        removed: BlockId,
        slot: RemoveSlot,
        impulse: Option<Vec3>,
        accuracy: Option<f32>,
    ) -> Result<SimulationVerdict, TowerError> {
        check_vacated(tower_after_remove, removed, slot)?;

        let stability = self.stability(tower_after_remove);
        let profile = self.profile(accuracy);

        if profile.skip_simulation {
            let mut verdict = SimulationVerdict::stable(stability);
            self.gate(&mut verdict, &profile, removed);
            debug!(removed, stability, collapsed = verdict.collapsed, "removal skipped physics");
            return Ok(verdict);
        }

        let verdict = match self.run_removal(tower_after_remove, removed, slot, impulse, &profile) {
            Ok(run) => {
                let mut verdict = SimulationVerdict::stable(stability);
                verdict.simulated = true;
                verdict.steps = run.steps;
                if let Some((reason, block)) = run.collapse {
                    verdict.collapse(reason, block);
                }
                self.gate(&mut verdict, &profile, removed);
                verdict
            }
            Err(err) => self.fallback(MoveKind::Remove, &err, stability, &profile),
        };

        debug!(
            removed,
            level = slot.level,
            slot = slot.block,
            steps = verdict.steps,
            collapsed = verdict.collapsed,
            "removal simulated"
        );
        Ok(verdict)
    }

    fn run_removal(
        &self,
        tower: &Tower,
        removed: BlockId,
        slot: RemoveSlot,
        impulse: Option<Vec3>,
        profile: &AccuracyProfile,
    ) -> Result<Run, PhysicsError> {
        let config = &self.physics;
        let dynamic_from = self.window_start(tower, slot.level);
        let mut world = PhysicsWorld::<B>::from_tower(tower, dynamic_from, config)?;

        let orientation = level_orientation(slot.level);
        let long = orientation.long_axis();
        let pull = impulse.unwrap_or(long * config.pull_speed + Vec3::Y * config.pull_lift)
            * profile.impulse_multiplier;
        let outward = if pull.dot(long) < 0.0 { -long } else { long };

        world.spawn(
            removed,
            slot_center(slot.level, slot.block) + outward * config.pull_clearance,
            orientation,
            pull,
        )?;

        // Friction from the pulled block drags whatever rested on it.
        let drag = Vec3::new(pull.x, 0.0, pull.z) * config.pull_drag;
        for above in 0..SLOTS_PER_LEVEL {
            if let Some(id) = tower.block_at(slot.level + 1, above) {
                world.add_velocity(id, drag)?;
            }
        }

        let budget = if profile.extended_steps {
            config.removal_steps_extended
        } else {
            config.removal_steps
        };
        let exclude = [removed];

        let mut collapse = None;
        let mut steps = 0;
        while steps < budget {
            world.step()?;
            steps += 1;

            if let Some(id) = world.first_below_floor(&exclude)? {
                collapse = Some((CollapseReason::TowerFell, Some(id)));
                break;
            }
            if world.has_sagged(&exclude)? {
                collapse = Some((CollapseReason::TowerFell, None));
                break;
            }
            if let Some(id) = world.first_fallen(&exclude)? {
                collapse = Some((CollapseReason::NonMovedBlockFell, Some(id)));
                break;
            }
        }

        Ok(Run {
            collapse,
            impact: 0.0,
            steps,
        })
    }

    // =========================================================================
    // PUSH
    // =========================================================================

    /// Simulate tapping the block at `block_position` out of the tower.
    ///
    /// The block is respawned `push_offset` units outside the tower along
    /// `direction` (projected onto the ground plane; the block's long axis
    /// when that is degenerate) and launched with `strength` in [0, 1].
    /// It is a hit if it touches any other block before dropping clear.
    pub fn simulate_push(
        &self,
        tower: &Tower,
        block_position: SlotRef,
        direction: Vec3,
        strength: f32,
    ) -> Result<PushVerdict, TowerError> {
        let removal = tower.remove_block(block_position)?;
        let stability = self.stability(&removal.tower);
        let direction = Vec3::new(direction.x, 0.0, direction.z)
            .try_normalize()
            .unwrap_or_else(|| removal.orientation.long_axis());
        let strength = if strength.is_nan() { 0.0 } else { strength.clamp(0.0, 1.0) };

        let verdict = match self.run_push(&removal.tower, removal.block_id, block_position, direction, strength) {
            Ok(mut verdict) => {
                verdict.stability = stability;
                verdict
            }
            Err(err) => {
                let profile = AccuracyProfile::baseline(&self.accuracy);
                let decided = self.fallback(MoveKind::Push, &err, stability, &profile);
                PushVerdict {
                    hit_tower: decided.collapsed,
                    hit_block: None,
                    tower_fell: false,
                    reason: decided.reason,
                    failed_block: None,
                    stability,
                    steps: 0,
                    fallback: true,
                }
            }
        };

        debug!(
            block = removal.block_id,
            level = block_position.level,
            slot = block_position.block,
            strength,
            hit = verdict.hit_tower,
            tower_fell = verdict.tower_fell,
            "push simulated"
        );
        Ok(verdict)
    }

    fn run_push(
        &self,
        tower: &Tower,
        pushed: BlockId,
        slot: SlotRef,
        direction: Vec3,
        strength: f32,
    ) -> Result<PushVerdict, PhysicsError> {
        let config = &self.physics;
        let dynamic_from = self.window_start(tower, slot.level);
        let mut world = PhysicsWorld::<B>::from_tower(tower, dynamic_from, config)?;

        let orientation = level_orientation(slot.level);
        let center = slot_center(slot.level, slot.block);
        let exit = footprint_exit(center, orientation.half_extents(), direction);
        world.spawn(
            pushed,
            center + direction * (exit + config.push_offset),
            orientation,
            direction * (config.push_speed * strength),
        )?;

        let mut verdict = PushVerdict {
            hit_tower: false,
            hit_block: None,
            tower_fell: false,
            reason: None,
            failed_block: None,
            stability: 0.0,
            steps: 0,
            fallback: false,
        };
        let exclude = [pushed];
        let mut cleared = false;

        while verdict.steps < config.push_steps {
            world.step()?;
            verdict.steps += 1;

            if !cleared {
                if let Some(&hit) = world.touching(pushed)?.first() {
                    verdict.hit_tower = true;
                    verdict.hit_block = Some(hit);
                    break;
                }
                let on_ground =
                    world.position(pushed)?.y <= BLOCK_HALF_HEIGHT + config.support_gap;
                cleared = on_ground || world.has_fallen(pushed)?;
            }

            let fell = if let Some(id) = world.first_below_floor(&exclude)? {
                Some((CollapseReason::TowerFell, Some(id)))
            } else if world.has_sagged(&exclude)? {
                Some((CollapseReason::TowerFell, None))
            } else {
                world
                    .first_fallen(&exclude)?
                    .map(|id| (CollapseReason::NonMovedBlockFell, Some(id)))
            };
            if let Some((reason, block)) = fell {
                verdict.tower_fell = true;
                verdict.reason = Some(reason);
                verdict.failed_block = block;
                break;
            }
        }

        Ok(verdict)
    }

    // =========================================================================
    // REPLACE
    // =========================================================================

    /// Simulate `tower` with every body dynamic: does it stand on its own?
    pub fn simulate_replace(&self, tower: &Tower) -> SimulationVerdict {
        let stability = self.stability(tower);
        let profile = AccuracyProfile::baseline(&self.accuracy);

        let verdict = match self.run_replace(tower) {
            Ok(run) => {
                let mut verdict = SimulationVerdict::stable(stability);
                verdict.simulated = true;
                verdict.steps = run.steps;
                if let Some((reason, block)) = run.collapse {
                    verdict.collapse(reason, block);
                }
                verdict
            }
            Err(err) => self.fallback(MoveKind::Replace, &err, stability, &profile),
        };

        debug!(
            blocks = tower.block_count(),
            steps = verdict.steps,
            collapsed = verdict.collapsed,
            "replace simulated"
        );
        verdict
    }

    fn run_replace(&self, tower: &Tower) -> Result<Run, PhysicsError> {
        let config = &self.physics;
        let mut world = PhysicsWorld::<B>::from_tower(tower, 0, config)?;

        let mut collapse = None;
        let mut steps = 0;
        while steps < config.replace_steps {
            world.step()?;
            steps += 1;

            if let Some(id) = world.first_below_floor(&[])? {
                collapse = Some((CollapseReason::TowerFell, Some(id)));
                break;
            }
            if world.has_sagged(&[])? {
                collapse = Some((CollapseReason::TowerFell, None));
                break;
            }
            if let Some(id) = world.first_fallen(&[])? {
                collapse = Some((CollapseReason::NonMovedBlockFell, Some(id)));
                break;
            }
        }

        Ok(Run {
            collapse,
            impact: 0.0,
            steps,
        })
    }

    /// Would putting `block_id` back into `removed_from` bring the tower
    /// down? Always true when the slot is taken or otherwise unusable.
    pub fn would_replace_cause_fall(
        &self,
        tower: &Tower,
        block_id: BlockId,
        removed_from: RemoveSlot,
    ) -> bool {
        match tower.with_block_at(removed_from, block_id) {
            Ok(candidate) => self.simulate_replace(&candidate).collapsed,
            Err(err) => {
                debug!(block_id, %removed_from, error = %err, "replace target unusable");
                true
            }
        }
    }
}

/// `slot` must be an empty, addressable slot and `removed` must be out of
/// the tower.
fn check_vacated(tower: &Tower, removed: BlockId, slot: RemoveSlot) -> Result<(), TowerError> {
    if slot.row >= ROWS_PER_LEVEL || slot.block >= SLOTS_PER_LEVEL {
        return Err(TowerError::OutOfBounds(slot));
    }
    if let Some(occupant) = tower.block_at(slot.level, slot.block) {
        return Err(TowerError::SlotOccupied { slot, occupant });
    }
    if tower.find_block(removed).is_some() {
        return Err(TowerError::DuplicateBlock(removed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::backend::{BodyDesc, BodyHandle};

    /// Backend whose every step fails.
    struct FaultyBackend;

    impl PhysicsBackend for FaultyBackend {
        fn create(_: &PhysicsConfig) -> Self {
            FaultyBackend
        }
        fn add_body(&mut self, _: BodyDesc) -> Result<BodyHandle, PhysicsError> {
            Ok(0)
        }
        fn set_velocity(&mut self, _: BodyHandle, _: Vec3) -> Result<(), PhysicsError> {
            Ok(())
        }
        fn step(&mut self, _: f32) -> Result<(), PhysicsError> {
            Err(PhysicsError::Backend("solver diverged".into()))
        }
        fn position(&self, _: BodyHandle) -> Result<Vec3, PhysicsError> {
            Ok(Vec3::ZERO)
        }
        fn velocity(&self, _: BodyHandle) -> Result<Vec3, PhysicsError> {
            Ok(Vec3::ZERO)
        }
        fn contacts(&self, _: BodyHandle) -> Result<Vec<BodyHandle>, PhysicsError> {
            Ok(Vec::new())
        }
        fn peak_impact(&self, _: BodyHandle) -> Result<f32, PhysicsError> {
            Ok(0.0)
        }
    }

    /// Backend that panics if stepped.
    struct NeverStep;

    impl PhysicsBackend for NeverStep {
        fn create(_: &PhysicsConfig) -> Self {
            NeverStep
        }
        fn add_body(&mut self, _: BodyDesc) -> Result<BodyHandle, PhysicsError> {
            Ok(0)
        }
        fn set_velocity(&mut self, _: BodyHandle, _: Vec3) -> Result<(), PhysicsError> {
            Ok(())
        }
        fn step(&mut self, _: f32) -> Result<(), PhysicsError> {
            panic!("step loop must not run");
        }
        fn position(&self, _: BodyHandle) -> Result<Vec3, PhysicsError> {
            Ok(Vec3::ZERO)
        }
        fn velocity(&self, _: BodyHandle) -> Result<Vec3, PhysicsError> {
            Ok(Vec3::ZERO)
        }
        fn contacts(&self, _: BodyHandle) -> Result<Vec<BodyHandle>, PhysicsError> {
            Ok(Vec::new())
        }
        fn peak_impact(&self, _: BodyHandle) -> Result<f32, PhysicsError> {
            Ok(0.0)
        }
    }

    fn sim() -> Simulator {
        Simulator::default()
    }

    fn remove(tower: &Tower, level: usize, slot: usize) -> (Tower, BlockId, SlotRef) {
        let removal = tower.remove_block(SlotRef::new(level, slot)).unwrap();
        (removal.tower, removal.block_id, removal.from)
    }

    /// Tower with slot 0 of level 5 already pulled.
    fn edge_only_level() -> Tower {
        let (tower, _, _) = remove(&Tower::initialize(), 5, 0);
        tower
    }

    #[test]
    fn test_clean_removal_holds() {
        let (tower, id, from) = remove(&Tower::initialize(), 5, 1);
        let verdict = sim().simulate_removal(&tower, id, from, None, Some(60.0)).unwrap();
        assert!(verdict.simulated);
        assert!(!verdict.collapsed, "{verdict:?}");
        assert_eq!(verdict.steps, 40);
        assert_eq!(verdict.stability, 88.0);
    }

    #[test]
    fn test_poor_removal_runs_longer() {
        let (tower, id, from) = remove(&Tower::initialize(), 5, 1);
        let verdict = sim().simulate_removal(&tower, id, from, None, Some(20.0)).unwrap();
        assert!(!verdict.collapsed, "{verdict:?}");
        assert_eq!(verdict.steps, 60);
    }

    #[test]
    fn test_removal_leaving_edge_collapses() {
        let (tower, id, from) = remove(&edge_only_level(), 5, 1);
        let verdict = sim().simulate_removal(&tower, id, from, None, Some(60.0)).unwrap();
        assert!(verdict.collapsed);
        assert!(matches!(
            verdict.reason,
            Some(CollapseReason::NonMovedBlockFell) | Some(CollapseReason::TowerFell)
        ));
        assert!(verdict.steps < 40);
    }

    #[test]
    fn test_perfect_removal_skips_physics() {
        let (tower, id, from) = remove(&edge_only_level(), 5, 1);
        let sim = Simulator::<NeverStep>::with_backend(&EngineConfig::default());
        let verdict = sim.simulate_removal(&tower, id, from, None, Some(95.0)).unwrap();
        assert!(!verdict.simulated);
        // Stability 68 is above the perfect-path floor of 30.
        assert!(!verdict.collapsed);
    }

    #[test]
    fn test_removal_preconditions() {
        let tower = Tower::initialize();
        let err = sim()
            .simulate_removal(&tower, 100, SlotRef::new(3, 1), None, None)
            .unwrap_err();
        assert!(matches!(err, TowerError::SlotOccupied { .. }));

        let (after, _, from) = remove(&tower, 3, 1);
        let err = sim().simulate_removal(&after, 0, from, None, None).unwrap_err();
        assert_eq!(err, TowerError::DuplicateBlock(0));
    }

    #[test]
    fn test_placement_on_fresh_tower_holds() {
        let (tower, id, _) = remove(&Tower::initialize(), 5, 1);
        let verdict = sim().simulate_placement(&tower, id, Some(60.0)).unwrap();
        assert!(verdict.simulated);
        assert!(!verdict.collapsed, "{verdict:?}");
        assert!(verdict.impact > 0.4);
        assert_eq!(verdict.steps, 120);
    }

    #[test]
    fn test_good_placement_is_gentler() {
        let (tower, id, _) = remove(&Tower::initialize(), 5, 1);
        let good = sim().simulate_placement(&tower, id, Some(80.0)).unwrap();
        let poor = sim().simulate_placement(&tower, id, Some(10.0)).unwrap();
        assert!(good.impact < poor.impact);
    }

    #[test]
    fn test_perfect_placement_skips_physics() {
        let (tower, id, _) = remove(&Tower::initialize(), 5, 1);
        let sim = Simulator::<NeverStep>::with_backend(&EngineConfig::default());
        let verdict = sim.simulate_placement(&tower, id, Some(100.0)).unwrap();
        assert!(!verdict.simulated);
        assert!(!verdict.collapsed);
    }

    #[test]
    fn test_perfect_placement_fails_on_critical_tower() {
        // Every level above 0 hangs off one edge.
        let mut levels = vec![[Some(0), Some(1), Some(2)]];
        for i in 0..6u32 {
            levels.push([None, None, Some(10 + i)]);
            levels.push([Some(20 + i), None, None]);
        }
        let tower = Tower::from_levels(levels).unwrap();
        let sim = Simulator::<NeverStep>::with_backend(&EngineConfig::default());
        let verdict = sim.simulate_placement(&tower, 99, Some(95.0)).unwrap();
        assert!(verdict.stability < 30.0);
        assert!(verdict.collapsed);
        assert_eq!(verdict.reason, Some(CollapseReason::Unstable));
    }

    #[test]
    fn test_poor_placement_uses_stricter_threshold() {
        // Three middles gone, then a lone block on top: stability 56.
        let mut tower = Tower::initialize();
        for level in [5, 8, 11] {
            tower = remove(&tower, level, 1).0;
        }
        let stability = sim().stability(&tower.place_block(16).unwrap().0);
        assert_eq!(stability, 56.0);

        let fine = sim().simulate_placement(&tower, 16, Some(60.0)).unwrap();
        assert!(!fine.collapsed, "{fine:?}");

        let poor = sim().simulate_placement(&tower, 16, Some(10.0)).unwrap();
        assert!(poor.collapsed);
        assert_eq!(poor.reason, Some(CollapseReason::Unstable));
        assert_eq!(poor.failed_block, Some(16));
    }

    #[test]
    fn test_fallback_on_backend_fault() {
        let sim = Simulator::<FaultyBackend>::with_backend(&EngineConfig::default());
        let (tower, id, from) = remove(&Tower::initialize(), 5, 1);

        let verdict = sim.simulate_removal(&tower, id, from, None, Some(60.0)).unwrap();
        assert!(verdict.fallback);
        assert!(!verdict.collapsed);

        let verdict = sim.simulate_placement(&tower, id, Some(60.0)).unwrap();
        assert!(verdict.fallback);
        assert!(!verdict.collapsed);

        let verdict = sim.simulate_replace(&Tower::initialize());
        assert!(verdict.fallback);
        assert!(!verdict.collapsed);

        let push = sim
            .simulate_push(&Tower::initialize(), SlotRef::new(4, 1), Vec3::X, 0.5)
            .unwrap();
        assert!(push.fallback);
        assert!(!push.hit_tower);
    }

    #[test]
    fn test_fallback_tightened_for_poor_accuracy() {
        // Stability 56: fine at the default threshold, not at the poor one.
        let sim = Simulator::<FaultyBackend>::with_backend(&EngineConfig::default());
        let (tower, id, from) = remove(&Tower::initialize(), 5, 1);
        let (tower, _, _) = remove(&tower, 5, 2);
        let (tower, _, _) = remove(&tower, 8, 1);

        let ok = sim.simulate_removal(&tower, id, from, None, Some(60.0)).unwrap();
        assert!(ok.fallback && !ok.collapsed);
        assert_eq!(ok.stability, 56.0);

        let strict = sim.simulate_removal(&tower, id, from, None, Some(0.0)).unwrap();
        assert!(strict.fallback && strict.collapsed);
        assert_eq!(strict.reason, Some(CollapseReason::Unstable));
    }

    #[test]
    fn test_push_clean_from_offset_spawn() {
        let tower = Tower::initialize();
        for slot in 0..3 {
            for direction in [Vec3::X, Vec3::NEG_X, Vec3::Z, Vec3::NEG_Z] {
                let verdict = sim()
                    .simulate_push(&tower, SlotRef::new(6, slot), direction, 1.0)
                    .unwrap();
                assert!(!verdict.hit_tower, "slot {slot} dir {direction:?}: {verdict:?}");
                assert!(!verdict.tower_fell);
                assert!(verdict.is_clean());
            }
        }
    }

    #[test]
    fn test_push_diagonal_clean_at_any_strength() {
        let tower = Tower::initialize();
        let diagonals = [
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(-1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, -1.0),
        ];
        for slot in 0..3 {
            for direction in diagonals {
                for strength in [0.0, 1.0] {
                    let verdict = sim()
                        .simulate_push(&tower, SlotRef::new(6, slot), direction, strength)
                        .unwrap();
                    assert!(verdict.is_clean(), "slot {slot} dir {direction:?} strength {strength}: {verdict:?}");
                }
            }
        }
    }

    #[test]
    fn test_push_spawned_inside_footprint_hits_neighbours() {
        // Pull the spawn point back to the slot itself.
        let mut config = EngineConfig::default();
        config.physics.push_offset = -3.0;
        let sim = Simulator::new(&config);
        let verdict = sim
            .simulate_push(&Tower::initialize(), SlotRef::new(6, 1), Vec3::X, 0.2)
            .unwrap();
        assert!(verdict.hit_tower);
        assert!(verdict.hit_block.is_some());
    }

    #[test]
    fn test_push_degenerate_direction_uses_long_axis() {
        let verdict = sim()
            .simulate_push(&Tower::initialize(), SlotRef::new(3, 0), Vec3::Y, f32::NAN)
            .unwrap();
        assert!(!verdict.hit_tower);
    }

    #[test]
    fn test_push_empty_slot_is_precondition_error() {
        let (tower, _, from) = remove(&Tower::initialize(), 4, 1);
        let err = sim().simulate_push(&tower, from, Vec3::X, 1.0).unwrap_err();
        assert_eq!(err, TowerError::EmptySlot(from));
    }

    #[test]
    fn test_replace_into_original_slot_holds() {
        let (tower, id, from) = remove(&Tower::initialize(), 5, 1);
        assert!(!sim().would_replace_cause_fall(&tower, id, from));
    }

    #[test]
    fn test_replace_into_occupied_slot_fails() {
        let (tower, id, _) = remove(&Tower::initialize(), 5, 1);
        assert!(sim().would_replace_cause_fall(&tower, id, SlotRef::new(5, 0)));
    }

    #[test]
    fn test_replace_of_overhanging_tower_fails() {
        // Level 2 hangs off the edge of level 1.
        let tower = Tower::from_levels(vec![
            [Some(0), Some(1), Some(2)],
            [None, None, Some(5)],
            [Some(6), Some(7), Some(8)],
        ])
        .unwrap();
        let verdict = sim().simulate_replace(&tower);
        assert!(verdict.collapsed, "{verdict:?}");
    }

    #[test]
    fn test_simulator_is_thread_safe() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Simulator>();
    }
}
