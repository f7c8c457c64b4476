//! Move Legality
//!
//! Game-rule checks that turn a requested move into either a go-ahead or a
//! specific rejection. Rejections are [`RuleViolation`]s, never
//! [`TowerError`](crate::game::tower::TowerError)s: the latter mean the host's bookkeeping is broken.

use glam::Vec3;

use crate::game::tower::{BlockId, RemoveSlot, SlotRef, Tower};
use crate::physics::backend::PhysicsBackend;
use crate::physics::simulate::{SimulationVerdict, Simulator};

/// Why a move was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    /// Removal from the top level, or the one below an incomplete top.
    #[error("level {level} is forbidden for removal")]
    ForbiddenLevel {
        /// Requested level.
        level: usize,
    },

    /// Slot outside the tower or holding no block.
    #[error("slot {0} holds no removable block")]
    InvalidSlot(SlotRef),

    /// Replace target already holds another block.
    #[error("slot {slot} is occupied by block {occupant}")]
    SlotOccupied {
        /// Target slot.
        slot: SlotRef,
        /// Block currently there.
        occupant: BlockId,
    },

    /// Putting the held block back would bring the tower down.
    #[error("replacing block {block} at {slot} would collapse the tower")]
    ReplaceWouldCollapse {
        /// Held block.
        block: BlockId,
        /// Slot it came from.
        slot: SlotRef,
    },

    /// Place or replace with nothing in hand.
    #[error("no block in hand")]
    NotHoldingBlock,

    /// Remove or push while already holding a block.
    #[error("already holding block {0}")]
    AlreadyHoldingBlock(BlockId),

    /// The tower has fallen.
    #[error("game is over")]
    GameOver,

    /// Push direction has a non-finite component.
    #[error("push direction is not finite")]
    InvalidDirection,
}

impl RuleViolation {
    /// Stable machine-readable code for hosts.
    pub fn code(&self) -> &'static str {
        match self {
            RuleViolation::ForbiddenLevel { .. } => "forbidden_level",
            RuleViolation::InvalidSlot(_) => "invalid_slot",
            RuleViolation::SlotOccupied { .. } => "slot_occupied",
            RuleViolation::ReplaceWouldCollapse { .. } => "replace_would_collapse",
            RuleViolation::NotHoldingBlock => "not_holding_block",
            RuleViolation::AlreadyHoldingBlock(_) => "already_holding_block",
            RuleViolation::GameOver => "game_over",
            RuleViolation::InvalidDirection => "invalid_direction",
        }
    }
}

/// Check that the block at `slot` may be pulled or pushed.
///
/// Forbidden level wins over an empty slot, so a host probing the top
/// level always hears why it is off limits.
pub fn validate_move(tower: &Tower, slot: RemoveSlot) -> Result<(), RuleViolation> {
    if tower.forbidden_removal_levels().contains(slot.level) {
        return Err(RuleViolation::ForbiddenLevel { level: slot.level });
    }
    match tower.get(slot) {
        Ok(Some(_)) => Ok(()),
        _ => Err(RuleViolation::InvalidSlot(slot)),
    }
}

/// Check a push direction. Zero is allowed (the block's long axis is used).
pub fn validate_direction(direction: Vec3) -> Result<(), RuleViolation> {
    if direction.is_finite() {
        Ok(())
    } else {
        Err(RuleViolation::InvalidDirection)
    }
}

/// Put a held block back where it came from, explaining any refusal.
///
/// Returns the new tower with the replace simulation that cleared it.
pub fn try_replace<B: PhysicsBackend>(
    tower: &Tower,
    simulator: &Simulator<B>,
    block: BlockId,
    removed_from: RemoveSlot,
) -> Result<(Tower, SimulationVerdict), RuleViolation> {
    if let Some(occupant) = tower.block_at(removed_from.level, removed_from.block) {
        return Err(RuleViolation::SlotOccupied {
            slot: removed_from,
            occupant,
        });
    }
    let candidate = tower
        .with_block_at(removed_from, block)
        .map_err(|_| RuleViolation::InvalidSlot(removed_from))?;

    let verdict = simulator.simulate_replace(&candidate);
    if verdict.collapsed {
        return Err(RuleViolation::ReplaceWouldCollapse {
            block,
            slot: removed_from,
        });
    }
    Ok((candidate, verdict))
}

/// Put a held block back where it came from. `None` when refused.
pub fn replace_block<B: PhysicsBackend>(
    tower: &Tower,
    simulator: &Simulator<B>,
    block: BlockId,
    removed_from: RemoveSlot,
) -> Option<Tower> {
    try_replace(tower, simulator, block, removed_from)
        .ok()
        .map(|(tower, _)| tower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_forbidden_top() {
        let tower = Tower::initialize();
        assert_eq!(
            validate_move(&tower, SlotRef::new(17, 0)),
            Err(RuleViolation::ForbiddenLevel { level: 17 })
        );
        assert_eq!(validate_move(&tower, SlotRef::new(16, 0)), Ok(()));
    }

    #[test]
    fn test_validate_invalid_slot() {
        let tower = Tower::initialize();
        let removed = tower.remove_block(SlotRef::new(4, 1)).unwrap().tower;
        assert_eq!(
            validate_move(&removed, SlotRef::new(4, 1)),
            Err(RuleViolation::InvalidSlot(SlotRef::new(4, 1)))
        );
        let bad_row = SlotRef { level: 4, row: 2, block: 0 };
        assert_eq!(validate_move(&tower, bad_row), Err(RuleViolation::InvalidSlot(bad_row)));
        assert_eq!(
            validate_move(&tower, SlotRef::new(4, 7)),
            Err(RuleViolation::InvalidSlot(SlotRef::new(4, 7)))
        );
    }

    #[test]
    fn test_new_top_forbids_level_below() {
        // A lone block on a new level also locks the full level under it.
        let (tower, _) = Tower::initialize().place_block(100).unwrap();
        assert_eq!(
            validate_move(&tower, SlotRef::new(17, 2)),
            Err(RuleViolation::ForbiddenLevel { level: 17 })
        );
        assert_eq!(validate_move(&tower, SlotRef::new(16, 2)), Ok(()));
    }

    #[test]
    fn test_direction_must_be_finite() {
        assert_eq!(validate_direction(Vec3::X), Ok(()));
        assert_eq!(validate_direction(Vec3::ZERO), Ok(()));
        assert_eq!(
            validate_direction(Vec3::new(f32::NAN, 0.0, 0.0)),
            Err(RuleViolation::InvalidDirection)
        );
    }

    #[test]
    fn test_replace_back_into_slot() {
        let sim = Simulator::default();
        let removal = Tower::initialize().remove_block(SlotRef::new(6, 1)).unwrap();
        let back = replace_block(&removal.tower, &sim, removal.block_id, removal.from).unwrap();
        assert_eq!(back, Tower::initialize());
    }

    #[test]
    fn test_replace_into_occupied_refused() {
        let sim = Simulator::default();
        let removal = Tower::initialize().remove_block(SlotRef::new(6, 1)).unwrap();
        let err = try_replace(&removal.tower, &sim, removal.block_id, SlotRef::new(6, 0))
            .unwrap_err();
        assert_eq!(
            err,
            RuleViolation::SlotOccupied { slot: SlotRef::new(6, 0), occupant: 18 }
        );
        assert_eq!(err.code(), "slot_occupied");
    }

    #[test]
    fn test_replace_that_would_collapse_refused() {
        // Level 2's only support is slot 2 of level 1; putting block 8 on
        // level 2 overhangs it.
        let tower = Tower::from_levels(vec![
            [Some(0), Some(1), Some(2)],
            [None, None, Some(5)],
            [Some(6), Some(7), None],
        ])
        .unwrap();
        let err = try_replace(&tower, &Simulator::default(), 8, SlotRef::new(2, 2)).unwrap_err();
        assert_eq!(
            err,
            RuleViolation::ReplaceWouldCollapse { block: 8, slot: SlotRef::new(2, 2) }
        );
    }
}
