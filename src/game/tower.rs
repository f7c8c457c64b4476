//! Tower Geometry & State
//!
//! The block grid and slot arithmetic. No physics lives here.
//!
//! Every mutation returns a new [`Tower`]; the receiver is never touched, so a
//! rejected or failed simulated move cannot corrupt the tower the host holds.
//! Levels are fixed-size slot arrays, so a clone is one flat copy with no
//! shared backing storage.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::geometry::{Orientation, INITIAL_LEVELS, ROWS_PER_LEVEL, SLOTS_PER_LEVEL};
use crate::core::hash::{StateHash, StateHasher};

/// Identifier of one physical block (0..54 in a standard tower).
pub type BlockId = u32;

/// One level: three slots, each empty or holding a block.
pub type Level = [Option<BlockId>; SLOTS_PER_LEVEL];

// =============================================================================
// SLOT REFERENCE
// =============================================================================

/// A `(level, row, block)` position in the tower.
///
/// `row` is kept for compatibility with hosts that address a multi-row
/// layout; only row 0 exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    /// Level index, 0 at the bottom.
    pub level: usize,
    /// Row within the level (always 0).
    #[serde(default)]
    pub row: usize,
    /// Slot index within the row (0..3).
    pub block: usize,
}

impl SlotRef {
    /// Slot on row 0.
    pub const fn new(level: usize, block: usize) -> Self {
        Self { level, row: 0, block }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.level, self.row, self.block)
    }
}

/// Where a held block came from, remembered so it can be put back.
pub type RemoveSlot = SlotRef;

// =============================================================================
// ERRORS
// =============================================================================

/// Precondition violations: the caller's bookkeeping is wrong.
///
/// These are distinct from rule rejections (see `RuleViolation`); hitting one
/// means the host asked for something that cannot exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TowerError {
    /// Slot outside the tower.
    #[error("slot {0} is out of bounds")]
    OutOfBounds(SlotRef),

    /// Slot holds no block.
    #[error("slot {0} is empty")]
    EmptySlot(SlotRef),

    /// Slot already holds a block.
    #[error("slot {slot} is already occupied by block {occupant}")]
    SlotOccupied {
        /// Target slot.
        slot: SlotRef,
        /// Block currently there.
        occupant: BlockId,
    },

    /// Block id already present elsewhere in the tower.
    #[error("block {0} is already in the tower")]
    DuplicateBlock(BlockId),

    /// Serialized tower could not be interpreted.
    #[error("malformed tower: {0}")]
    Malformed(String),
}

// =============================================================================
// FORBIDDEN LEVELS
// =============================================================================

/// Levels from which removal is currently disallowed.
///
/// At most two levels, so this stays on the stack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForbiddenLevels {
    top: Option<usize>,
    below_top: Option<usize>,
}

impl ForbiddenLevels {
    /// Whether `level` is forbidden.
    #[inline]
    pub fn contains(&self, level: usize) -> bool {
        self.top == Some(level) || self.below_top == Some(level)
    }

    /// Forbidden levels, highest first.
    pub fn iter(&self) -> impl Iterator<Item = usize> {
        self.top.into_iter().chain(self.below_top)
    }

    /// Number of forbidden levels.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// True when no level is forbidden (empty tower).
    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }
}

// =============================================================================
// REMOVAL
// =============================================================================

/// Result of taking a block out of the tower.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Removal {
    /// Tower with the slot emptied.
    pub tower: Tower,
    /// The block now in hand.
    pub block_id: BlockId,
    /// Orientation of the level it came from.
    pub orientation: Orientation,
    /// Slot to remember for a later replace.
    pub from: RemoveSlot,
}

// =============================================================================
// TOWER
// =============================================================================

/// The block tower.
///
/// Invariants kept by every constructor and mutation:
/// - each block id appears at most once;
/// - the level list never ends with an empty level.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TowerLevels", into = "TowerLevels")]
pub struct Tower {
    levels: Vec<Level>,
}

/// Wire form of a [`Tower`]; decoding goes through [`Tower::from_levels`].
#[derive(Serialize, Deserialize)]
struct TowerLevels {
    levels: Vec<Level>,
}

impl TryFrom<TowerLevels> for Tower {
    type Error = TowerError;

    fn try_from(raw: TowerLevels) -> Result<Self, Self::Error> {
        Tower::from_levels(raw.levels)
    }
}

impl From<Tower> for TowerLevels {
    fn from(tower: Tower) -> Self {
        Self { levels: tower.levels }
    }
}

/// Orientation of `level`: even levels horizontal, odd vertical.
#[inline]
pub fn level_orientation(level: usize) -> Orientation {
    Orientation::for_level(level)
}

impl Default for Tower {
    fn default() -> Self {
        Self::initialize()
    }
}

impl Tower {
    /// Standard 18-level tower, `BlockId = level * 3 + slot`.
    pub fn initialize() -> Self {
        let levels = (0..INITIAL_LEVELS)
            .map(|level| {
                let base = (level * SLOTS_PER_LEVEL) as BlockId;
                [Some(base), Some(base + 1), Some(base + 2)]
            })
            .collect();
        Self { levels }
    }

    /// Tower with no blocks.
    pub fn empty() -> Self {
        Self { levels: Vec::new() }
    }

    /// Build from explicit levels, checking block uniqueness.
    pub fn from_levels(levels: Vec<Level>) -> Result<Self, TowerError> {
        let mut seen = std::collections::BTreeSet::new();
        for id in levels.iter().flatten().flatten() {
            if !seen.insert(*id) {
                return Err(TowerError::DuplicateBlock(*id));
            }
        }
        let mut tower = Self { levels };
        tower.trim();
        Ok(tower)
    }

    /// Raw levels, bottom first.
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Number of stored levels (top level + 1, or 0 when empty).
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Block at `(level, slot)`; `None` when empty or out of range.
    #[inline]
    pub fn block_at(&self, level: usize, slot: usize) -> Option<BlockId> {
        self.levels.get(level).and_then(|l| l.get(slot).copied().flatten())
    }

    /// Checked lookup of a slot's contents.
    pub fn get(&self, slot: SlotRef) -> Result<Option<BlockId>, TowerError> {
        self.check_bounds(slot)?;
        Ok(self.levels[slot.level][slot.block])
    }

    /// Occupied slot count on `level`.
    pub fn occupied_count(&self, level: usize) -> usize {
        self.levels
            .get(level)
            .map_or(0, |l| l.iter().filter(|s| s.is_some()).count())
    }

    /// Total blocks in the tower.
    pub fn block_count(&self) -> usize {
        self.levels.iter().flatten().filter(|s| s.is_some()).count()
    }

    /// All occupied slots with their blocks, bottom-up.
    pub fn blocks(&self) -> impl Iterator<Item = (SlotRef, BlockId)> + '_ {
        self.levels.iter().enumerate().flat_map(|(level, slots)| {
            slots
                .iter()
                .enumerate()
                .filter_map(move |(block, id)| id.map(|id| (SlotRef::new(level, block), id)))
        })
    }

    /// Where `id` sits, if it is in the tower.
    pub fn find_block(&self, id: BlockId) -> Option<SlotRef> {
        self.blocks().find(|(_, b)| *b == id).map(|(slot, _)| slot)
    }

    /// Highest level with any occupied slot; `None` for an empty tower.
    pub fn top_level(&self) -> Option<usize> {
        self.levels
            .iter()
            .rposition(|l| l.iter().any(Option::is_some))
    }

    /// True iff the top level holds exactly one or two blocks.
    pub fn is_top_incomplete(&self) -> bool {
        match self.top_level() {
            Some(top) => {
                let n = self.occupied_count(top);
                n > 0 && n < SLOTS_PER_LEVEL
            }
            None => false,
        }
    }

    /// The top level, plus the one below it when the top is incomplete.
    pub fn forbidden_removal_levels(&self) -> ForbiddenLevels {
        let Some(top) = self.top_level() else {
            return ForbiddenLevels::default();
        };
        let below_top = if self.is_top_incomplete() {
            top.checked_sub(1)
        } else {
            None
        };
        ForbiddenLevels {
            top: Some(top),
            below_top,
        }
    }

    /// In bounds, occupied, and not on a forbidden level.
    pub fn is_removal_legal(&self, slot: SlotRef) -> bool {
        matches!(self.get(slot), Ok(Some(_)))
            && !self.forbidden_removal_levels().contains(slot.level)
    }

    /// Empty a slot and hand back the block.
    ///
    /// Does not check game legality; see [`Tower::is_removal_legal`].
    pub fn remove_block(&self, slot: SlotRef) -> Result<Removal, TowerError> {
        let block_id = self.get(slot)?.ok_or(TowerError::EmptySlot(slot))?;

        let mut tower = self.clone();
        tower.levels[slot.level][slot.block] = None;
        tower.trim();

        Ok(Removal {
            tower,
            block_id,
            orientation: level_orientation(slot.level),
            from: slot,
        })
    }

    /// Slot the next placed block goes to.
    ///
    /// The first empty slot on the top level that has a block directly below
    /// it at the same index; otherwise slot 0 of a new level.
    pub fn place_target(&self) -> SlotRef {
        let Some(top) = self.top_level() else {
            return SlotRef::new(0, 0);
        };
        let supported = |slot: usize| top == 0 || self.block_at(top - 1, slot).is_some();

        (0..SLOTS_PER_LEVEL)
            .find(|&slot| self.block_at(top, slot).is_none() && supported(slot))
            .map(|slot| SlotRef::new(top, slot))
            .unwrap_or(SlotRef::new(top + 1, 0))
    }

    /// Write `id` into [`Tower::place_target`].
    pub fn place_block(&self, id: BlockId) -> Result<(Tower, SlotRef), TowerError> {
        let target = self.place_target();
        let tower = self.with_block_at(target, id)?;
        Ok((tower, target))
    }

    /// Write `id` into an empty slot, growing the tower by one level if the
    /// slot is directly above the current top.
    pub fn with_block_at(&self, slot: SlotRef, id: BlockId) -> Result<Tower, TowerError> {
        if slot.row >= ROWS_PER_LEVEL
            || slot.block >= SLOTS_PER_LEVEL
            || slot.level > self.levels.len()
        {
            return Err(TowerError::OutOfBounds(slot));
        }
        if let Some(occupant) = self.block_at(slot.level, slot.block) {
            return Err(TowerError::SlotOccupied { slot, occupant });
        }
        if self.find_block(id).is_some() {
            return Err(TowerError::DuplicateBlock(id));
        }

        let mut tower = self.clone();
        if slot.level == tower.levels.len() {
            tower.levels.push([None; SLOTS_PER_LEVEL]);
        }
        tower.levels[slot.level][slot.block] = Some(id);
        Ok(tower)
    }

    /// Hash of the layout.
    pub fn compute_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_tower();
        hasher.update_u32(self.levels.len() as u32);
        for level in &self.levels {
            for slot in level {
                hasher.update_opt_u32(*slot);
            }
        }
        hasher.finalize()
    }

    fn check_bounds(&self, slot: SlotRef) -> Result<(), TowerError> {
        if slot.level < self.levels.len()
            && slot.row < ROWS_PER_LEVEL
            && slot.block < SLOTS_PER_LEVEL
        {
            Ok(())
        } else {
            Err(TowerError::OutOfBounds(slot))
        }
    }

    fn trim(&mut self) {
        while self
            .levels
            .last()
            .is_some_and(|l| l.iter().all(Option::is_none))
        {
            self.levels.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize() {
        let tower = Tower::initialize();
        assert_eq!(tower.level_count(), 18);
        assert_eq!(tower.block_count(), 54);
        assert_eq!(tower.top_level(), Some(17));
        assert_eq!(tower.block_at(5, 2), Some(17));
        assert!(!tower.is_top_incomplete());
    }

    #[test]
    fn test_empty_tower() {
        let tower = Tower::empty();
        assert_eq!(tower.top_level(), None);
        assert!(tower.forbidden_removal_levels().is_empty());
        assert_eq!(tower.place_target(), SlotRef::new(0, 0));
    }

    #[test]
    fn test_forbidden_levels_complete_top() {
        let tower = Tower::initialize();
        let forbidden = tower.forbidden_removal_levels();
        assert!(forbidden.contains(17));
        assert!(!forbidden.contains(16));
        assert_eq!(forbidden.len(), 1);
    }

    #[test]
    fn test_forbidden_levels_incomplete_top() {
        let tower = Tower::initialize();
        let (tower, at) = tower.place_block(100).unwrap();
        assert_eq!(at, SlotRef::new(18, 0));
        assert!(tower.is_top_incomplete());

        let forbidden: Vec<_> = tower.forbidden_removal_levels().iter().collect();
        assert_eq!(forbidden, vec![18, 17]);
        assert!(!tower.is_removal_legal(SlotRef::new(17, 1)));
        assert!(tower.is_removal_legal(SlotRef::new(16, 1)));
    }

    #[test]
    fn test_remove_block() {
        let tower = Tower::initialize();
        let removal = tower.remove_block(SlotRef::new(3, 1)).unwrap();
        assert_eq!(removal.block_id, 10);
        assert_eq!(removal.orientation, Orientation::Vertical);
        assert_eq!(removal.from, SlotRef::new(3, 1));
        assert_eq!(removal.tower.block_at(3, 1), None);

        // Original untouched
        assert_eq!(tower.block_at(3, 1), Some(10));
    }

    #[test]
    fn test_remove_empty_slot_is_precondition_error() {
        let tower = Tower::initialize();
        let removal = tower.remove_block(SlotRef::new(3, 1)).unwrap();
        let err = removal.tower.remove_block(SlotRef::new(3, 1)).unwrap_err();
        assert_eq!(err, TowerError::EmptySlot(SlotRef::new(3, 1)));

        let err = tower.remove_block(SlotRef::new(40, 0)).unwrap_err();
        assert!(matches!(err, TowerError::OutOfBounds(_)));

        let err = tower
            .remove_block(SlotRef { level: 1, row: 1, block: 0 })
            .unwrap_err();
        assert!(matches!(err, TowerError::OutOfBounds(_)));
    }

    #[test]
    fn test_remove_trims_empty_top() {
        let (tower, at) = Tower::initialize().place_block(99).unwrap();
        let removal = tower.remove_block(at).unwrap();
        assert_eq!(removal.tower, Tower::initialize());
    }

    #[test]
    fn test_place_target_fills_supported_gap() {
        let (tower, _) = Tower::initialize().place_block(60).unwrap();
        assert_eq!(tower.place_target(), SlotRef::new(18, 1));

        // Knock out support under slot 1: slot 2 is next.
        let tower = Tower::from_levels(vec![
            [Some(0), None, Some(2)],
            [Some(3), None, None],
        ])
        .unwrap();
        assert_eq!(tower.place_target(), SlotRef::new(1, 2));
    }

    #[test]
    fn test_place_target_new_level_when_no_supported_gap() {
        let tower = Tower::from_levels(vec![
            [Some(0), None, None],
            [Some(3), None, None],
        ])
        .unwrap();
        assert_eq!(tower.place_target(), SlotRef::new(2, 0));
    }

    #[test]
    fn test_place_duplicate_rejected() {
        let tower = Tower::initialize();
        let err = tower.place_block(5).unwrap_err();
        assert_eq!(err, TowerError::DuplicateBlock(5));
    }

    #[test]
    fn test_with_block_at_occupied() {
        let tower = Tower::initialize();
        let err = tower.with_block_at(SlotRef::new(2, 2), 77).unwrap_err();
        assert_eq!(
            err,
            TowerError::SlotOccupied { slot: SlotRef::new(2, 2), occupant: 8 }
        );
    }

    #[test]
    fn test_from_levels_rejects_duplicates() {
        let err = Tower::from_levels(vec![[Some(1), Some(1), None]]).unwrap_err();
        assert_eq!(err, TowerError::DuplicateBlock(1));
    }

    #[test]
    fn test_hash_tracks_layout() {
        let a = Tower::initialize();
        let b = Tower::initialize();
        assert_eq!(a.compute_hash(), b.compute_hash());

        let c = a.remove_block(SlotRef::new(4, 0)).unwrap().tower;
        assert_ne!(a.compute_hash(), c.compute_hash());
    }

    #[test]
    fn test_json_rejects_duplicate_block() {
        let json = r#"{"levels":[[0,0,null],[null,null,null]]}"#;
        let err = serde_json::from_str::<Tower>(json).unwrap_err();
        assert!(err.to_string().contains("block 0"), "{err}");
    }

    #[test]
    fn test_json_trims_trailing_empty_levels() {
        let json = r#"{"levels":[[0,1,null],[null,null,null]]}"#;
        let tower: Tower = serde_json::from_str(json).unwrap();
        assert_eq!(tower.level_count(), 1);
        assert_eq!(tower.top_level(), Some(0));

        let back = serde_json::to_string(&tower).unwrap();
        assert_eq!(back, r#"{"levels":[[0,1,null]]}"#);
    }
}
