//! Tower Events
//!
//! Events produced by applied moves, drained by the host for logs, replays
//! and UI.

use serde::{Deserialize, Serialize};

use crate::game::tower::{BlockId, SlotRef};
use crate::physics::simulate::CollapseReason;

/// Kind of player move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    /// Pull a block out.
    Remove,
    /// Put the held block on top.
    Place,
    /// Tap a block out.
    Push,
    /// Put the held block back where it came from.
    Replace,
}

/// Event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TowerEventData {
    /// Block pulled into hand.
    BlockRemoved {
        block: BlockId,
        from: SlotRef,
    },

    /// Held block placed on top.
    BlockPlaced {
        block: BlockId,
        at: SlotRef,
    },

    /// Held block returned to its slot.
    BlockReplaced {
        block: BlockId,
        at: SlotRef,
    },

    /// Block tapped cleanly out of the tower into hand.
    BlockPushed {
        block: BlockId,
        from: SlotRef,
    },

    /// Tapped block struck the tower; turn over.
    PushHit {
        block: BlockId,
        hit: Option<BlockId>,
    },

    /// Physics failed and the stability heuristic decided the move.
    PhysicsFallback {
        kind: MoveKind,
        stability: f32,
    },

    /// The tower fell.
    Collapsed {
        kind: MoveKind,
        reason: CollapseReason,
        block: Option<BlockId>,
    },
}

/// An event tagged with the move that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerEvent {
    /// Zero-based index of the move in the game.
    pub move_index: u32,

    /// Event data.
    pub data: TowerEventData,
}

impl TowerEvent {
    /// Create a new event.
    pub fn new(move_index: u32, data: TowerEventData) -> Self {
        Self { move_index, data }
    }

    /// Whether this event ends the game.
    pub fn is_terminal(&self) -> bool {
        matches!(self.data, TowerEventData::Collapsed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = TowerEvent::new(
            3,
            TowerEventData::Collapsed {
                kind: MoveKind::Remove,
                reason: CollapseReason::NonMovedBlockFell,
                block: Some(12),
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["move_index"], 3);
        assert_eq!(json["data"]["type"], "collapsed");
        assert_eq!(json["data"]["reason"], "non_moved_block_fell");
        assert!(event.is_terminal());
    }

    #[test]
    fn test_non_terminal_events() {
        let event = TowerEvent::new(
            0,
            TowerEventData::BlockRemoved { block: 4, from: SlotRef::new(1, 1) },
        );
        assert!(!event.is_terminal());
    }
}
