//! Host Protocol
//!
//! JSON shapes exchanged with the host: a move request in, a move response
//! out, and a plain nested-array tower snapshot the host can persist.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::geometry::SLOTS_PER_LEVEL;
use crate::core::hash::hash_hex;
use crate::game::events::MoveKind;
use crate::game::session::{Move, MoveError, TowerGame, TurnPhase};
use crate::game::tower::{BlockId, Level, SlotRef, Tower, TowerError};
use crate::physics::backend::PhysicsBackend;
use crate::physics::simulate::CollapseReason;

// =============================================================================
// HOST -> ENGINE
// =============================================================================

fn full_strength() -> f32 {
    1.0
}

/// A move as the host sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MoveRequest {
    /// Pull a block out.
    Remove {
        /// Slot to pull from.
        slot: SlotRef,
        /// Timing score from the minigame.
        #[serde(default)]
        accuracy: Option<f32>,
        /// Pull velocity override `[x, y, z]`.
        #[serde(default)]
        impulse: Option<[f32; 3]>,
    },

    /// Put the held block on top.
    Place {
        /// Timing score from the minigame.
        #[serde(default)]
        accuracy: Option<f32>,
    },

    /// Tap a block out.
    Push {
        /// Slot to tap.
        slot: SlotRef,
        /// Direction `[x, y, z]`.
        direction: [f32; 3],
        /// Strength in [0, 1].
        #[serde(default = "full_strength")]
        strength: f32,
    },

    /// Put the held block back.
    Replace,
}

impl From<MoveRequest> for Move {
    fn from(request: MoveRequest) -> Self {
        match request {
            MoveRequest::Remove {
                slot,
                accuracy,
                impulse,
            } => Move::Remove {
                slot,
                accuracy,
                impulse: impulse.map(Vec3::from_array),
            },
            MoveRequest::Place { accuracy } => Move::Place { accuracy },
            MoveRequest::Push {
                slot,
                direction,
                strength,
            } => Move::Push {
                slot,
                direction: Vec3::from_array(direction),
                strength,
            },
            MoveRequest::Replace => Move::Replace,
        }
    }
}

impl MoveRequest {
    /// Kind tag.
    pub fn kind(&self) -> MoveKind {
        match self {
            MoveRequest::Remove { .. } => MoveKind::Remove,
            MoveRequest::Place { .. } => MoveKind::Place,
            MoveRequest::Push { .. } => MoveKind::Push,
            MoveRequest::Replace => MoveKind::Replace,
        }
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// ENGINE -> HOST
// =============================================================================

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Engine answer to one [`MoveRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveResponse {
    /// Kind of move requested.
    pub kind: MoveKind,
    /// Whether the rules accepted the move.
    pub legal: bool,
    /// Reason for refusal when not legal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    /// Whether the tower fell.
    pub collapsed: bool,
    /// Why it fell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<CollapseReason>,
    /// Block that triggered the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_block: Option<BlockId>,
    /// Tapped block struck the tower.
    pub push_hit: bool,
    /// Heuristic stability for display.
    pub stability: f32,
    /// Tower after the move (unchanged when refused).
    pub tower: TowerSnapshot,
    /// Hex SHA-256 of the tower layout.
    pub tower_hash: String,
    /// Turn phase after the move.
    pub phase: TurnPhase,
}

impl MoveResponse {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Apply a host request to a game.
///
/// Rule rejections come back as a response with `legal: false`. A
/// [`TowerError`] means the host's state is corrupt and is returned as-is.
pub fn handle_request<B: PhysicsBackend>(
    game: &mut TowerGame<B>,
    request: MoveRequest,
) -> Result<MoveResponse, TowerError> {
    let kind = request.kind();
    match game.apply(request.into()) {
        Ok(outcome) => Ok(MoveResponse {
            kind,
            legal: true,
            rejection: None,
            collapsed: outcome.collapsed,
            reason: outcome.reason,
            failed_block: outcome.failed_block,
            push_hit: outcome.push_hit,
            stability: outcome.stability,
            tower_hash: hash_hex(&outcome.tower.compute_hash()),
            tower: TowerSnapshot::from(&outcome.tower),
            phase: outcome.phase,
        }),
        Err(MoveError::Illegal(violation)) => Ok(MoveResponse {
            kind,
            legal: false,
            rejection: Some(Rejection {
                code: violation.code().to_string(),
                message: violation.to_string(),
            }),
            collapsed: false,
            reason: None,
            failed_block: None,
            push_hit: false,
            stability: game.stability(),
            tower: TowerSnapshot::from(game.tower()),
            tower_hash: hash_hex(&game.compute_hash()),
            phase: game.phase(),
        }),
        Err(MoveError::Precondition(err)) => Err(err),
    }
}

// =============================================================================
// TOWER SNAPSHOT
// =============================================================================

/// Tower as nested arrays, `levels[level][row][slot]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TowerSnapshot {
    /// Levels bottom first.
    pub levels: Vec<Vec<Vec<Option<BlockId>>>>,
}

impl From<&Tower> for TowerSnapshot {
    fn from(tower: &Tower) -> Self {
        let levels = tower
            .levels()
            .iter()
            .map(|level| vec![level.to_vec()])
            .collect();
        Self { levels }
    }
}

impl TryFrom<TowerSnapshot> for Tower {
    type Error = TowerError;

    /// Accepts legacy multi-row levels as long as only row 0 holds blocks.
    fn try_from(snapshot: TowerSnapshot) -> Result<Self, Self::Error> {
        let mut levels = Vec::with_capacity(snapshot.levels.len());
        for (index, rows) in snapshot.levels.into_iter().enumerate() {
            let mut rows = rows.into_iter();
            let first = rows.next().unwrap_or_default();
            if rows.any(|row| row.iter().any(Option::is_some)) {
                return Err(TowerError::Malformed(format!(
                    "level {index} has blocks outside row 0"
                )));
            }
            if first.len() != SLOTS_PER_LEVEL {
                return Err(TowerError::Malformed(format!(
                    "level {index} has {} slots, expected {SLOTS_PER_LEVEL}",
                    first.len()
                )));
            }
            let mut level: Level = [None; SLOTS_PER_LEVEL];
            level.copy_from_slice(&first);
            levels.push(level);
        }
        Tower::from_levels(levels)
    }
}
