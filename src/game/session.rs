//! Turn Session
//!
//! One tower over the life of a game and the turn state machine around it:
//!
//! ```text
//! AwaitingMove ──Remove──▶ HoldingBlock ──Place / Replace──▶ AwaitingMove
//!      │                        ▲
//!      └──Push (clean)──────────┘
//!      └──Push (hit)──▶ AwaitingMove, tower unchanged
//! any simulated collapse ──▶ GameOver (terminal)
//! ```
//!
//! The session owns its tower and never shares it; every applied move
//! swaps in a fresh tower value built by the tower's own pure mutations.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::core::hash::StateHash;
use crate::game::events::{MoveKind, TowerEvent, TowerEventData};
use crate::game::rules::{try_replace, validate_direction, validate_move, RuleViolation};
use crate::game::tower::{BlockId, RemoveSlot, SlotRef, Tower, TowerError};
use crate::physics::backend::PhysicsBackend;
use crate::physics::box_world::BoxWorld;
use crate::physics::simulate::{CollapseReason, Simulator};

// =============================================================================
// TYPES
// =============================================================================

/// Where the current turn stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TurnPhase {
    /// Waiting for a remove or a push.
    AwaitingMove,
    /// A block is in hand.
    HoldingBlock {
        /// The held block.
        block: BlockId,
        /// Where it came from.
        from: RemoveSlot,
    },
    /// The tower fell. Terminal.
    GameOver {
        /// Why it fell.
        reason: CollapseReason,
        /// Block that triggered it, when known.
        block: Option<BlockId>,
    },
}

/// A move requested by the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Move {
    /// Pull a block out.
    Remove {
        /// Slot to pull from.
        slot: SlotRef,
        /// Timing score, if the host ran the minigame.
        accuracy: Option<f32>,
        /// Pull velocity override.
        impulse: Option<Vec3>,
    },
    /// Put the held block on top.
    Place {
        /// Timing score, if the host ran the minigame.
        accuracy: Option<f32>,
    },
    /// Tap a block out.
    Push {
        /// Slot to tap.
        slot: SlotRef,
        /// Push direction; projected onto the ground plane.
        direction: Vec3,
        /// Push strength in [0, 1].
        strength: f32,
    },
    /// Put the held block back where it came from.
    Replace,
}

impl Move {
    /// Plain pull with no timing score.
    pub fn remove(slot: SlotRef) -> Self {
        Move::Remove {
            slot,
            accuracy: None,
            impulse: None,
        }
    }

    /// Plain place with no timing score.
    pub fn place() -> Self {
        Move::Place { accuracy: None }
    }

    /// Kind tag.
    pub fn kind(&self) -> MoveKind {
        match self {
            Move::Remove { .. } => MoveKind::Remove,
            Move::Place { .. } => MoveKind::Place,
            Move::Push { .. } => MoveKind::Push,
            Move::Replace => MoveKind::Replace,
        }
    }
}

/// Result of an accepted move.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// Kind of move applied.
    pub kind: MoveKind,
    /// Tower after the move.
    pub tower: Tower,
    /// Whether the tower fell.
    pub collapsed: bool,
    /// Why it fell.
    pub reason: Option<CollapseReason>,
    /// Block that triggered the failure.
    pub failed_block: Option<BlockId>,
    /// Tapped block struck the tower (turn lost, game goes on).
    pub push_hit: bool,
    /// Heuristic stability of the tower after the move.
    pub stability: f32,
    /// Physics failed and the stability fallback decided.
    pub fallback: bool,
    /// Phase after the move.
    pub phase: TurnPhase,
}

/// Why a move was not applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MoveError {
    /// Refused by the game rules.
    #[error("illegal move: {0}")]
    Illegal(#[from] RuleViolation),

    /// Host bookkeeping is inconsistent with the tower.
    #[error("precondition failed: {0}")]
    Precondition(#[from] TowerError),
}

/// What a simulation concluded, before it is applied to the session.
struct Resolution {
    tower: Tower,
    phase: TurnPhase,
    collapsed: Option<(CollapseReason, Option<BlockId>)>,
    push_hit: bool,
    fallback: bool,
    event: TowerEventData,
}

// =============================================================================
// GAME
// =============================================================================

/// A tower game in progress.
pub struct TowerGame<B: PhysicsBackend = BoxWorld> {
    tower: Tower,
    phase: TurnPhase,
    simulator: Simulator<B>,
    move_count: u32,
    events: Vec<TowerEvent>,
}

impl TowerGame {
    /// Fresh 18-level game on the default integrator.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_backend(Tower::initialize(), config)
    }
}

impl<B: PhysicsBackend> TowerGame<B> {
    /// Game resumed from a host-held tower, awaiting a move.
    pub fn with_backend(tower: Tower, config: &EngineConfig) -> Self {
        Self {
            tower,
            phase: TurnPhase::AwaitingMove,
            simulator: Simulator::with_backend(config),
            move_count: 0,
            events: Vec::new(),
        }
    }

    /// Current tower.
    pub fn tower(&self) -> &Tower {
        &self.tower
    }

    /// Current phase.
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Whether the tower has fallen.
    pub fn is_over(&self) -> bool {
        matches!(self.phase, TurnPhase::GameOver { .. })
    }

    /// Block in hand, if any.
    pub fn held_block(&self) -> Option<BlockId> {
        match self.phase {
            TurnPhase::HoldingBlock { block, .. } => Some(block),
            _ => None,
        }
    }

    /// Accepted moves so far.
    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    /// Simulator driving this game.
    pub fn simulator(&self) -> &Simulator<B> {
        &self.simulator
    }

    /// Heuristic stability of the current tower.
    pub fn stability(&self) -> f32 {
        self.simulator.stability(&self.tower)
    }

    /// Hash of the current tower.
    pub fn compute_hash(&self) -> StateHash {
        self.tower.compute_hash()
    }

    /// Drain events produced since the last call.
    pub fn take_events(&mut self) -> Vec<TowerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Apply one move. On error nothing changes.
    pub fn apply(&mut self, mv: Move) -> Result<MoveOutcome, MoveError> {
        if self.is_over() {
            return Err(RuleViolation::GameOver.into());
        }

        let resolution = match mv {
            Move::Remove {
                slot,
                accuracy,
                impulse,
            } => self.resolve_remove(slot, accuracy, impulse)?,
            Move::Place { accuracy } => self.resolve_place(accuracy)?,
            Move::Push {
                slot,
                direction,
                strength,
            } => self.resolve_push(slot, direction, strength)?,
            Move::Replace => self.resolve_replace()?,
        };

        Ok(self.commit(mv.kind(), resolution))
    }

    fn awaiting(&self) -> Result<(), RuleViolation> {
        match self.phase {
            TurnPhase::AwaitingMove => Ok(()),
            TurnPhase::HoldingBlock { block, .. } => Err(RuleViolation::AlreadyHoldingBlock(block)),
            TurnPhase::GameOver { .. } => Err(RuleViolation::GameOver),
        }
    }

    fn holding(&self) -> Result<(BlockId, RemoveSlot), RuleViolation> {
        match self.phase {
            TurnPhase::HoldingBlock { block, from } => Ok((block, from)),
            TurnPhase::AwaitingMove => Err(RuleViolation::NotHoldingBlock),
            TurnPhase::GameOver { .. } => Err(RuleViolation::GameOver),
        }
    }

    fn resolve_remove(
        &self,
        slot: SlotRef,
        accuracy: Option<f32>,
        impulse: Option<Vec3>,
    ) -> Result<Resolution, MoveError> {
        self.awaiting()?;
        validate_move(&self.tower, slot)?;

        let removal = self.tower.remove_block(slot)?;
        let verdict = self.simulator.simulate_removal(
            &removal.tower,
            removal.block_id,
            removal.from,
            impulse,
            accuracy,
        )?;

        let collapsed = verdict
            .reason
            .filter(|_| verdict.collapsed)
            .map(|reason| (reason, verdict.failed_block));
        Ok(Resolution {
            tower: removal.tower,
            phase: TurnPhase::HoldingBlock {
                block: removal.block_id,
                from: removal.from,
            },
            collapsed,
            push_hit: false,
            fallback: verdict.fallback,
            event: TowerEventData::BlockRemoved {
                block: removal.block_id,
                from: removal.from,
            },
        })
    }

    fn resolve_place(&self, accuracy: Option<f32>) -> Result<Resolution, MoveError> {
        let (block, _) = self.holding()?;

        let verdict = self
            .simulator
            .simulate_placement(&self.tower, block, accuracy)?;
        let (tower, at) = self.tower.place_block(block)?;

        let collapsed = verdict
            .reason
            .filter(|_| verdict.collapsed)
            .map(|reason| (reason, verdict.failed_block));
        Ok(Resolution {
            tower,
            phase: TurnPhase::AwaitingMove,
            collapsed,
            push_hit: false,
            fallback: verdict.fallback,
            event: TowerEventData::BlockPlaced { block, at },
        })
    }

    fn resolve_push(
        &self,
        slot: SlotRef,
        direction: Vec3,
        strength: f32,
    ) -> Result<Resolution, MoveError> {
        self.awaiting()?;
        validate_move(&self.tower, slot)?;
        validate_direction(direction)?;

        let removal = self.tower.remove_block(slot)?;
        let verdict = self
            .simulator
            .simulate_push(&self.tower, slot, direction, strength)?;

        if verdict.tower_fell {
            let reason = verdict.reason.unwrap_or(CollapseReason::TowerFell);
            return Ok(Resolution {
                tower: removal.tower,
                phase: TurnPhase::AwaitingMove,
                collapsed: Some((reason, verdict.failed_block)),
                push_hit: verdict.hit_tower,
                fallback: verdict.fallback,
                event: TowerEventData::BlockPushed {
                    block: removal.block_id,
                    from: slot,
                },
            });
        }

        if verdict.hit_tower {
            return Ok(Resolution {
                tower: self.tower.clone(),
                phase: TurnPhase::AwaitingMove,
                collapsed: None,
                push_hit: true,
                fallback: verdict.fallback,
                event: TowerEventData::PushHit {
                    block: removal.block_id,
                    hit: verdict.hit_block,
                },
            });
        }

        Ok(Resolution {
            tower: removal.tower,
            phase: TurnPhase::HoldingBlock {
                block: removal.block_id,
                from: slot,
            },
            collapsed: None,
            push_hit: false,
            fallback: verdict.fallback,
            event: TowerEventData::BlockPushed {
                block: removal.block_id,
                from: slot,
            },
        })
    }

    fn resolve_replace(&self) -> Result<Resolution, MoveError> {
        let (block, from) = self.holding()?;
        let (tower, verdict) = try_replace(&self.tower, &self.simulator, block, from)?;

        Ok(Resolution {
            tower,
            phase: TurnPhase::AwaitingMove,
            collapsed: None,
            push_hit: false,
            fallback: verdict.fallback,
            event: TowerEventData::BlockReplaced { block, at: from },
        })
    }

    fn commit(&mut self, kind: MoveKind, resolution: Resolution) -> MoveOutcome {
        let index = self.move_count;
        self.move_count += 1;
        self.tower = resolution.tower;

        self.events.push(TowerEvent::new(index, resolution.event));
        let stability = self.stability();
        if resolution.fallback {
            self.events.push(TowerEvent::new(
                index,
                TowerEventData::PhysicsFallback { kind, stability },
            ));
        }

        self.phase = match resolution.collapsed {
            Some((reason, block)) => {
                info!(
                    ?kind,
                    ?reason,
                    ?block,
                    moves = self.move_count,
                    "tower collapsed, game over"
                );
                self.events.push(TowerEvent::new(
                    index,
                    TowerEventData::Collapsed { kind, reason, block },
                ));
                TurnPhase::GameOver { reason, block }
            }
            None => resolution.phase,
        };

        debug!(?kind, index, stability, phase = ?self.phase, "move applied");

        let (reason, failed_block) = match resolution.collapsed {
            Some((reason, block)) => (Some(reason), block),
            None => (None, None),
        };
        MoveOutcome {
            kind,
            tower: self.tower.clone(),
            collapsed: resolution.collapsed.is_some(),
            reason,
            failed_block,
            push_hit: resolution.push_hit,
            stability,
            fallback: resolution.fallback,
            phase: self.phase,
        }
    }
}
