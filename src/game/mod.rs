//! Game Logic Module
//!
//! Tower model, rules and turn flow. Everything here is plain data and pure
//! functions except `session`, which drives the physics.
//!
//! ## Module Structure
//!
//! - `tower`: Block grid, slot arithmetic, remove/place mutations
//! - `stability`: Shape-only stability heuristic
//! - `accuracy`: Timing score to physics tuning
//! - `rules`: Move legality and replace gating
//! - `session`: Turn state machine over one tower
//! - `events`: Move events for logs and replays

pub mod accuracy;
pub mod events;
pub mod rules;
pub mod session;
pub mod stability;
pub mod tower;

// Re-export key types
pub use accuracy::{accuracy_profile, AccuracyBand, AccuracyConfig, AccuracyProfile};
pub use events::{MoveKind, TowerEvent, TowerEventData};
pub use rules::{replace_block, validate_move, RuleViolation};
pub use session::{Move, MoveError, MoveOutcome, TowerGame, TurnPhase};
pub use stability::{stability_percent, StabilityConfig, COLLAPSE_THRESHOLD};
pub use tower::{BlockId, RemoveSlot, SlotRef, Tower, TowerError};
