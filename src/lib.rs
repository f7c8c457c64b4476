//! # Jenga Engine
//!
//! Rules and rigid-body physics core for a Jenga tower game. The host owns
//! players, turns and persistence; this crate answers one question per move:
//! is it legal, and does the tower stay up?
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       JENGA ENGINE                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Pure primitives                           │
//! │  ├── geometry.rs - Block boxes and slot positions            │
//! │  └── hash.rs     - Tower layout hashing                      │
//! │                                                              │
//! │  game/           - Rules and turn flow                       │
//! │  ├── tower.rs    - Block grid and mutations                  │
//! │  ├── stability.rs- Heuristic stability score                 │
//! │  ├── accuracy.rs - Timing score to physics tuning            │
//! │  ├── rules.rs    - Move legality                             │
//! │  ├── session.rs  - Turn state machine                        │
//! │  └── events.rs   - Move events                               │
//! │                                                              │
//! │  physics/        - Move simulation                           │
//! │  ├── backend.rs  - Integrator trait                          │
//! │  ├── box_world.rs- Default box integrator                    │
//! │  ├── world.rs    - Per-move world                            │
//! │  ├── simulate.rs - Removal, placement, push, replace         │
//! │  └── tuning.rs   - Physics tunables                          │
//! │                                                              │
//! │  config.rs       - All tunables, JSON overrides              │
//! │  protocol.rs     - Host request/response shapes              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! Tower mutations, legality, stability and accuracy are pure functions.
//! The box integrator resolves contacts in a fixed order, so a given input
//! takes the same path on one build; bit-identical verdicts across
//! platforms are not promised, since they rest on `f32` arithmetic.
//!
//! ## Concurrency
//!
//! Every simulation builds its own world and drops it before returning.
//! Nothing is shared between calls, so one [`Simulator`] can serve many
//! games on many threads.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod physics;
pub mod protocol;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig};
pub use game::session::{Move, MoveError, MoveOutcome, TowerGame, TurnPhase};
pub use game::tower::{BlockId, RemoveSlot, SlotRef, Tower, TowerError};
pub use physics::simulate::{CollapseReason, PushVerdict, SimulationVerdict, Simulator};
pub use protocol::{handle_request, MoveRequest, MoveResponse, TowerSnapshot};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
