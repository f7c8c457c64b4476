//! Jenga Engine Demo
//!
//! Plays a scripted game against the default integrator and logs every
//! outcome. Pass a JSON config path to override tunables.

use anyhow::{Context, Result};
use glam::Vec3;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jenga::{
    core::hash_hex,
    game::events::TowerEventData,
    EngineConfig, Move, MoveError, SlotRef, TowerGame, TurnPhase, VERSION,
};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Jenga Engine v{}", VERSION);

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            EngineConfig::from_json(&json).with_context(|| format!("parsing config {path}"))?
        }
        None => EngineConfig::default(),
    };

    demo_game(&config)
}

/// Scripted turns: pulls with varied timing, a tap, a replace, and an
/// illegal request.
fn demo_game(config: &EngineConfig) -> Result<()> {
    info!("=== Starting Demo Game ===");

    let mut game = TowerGame::new(config);
    info!("Initial stability: {:.1}%", game.stability());
    info!("Initial hash: {}", hash_hex(&game.compute_hash()));

    let script = [
        Move::Remove { slot: SlotRef::new(4, 1), accuracy: Some(75.0), impulse: None },
        Move::Place { accuracy: Some(62.0) },
        Move::remove(SlotRef::new(17, 0)),
        Move::Push { slot: SlotRef::new(7, 0), direction: Vec3::NEG_Z, strength: 0.7 },
        Move::Replace,
        Move::Remove { slot: SlotRef::new(10, 1), accuracy: Some(95.0), impulse: None },
        Move::Place { accuracy: Some(30.0) },
        Move::Remove { slot: SlotRef::new(10, 0), accuracy: Some(40.0), impulse: None },
        Move::Place { accuracy: None },
    ];

    for mv in script {
        match game.apply(mv) {
            Ok(outcome) => {
                info!(
                    "{:?}: collapsed={} push_hit={} stability={:.1}% phase={:?}",
                    outcome.kind, outcome.collapsed, outcome.push_hit, outcome.stability, outcome.phase
                );
                if outcome.fallback {
                    warn!("{:?} decided by the stability fallback", outcome.kind);
                }
            }
            Err(MoveError::Illegal(violation)) => {
                info!("{:?} rejected: {} ({})", mv.kind(), violation, violation.code());
            }
            Err(err @ MoveError::Precondition(_)) => return Err(err.into()),
        }

        for event in game.take_events() {
            if let TowerEventData::Collapsed { kind, reason, block } = event.data {
                info!(
                    "Move #{}: tower fell during {:?} ({:?}, block {:?})",
                    event.move_index, kind, reason, block
                );
            }
        }

        if let TurnPhase::GameOver { .. } = game.phase() {
            break;
        }
    }

    info!("=== Game Results ===");
    info!("Moves applied: {}", game.move_count());
    info!("Blocks in tower: {}", game.tower().block_count());
    info!("Final stability: {:.1}%", game.stability());
    info!("Final hash: {}", hash_hex(&game.compute_hash()));

    let json = serde_json::to_string(&jenga::TowerSnapshot::from(game.tower()))?;
    info!("Snapshot: {} bytes of JSON", json.len());

    Ok(())
}
