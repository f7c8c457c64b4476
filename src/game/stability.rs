//! Stability Scorer
//!
//! Cheap shape-only heuristic in [0, 100]. Runs on every simulated move and
//! as the fallback verdict when physics fails, so it walks the levels once
//! and allocates nothing.

use serde::{Deserialize, Serialize};

use crate::game::tower::Tower;

/// Penalty for a level whose mass sits toward one edge.
pub const COM_PENALTY: f32 = 8.0;

/// Penalty per block with an empty slot directly below it.
pub const SUPPORT_PENALTY: f32 = 12.0;

/// Stability under which a tower is treated as already collapsed.
pub const COLLAPSE_THRESHOLD: f32 = 15.0;

/// Lowest acceptable centre of mass (slot index units).
const COM_MIN: f32 = 0.5;
/// Highest acceptable centre of mass.
const COM_MAX: f32 = 1.5;

/// Tunables for the scorer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Subtracted once per lopsided level.
    pub com_penalty: f32,
    /// Subtracted once per unsupported block.
    pub support_penalty: f32,
    /// Scores below this count as collapsed.
    pub collapse_threshold: f32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            com_penalty: COM_PENALTY,
            support_penalty: SUPPORT_PENALTY,
            collapse_threshold: COLLAPSE_THRESHOLD,
        }
    }
}

/// Heuristic stability of `tower`, clamped to [0, 100] and rounded to one
/// decimal place.
pub fn stability_percent(tower: &Tower, config: &StabilityConfig) -> f32 {
    let Some(top) = tower.top_level() else {
        return 100.0;
    };

    let mut score = 100.0f32;
    let levels = tower.levels();

    for level in 0..=top {
        let slots = &levels[level];

        let mut count = 0u32;
        let mut sum = 0u32;
        for (index, slot) in slots.iter().enumerate() {
            if slot.is_some() {
                count += 1;
                sum += index as u32;
            }
        }
        if count == 0 {
            continue;
        }

        let com = sum as f32 / count as f32;
        if !(COM_MIN..=COM_MAX).contains(&com) {
            score -= config.com_penalty;
        }

        if level > 0 {
            let below = &levels[level - 1];
            for (slot, support) in slots.iter().zip(below.iter()) {
                if slot.is_some() && support.is_none() {
                    score -= config.support_penalty;
                }
            }
        }
    }

    (score.clamp(0.0, 100.0) * 10.0).round() / 10.0
}

/// True when `stability` is below the collapse threshold.
#[inline]
pub fn is_critical(stability: f32, config: &StabilityConfig) -> bool {
    stability < config.collapse_threshold
}
