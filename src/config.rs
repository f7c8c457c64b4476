//! Engine Configuration
//!
//! Every balance constant in one serde-friendly struct. Hosts may override
//! any subset from JSON; missing fields keep their defaults.

use serde::{Deserialize, Serialize};

use crate::game::accuracy::AccuracyConfig;
use crate::game::stability::StabilityConfig;
use crate::physics::tuning::PhysicsConfig;

/// Configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON could not be parsed.
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Offending field path.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// All engine tunables.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stability scorer.
    pub stability: StabilityConfig,
    /// Accuracy bands.
    pub accuracy: AccuracyConfig,
    /// Physics tuning.
    pub physics: PhysicsConfig,
}

fn check(ok: bool, field: &'static str, reason: &'static str) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason })
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON override and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.stability;
        check(s.com_penalty >= 0.0, "stability.com_penalty", "must be non-negative")?;
        check(s.support_penalty >= 0.0, "stability.support_penalty", "must be non-negative")?;
        check(
            (0.0..=100.0).contains(&s.collapse_threshold),
            "stability.collapse_threshold",
            "must be within [0, 100]",
        )?;

        let a = &self.accuracy;
        check(
            a.acceptable_min <= a.good_min && a.good_min <= a.perfect_min,
            "accuracy",
            "band edges must be ascending",
        )?;
        check(a.delta_divisor > 0.0, "accuracy.delta_divisor", "must be positive")?;
        check(
            a.good_multiplier >= 0.0 && a.acceptable_multiplier >= 0.0 && a.poor_multiplier >= 0.0,
            "accuracy",
            "impulse multipliers must be non-negative",
        )?;

        let p = &self.physics;
        check(
            p.timestep.is_finite() && p.timestep > 0.0,
            "physics.timestep",
            "must be positive",
        )?;
        check(p.gravity >= 0.0, "physics.gravity", "must be non-negative")?;
        check(p.solver_iterations > 0, "physics.solver_iterations", "must be positive")?;
        check(p.friction >= 0.0, "physics.friction", "must be non-negative")?;
        check(p.contact_slop >= 0.0, "physics.contact_slop", "must be non-negative")?;
        check(
            p.removal_steps > 0 && p.removal_steps_extended >= p.removal_steps,
            "physics.removal_steps",
            "extended budget must not be shorter",
        )?;
        check(
            p.push_steps > 0 && p.replace_steps > 0 && p.placement_steps > 0,
            "physics",
            "step budgets must be positive",
        )?;
        check(
            p.placement_window_levels > 0,
            "physics.placement_window_levels",
            "must be positive",
        )?;
        check(p.fall_drop > 0.0, "physics.fall_drop", "must be positive")?;
        check(p.sag_drop > 0.0, "physics.sag_drop", "must be positive")?;
        check(p.push_offset >= 0.0, "physics.push_offset", "must be non-negative")?;
        Ok(())
    }
}
