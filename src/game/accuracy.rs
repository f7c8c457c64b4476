//! Accuracy Modifier
//!
//! Maps the 0–100 timing score a player earns in the host's minigame to
//! physics tuning. Pure table lookup, no simulation.
//!
//! | Band        | Accuracy | Impulse | Stability delta     | Path                          |
//! |-------------|----------|---------|---------------------|-------------------------------|
//! | Perfect     | ≥ 90     | –       | –                   | skip physics, fail if < 30    |
//! | Good        | 70–89    | 0.7×    | `(a - 50) / 10`     | full simulation               |
//! | Acceptable  | 50–69    | 1.0×    | 0                   | full simulation               |
//! | Poor        | < 50     | 1.3×    | `(a - 50) / 10`     | longer run, threshold 60      |

use serde::{Deserialize, Serialize};

/// Accuracy band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyBand {
    /// Below the acceptable floor.
    Poor,
    /// Baseline.
    Acceptable,
    /// Gentler impact, small stability bonus.
    Good,
    /// Physics skipped.
    Perfect,
}

/// Band edges and per-band tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccuracyConfig {
    /// Lowest score in the perfect band.
    pub perfect_min: f32,
    /// Lowest score in the good band.
    pub good_min: f32,
    /// Lowest score in the acceptable band.
    pub acceptable_min: f32,
    /// Impulse multiplier for good timing.
    pub good_multiplier: f32,
    /// Impulse multiplier for acceptable timing.
    pub acceptable_multiplier: f32,
    /// Impulse multiplier for poor timing.
    pub poor_multiplier: f32,
    /// Score at which the stability delta is zero.
    pub delta_pivot: f32,
    /// Divisor turning score distance into stability points.
    pub delta_divisor: f32,
    /// Perfect moves fail only under this baseline stability.
    pub perfect_fail_below: f32,
    /// Collapse threshold for poor moves.
    pub poor_threshold: f32,
}

impl Default for AccuracyConfig {
    fn default() -> Self {
        Self {
            perfect_min: 90.0,
            good_min: 70.0,
            acceptable_min: 50.0,
            good_multiplier: 0.7,
            acceptable_multiplier: 1.0,
            poor_multiplier: 1.3,
            delta_pivot: 50.0,
            delta_divisor: 10.0,
            perfect_fail_below: 30.0,
            poor_threshold: 60.0,
        }
    }
}

/// Physics tuning derived from one accuracy score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccuracyProfile {
    /// Band the score fell in.
    pub band: AccuracyBand,
    /// Scale for impact and pull impulses.
    pub impulse_multiplier: f32,
    /// Added to the stability score before threshold checks.
    pub stability_delta: f32,
    /// Replaces the move's normal collapse threshold when set.
    pub threshold_override: Option<f32>,
    /// Skip the step loop entirely.
    pub skip_simulation: bool,
    /// Use the longer step budget.
    pub extended_steps: bool,
}

impl AccuracyProfile {
    /// Profile used when the host supplies no score.
    pub fn baseline(config: &AccuracyConfig) -> Self {
        Self {
            band: AccuracyBand::Acceptable,
            impulse_multiplier: config.acceptable_multiplier,
            stability_delta: 0.0,
            threshold_override: None,
            skip_simulation: false,
            extended_steps: false,
        }
    }

    /// Stability after the band's delta, kept in [0, 100].
    #[inline]
    pub fn adjusted_stability(&self, stability: f32) -> f32 {
        (stability + self.stability_delta).clamp(0.0, 100.0)
    }

    /// Collapse threshold for this move given the move's normal one.
    #[inline]
    pub fn threshold(&self, default: f32) -> f32 {
        self.threshold_override.unwrap_or(default)
    }
}

/// Clamp a host-supplied score into [0, 100]. NaN counts as 0.
pub fn normalize_accuracy(accuracy: f32) -> f32 {
    if accuracy.is_nan() {
        0.0
    } else {
        accuracy.clamp(0.0, 100.0)
    }
}

/// Band for a score.
pub fn accuracy_band(accuracy: f32, config: &AccuracyConfig) -> AccuracyBand {
    let accuracy = normalize_accuracy(accuracy);
    if accuracy >= config.perfect_min {
        AccuracyBand::Perfect
    } else if accuracy >= config.good_min {
        AccuracyBand::Good
    } else if accuracy >= config.acceptable_min {
        AccuracyBand::Acceptable
    } else {
        AccuracyBand::Poor
    }
}

/// Map an optional score to its physics profile.
pub fn accuracy_profile(accuracy: Option<f32>, config: &AccuracyConfig) -> AccuracyProfile {
    let Some(accuracy) = accuracy else {
        return AccuracyProfile::baseline(config);
    };
    let accuracy = normalize_accuracy(accuracy);
    let scaled_delta = (accuracy - config.delta_pivot) / config.delta_divisor;

    match accuracy_band(accuracy, config) {
        AccuracyBand::Perfect => AccuracyProfile {
            band: AccuracyBand::Perfect,
            impulse_multiplier: 0.0,
            stability_delta: 0.0,
            threshold_override: Some(config.perfect_fail_below),
            skip_simulation: true,
            extended_steps: false,
        },
        AccuracyBand::Good => AccuracyProfile {
            band: AccuracyBand::Good,
            impulse_multiplier: config.good_multiplier,
            stability_delta: scaled_delta,
            threshold_override: None,
            skip_simulation: false,
            extended_steps: false,
        },
        AccuracyBand::Acceptable => AccuracyProfile::baseline(config),
        AccuracyBand::Poor => AccuracyProfile {
            band: AccuracyBand::Poor,
            impulse_multiplier: config.poor_multiplier,
            stability_delta: scaled_delta,
            threshold_override: Some(config.poor_threshold),
            skip_simulation: false,
            extended_steps: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(a: f32) -> AccuracyProfile {
        accuracy_profile(Some(a), &AccuracyConfig::default())
    }

    #[test]
    fn test_band_edges() {
        let config = AccuracyConfig::default();
        assert_eq!(accuracy_band(100.0, &config), AccuracyBand::Perfect);
        assert_eq!(accuracy_band(90.0, &config), AccuracyBand::Perfect);
        assert_eq!(accuracy_band(89.9, &config), AccuracyBand::Good);
        assert_eq!(accuracy_band(70.0, &config), AccuracyBand::Good);
        assert_eq!(accuracy_band(69.0, &config), AccuracyBand::Acceptable);
        assert_eq!(accuracy_band(50.0, &config), AccuracyBand::Acceptable);
        assert_eq!(accuracy_band(49.0, &config), AccuracyBand::Poor);
        assert_eq!(accuracy_band(0.0, &config), AccuracyBand::Poor);
    }

    #[test]
    fn test_perfect_skips_simulation() {
        let p = profile(95.0);
        assert!(p.skip_simulation);
        assert_eq!(p.threshold(15.0), 30.0);
    }

    #[test]
    fn test_good_band() {
        let p = profile(80.0);
        assert_eq!(p.impulse_multiplier, 0.7);
        assert!((p.stability_delta - 3.0).abs() < 1e-6);
        assert_eq!(p.threshold(15.0), 15.0);
        assert!(!p.extended_steps);
    }

    #[test]
    fn test_acceptable_band_is_baseline() {
        let p = profile(60.0);
        assert_eq!(p, AccuracyProfile::baseline(&AccuracyConfig::default()));
        assert_eq!(p.impulse_multiplier, 1.0);
        assert_eq!(p.stability_delta, 0.0);
    }

    #[test]
    fn test_poor_band() {
        let p = profile(0.0);
        assert_eq!(p.impulse_multiplier, 1.3);
        assert!((p.stability_delta + 5.0).abs() < 1e-6);
        assert_eq!(p.threshold(15.0), 60.0);
        assert!(p.extended_steps);
    }

    #[test]
    fn test_out_of_range_scores_clamped() {
        assert_eq!(profile(250.0).band, AccuracyBand::Perfect);
        assert_eq!(profile(-10.0), profile(0.0));
        assert_eq!(profile(f32::NAN), profile(0.0));
    }

    #[test]
    fn test_missing_score_is_baseline() {
        let config = AccuracyConfig::default();
        assert_eq!(accuracy_profile(None, &config), AccuracyProfile::baseline(&config));
    }

    #[test]
    fn test_adjusted_stability_clamped() {
        let p = profile(0.0);
        assert_eq!(p.adjusted_stability(2.0), 0.0);
        let p = profile(89.0);
        assert_eq!(p.adjusted_stability(99.0), 100.0);
    }
}
