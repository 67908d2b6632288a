//! Engine tuning

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::queue::DEFAULT_PRESET_TTL_HOURS;

/// How debt turns into a bias on sampled outcomes
///
/// Bias kicks in once `|debt|` reaches [`threshold`](Bias::threshold). Its
/// strength is `min(|debt| / divisor, cap)`. Favored outcomes are scaled by
/// `1 + strength * boost` and the others by `1 - strength * penalty`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bias {
    pub threshold: f64,
    pub divisor: f64,
    pub cap: f64,
    pub boost: f64,
    pub penalty: f64,
}

impl Bias {
    /// Bias applied to each face of a standard die
    pub const STANDARD: Bias = Bias {
        threshold: 5.0,
        divisor: 50.0,
        cap: 1.0,
        boost: 0.4,
        penalty: 0.2,
    };

    /// Bias applied to the sum of a fudge dice pool
    ///
    /// Uses a larger divisor and a lower cap than [`Bias::STANDARD`].
    // TODO: pick one normalization for both dice families once rolls are retuned
    pub const FUDGE: Bias = Bias {
        threshold: 5.0,
        divisor: 75.0,
        cap: 0.8,
        boost: 0.5,
        penalty: 0.3,
    };

    /// Whether this much debt is enough to bias a roll
    pub fn is_active(&self, debt: f64) -> bool {
        debt.abs() >= self.threshold
    }

    /// Bias strength for a debt, between 0 and [`cap`](Bias::cap)
    pub fn strength(&self, debt: f64) -> f64 {
        (debt.abs() / self.divisor).min(self.cap)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.abs();
        self
    }

    pub fn with_cap(mut self, cap: f64) -> Self {
        self.cap = cap.abs();
        self
    }
}

/// Tuning knobs for an [`Engine`](crate::Engine)
///
/// The defaults are the values the luck and karma systems were balanced with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Bias for standard dice
    pub standard: Bias,
    /// Bias for fudge dice
    pub fudge: Bias,
    /// Karma debt is kept within `-debt_limit..=debt_limit`
    pub debt_limit: f64,
    /// Larger standard pools go to the fallback evaluator unweighted
    pub max_weighted_dice: u32,
    /// How long queued preset rolls stay around, see
    /// [`PresetQueue`](crate::PresetQueue)
    pub preset_ttl_hours: i64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            standard: Bias::STANDARD,
            fudge: Bias::FUDGE,
            debt_limit: 100.0,
            max_weighted_dice: 10,
            preset_ttl_hours: DEFAULT_PRESET_TTL_HOURS,
        }
    }
}

impl Tuning {
    pub fn with_standard_bias(mut self, bias: Bias) -> Self {
        self.standard = bias;
        self
    }

    pub fn with_fudge_bias(mut self, bias: Bias) -> Self {
        self.fudge = bias;
        self
    }

    pub fn with_debt_limit(mut self, limit: f64) -> Self {
        self.debt_limit = limit.abs();
        self
    }

    pub fn with_max_weighted_dice(mut self, max: u32) -> Self {
        self.max_weighted_dice = max;
        self
    }

    /// Set the preset expiry, negative values are treated as 0
    pub fn with_preset_ttl_hours(mut self, hours: i64) -> Self {
        self.preset_ttl_hours = hours.max(0);
        self
    }

    pub fn preset_ttl(&self) -> TimeDelta {
        TimeDelta::try_hours(self.preset_ttl_hours).unwrap_or_else(TimeDelta::max_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tuning() {
        let t = Tuning::default();
        assert_eq!(t.standard, Bias::STANDARD);
        assert_eq!(t.fudge, Bias::FUDGE);
        assert_eq!(t.debt_limit, 100.0);
        assert_eq!(t.max_weighted_dice, 10);
        assert_eq!(t.preset_ttl(), TimeDelta::hours(12));
    }

    #[test]
    fn strength_is_capped() {
        assert_eq!(Bias::STANDARD.strength(25.0), 0.5);
        assert_eq!(Bias::STANDARD.strength(-100.0), 1.0);
        assert_eq!(Bias::FUDGE.strength(30.0), 0.4);
        assert_eq!(Bias::FUDGE.strength(100.0), 0.8);
    }

    #[test]
    fn activation_threshold() {
        assert!(!Bias::STANDARD.is_active(4.9));
        assert!(!Bias::STANDARD.is_active(-4.9));
        assert!(Bias::STANDARD.is_active(5.0));
        assert!(Bias::STANDARD.is_active(-50.0));
        assert!(!Bias::STANDARD.is_active(f64::NAN));
    }

    #[test]
    fn builder_methods() {
        let t = Tuning::default()
            .with_debt_limit(-50.0)
            .with_max_weighted_dice(4)
            .with_preset_ttl_hours(-3)
            .with_standard_bias(Bias::STANDARD.with_threshold(10.0).with_cap(0.5));
        assert_eq!(t.debt_limit, 50.0);
        assert_eq!(t.max_weighted_dice, 4);
        assert_eq!(t.preset_ttl(), TimeDelta::zero());
        assert_eq!(t.standard.threshold, 10.0);
        assert_eq!(t.standard.cap, 0.5);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let t: Tuning = serde_json::from_str(r#"{ "debt_limit": 60.0 }"#).unwrap();
        assert_eq!(t.debt_limit, 60.0);
        assert_eq!(t.fudge, Bias::FUDGE);
        assert_eq!(t.preset_ttl_hours, 12);
    }
}
