//! Roll orchestration
//!
//! [`Engine::roll`] takes one expression from validation to a ranked result
//! and books it on the user's [`LuckProfile`].

use std::fmt;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use tracing::debug;

use crate::config::Tuning;
use crate::fallout::{fallout_faces_for_damage, roll_fallout_dice};
use crate::fudge::generate_fudge_dice_for_sum;
use crate::luck::{LuckProfile, RollMode, RollRecord};
use crate::notation::{parse_dice_modifiers, translate_dice_syntax, validate_dice_expression, DiceKind};
use crate::percentile::calculate_roll_percentile;
use crate::queue::{PresetQueue, UserId};
use crate::result::{Die, RollResult};
use crate::roll::NotationFallback;
use crate::weighted::{roll_weighted_fudge_dice, roll_weighted_standard_die};
use crate::{Error, Pcg};

/// Evaluator for expressions the weighted paths don't handle
///
/// Closures with the same signature work too:
///
/// ```
/// use chimera_dice::{Engine, Error, LuckProfile, Pcg, RollMode, RollResult};
///
/// let fallback = |expr: &str, _: &mut Pcg| -> Result<RollResult, Error> {
///     Err(Error::Unsupported(expr.to_string()))
/// };
/// let mut engine = Engine::with_seed(1).with_fallback(fallback);
/// let mut profile = LuckProfile::default();
/// assert!(engine.roll("4d6kh3", RollMode::Standard, &mut profile, None).is_err());
/// ```
pub trait Fallback {
    fn evaluate(&self, expr: &str, rng: &mut Pcg) -> Result<RollResult, Error>;
}

impl<T> Fallback for T
where
    T: Fn(&str, &mut Pcg) -> Result<RollResult, Error>,
{
    fn evaluate(&self, expr: &str, rng: &mut Pcg) -> Result<RollResult, Error> {
        (self)(expr, rng)
    }
}

/// A finished roll
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub mode: RollMode,
    pub result: RollResult,
    /// Rank of the dice total, when it could be computed
    pub percentile: Option<f64>,
    /// Debt after a karma roll
    pub debt: Option<f64>,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return write!(f, "{:#}", self.result);
        }
        write!(f, "{} {}", self.mode.emoji(), self.result)
    }
}

/// Dice roller with luck and karma
pub struct Engine {
    rng: Pcg,
    tuning: Tuning,
    fallback: Box<dyn Fallback>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("rng", &self.rng)
            .field("tuning", &self.tuning)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create a new engine
    ///
    /// Seed is autogenerated from entropy.
    pub fn new() -> Self {
        Self::from_rng(Pcg::from_entropy())
    }
    /// Create a new engine with a seed
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(Pcg::seed_from_u64(seed))
    }
    fn from_rng(rng: Pcg) -> Self {
        Self {
            rng,
            tuning: Tuning::default(),
            fallback: Box::new(NotationFallback),
        }
    }

    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn with_fallback(mut self, fallback: impl Fallback + 'static) -> Self {
        self.fallback = Box::new(fallback);
        self
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Roll `expr` for a user
    ///
    /// A `preset` forces the dice total of fudge, Fallout and standard rolls.
    /// It is ignored for expressions with operators.
    pub fn roll(
        &mut self,
        expr: &str,
        mode: RollMode,
        profile: &mut LuckProfile,
        preset: Option<i64>,
    ) -> Result<Outcome, Error> {
        self.roll_at(expr, mode, profile, preset, Utc::now())
    }

    /// [`roll`](Self::roll) with the time it is booked under
    pub fn roll_at(
        &mut self,
        expr: &str,
        mode: RollMode,
        profile: &mut LuckProfile,
        preset: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Outcome, Error> {
        let expr = expr.trim();
        validate_dice_expression(expr)?;

        let (_, modifier) = parse_dice_modifiers(expr);
        let debt = profile.effective_debt(mode);

        let result = match (DiceKind::parse(expr), preset) {
            (Some(DiceKind::Fudge { count }), Some(target)) => {
                let faces = generate_fudge_dice_for_sum(&mut self.rng, count, target);
                RollResult::fudge(expr, faces, modifier)
            }
            (Some(DiceKind::Fudge { count }), None) => {
                let (faces, _) = roll_weighted_fudge_dice(&mut self.rng, count, debt, &self.tuning.fudge);
                RollResult::fudge(expr, faces, modifier)
            }
            (Some(DiceKind::Fallout { count }), Some(damage)) => {
                RollResult::fallout(expr, fallout_faces_for_damage(count, damage), modifier)
            }
            (Some(DiceKind::Fallout { count }), None) => {
                RollResult::fallout(expr, roll_fallout_dice(&mut self.rng, count), modifier)
            }
            (Some(DiceKind::Standard { .. }), Some(value)) => RollResult::preset(expr, value, modifier),
            (Some(DiceKind::Standard { count, sides }), None) if count <= self.tuning.max_weighted_dice => {
                let dice = (0..count)
                    .map(|_| roll_weighted_standard_die(&mut self.rng, sides, debt, &self.tuning.standard))
                    .map(|val| Die::new(i64::from(val)))
                    .collect();
                RollResult::dice(expr, dice, modifier)
            }
            (_, preset) => {
                if let Some(preset) = preset {
                    debug!(expr, preset, "preset ignored for advanced expression");
                }
                let translated = translate_dice_syntax(expr);
                self.fallback
                    .evaluate(&translated, &mut self.rng)?
                    .with_expr(expr)
            }
        };

        let percentile = calculate_roll_percentile(expr, result.dice_total());
        profile.record_roll(
            RollRecord {
                at: now,
                mode,
                expr: expr.to_string(),
                total: result.total(),
                percentile,
            },
            self.tuning.debt_limit,
        );
        debug!(expr, %mode, total = result.total(), "roll finished");

        Ok(Outcome {
            mode,
            result,
            percentile,
            debt: (mode == RollMode::Karma).then_some(profile.percentile_debt),
        })
    }

    /// [`roll`](Self::roll) using the next preset queued for this user, if any
    ///
    /// Expressions that are not a single known dice term leave the queue alone.
    pub fn roll_queued(
        &mut self,
        expr: &str,
        mode: RollMode,
        profile: &mut LuckProfile,
        queue: &mut PresetQueue,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Outcome, Error> {
        validate_dice_expression(expr.trim())?;
        let preset = match DiceKind::parse(expr) {
            Some(_) => queue.pop(user, expr, now),
            None => None,
        };
        self.roll_at(expr, mode, profile, preset, now)
    }
}
