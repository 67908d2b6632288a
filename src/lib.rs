//! Probability weighted dice
//!
//! Dice that can lean toward good or bad results. In luck mode a user has a
//! fixed luck value; in karma mode every roll below the median builds up debt
//! that later rolls pay back, so streaks even out without the dice ever being
//! fixed.
//!
//! ```
//! use chimera_dice::{Engine, LuckProfile, RollMode};
//!
//! let mut engine = Engine::with_seed(7);
//! let mut profile = LuckProfile::default();
//! let out = engine.roll("1d20+5", RollMode::Karma, &mut profile, None)?;
//! assert!((6..=25).contains(&out.result.total()));
//! assert_eq!(profile.karma_rolls, 1);
//! # Ok::<(), chimera_dice::Error>(())
//! ```
//!
//! The building blocks are public too: [`notation`] for validating and
//! rewriting expressions, [`percentile`] to rank a result, [`weighted`] for the
//! biased samplers and [`fudge`] to turn a fudge sum back into faces.
//! [`cpr`] has the Cyberpunk RED d10 check and critical injury tables.
//!
//! All [`Display`](std::fmt::Display) implementations of the crate *may*
//! output ANSI color codes. Use something like
//! [anstream](https://docs.rs/anstream/) if you dont want colors.

pub mod config;
pub mod cpr;
pub mod engine;
pub mod fallout;
pub mod fudge;
pub mod luck;
pub mod notation;
pub mod percentile;
pub mod queue;
pub mod result;
pub mod roll;
pub mod weighted;

pub use rand_pcg::Pcg64 as Pcg;

pub use config::{Bias, Tuning};
pub use engine::{Engine, Fallback, Outcome};
pub use luck::{LuckProfile, RecentLuck, RollMode, RollRecord};
pub use notation::{DiceKind, InvalidExpression};
pub use queue::PresetQueue;
pub use result::RollResult;
pub use roll::RollParseError;

macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).unwrap())
    }};
}
pub(crate) use regex;

/// Roll error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected by [`notation::validate_dice_expression`]
    #[error("invalid dice expression: {0}")]
    Invalid(#[from] InvalidExpression),
    /// The fallback evaluator could not read the expression
    #[error("expression: {0}")]
    Expr(#[from] RollParseError),
    /// Preset values that can't be rolled
    #[error("preset: {0}")]
    Preset(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}
