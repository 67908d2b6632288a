//! Roll results

use std::fmt::{self, Display};

use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};

use crate::fallout::{total_damage, total_effects, FalloutFace};
use crate::fudge::{face_glyph, fudge_bonus, fudge_sum};

/// Result of any roll the engine makes
///
/// The [`Display`] [alternate modifier](std::fmt#sign0) will only print
/// [`RollResult::total`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    /// Expression as the user wrote it
    expr: String,
    breakdown: Breakdown,
    /// Flat `±k` terms
    modifier: i64,
}

/// What was actually on the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Breakdown {
    Dice(Vec<Die>),
    /// Several dice terms added or subtracted, like `1d20+1d6`
    Terms(Vec<Term>),
    Fudge(Vec<i8>),
    Fallout(Vec<FalloutFace>),
    /// A value set ahead of time, no dice to show
    Preset(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Die {
    pub val: i64,
    pub drop: bool,
}

impl Die {
    pub fn new(val: i64) -> Self {
        Self { val, drop: false }
    }
}

/// Dice of one term of a sum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// Subtracted from the total
    pub negative: bool,
    pub dice: Vec<Die>,
}

impl Term {
    fn total(&self) -> i64 {
        let sum: i64 = self.dice.iter().filter(|d| !d.drop).map(|d| d.val).sum();
        if self.negative {
            -sum
        } else {
            sum
        }
    }
}

impl RollResult {
    pub fn dice(expr: impl Into<String>, dice: Vec<Die>, modifier: i64) -> Self {
        Self::new(expr, Breakdown::Dice(dice), modifier)
    }

    /// A sum of dice terms, one term is the same as [`RollResult::dice`]
    pub fn terms(expr: impl Into<String>, mut terms: Vec<Term>, modifier: i64) -> Self {
        if terms.len() == 1 && !terms[0].negative {
            let dice = terms.pop().map(|t| t.dice).unwrap_or_default();
            return Self::dice(expr, dice, modifier);
        }
        Self::new(expr, Breakdown::Terms(terms), modifier)
    }

    pub fn fudge(expr: impl Into<String>, faces: Vec<i8>, modifier: i64) -> Self {
        Self::new(expr, Breakdown::Fudge(faces), modifier)
    }

    pub fn fallout(expr: impl Into<String>, faces: Vec<FalloutFace>, modifier: i64) -> Self {
        Self::new(expr, Breakdown::Fallout(faces), modifier)
    }

    /// A forced dice total, `modifier` is still added on top
    pub fn preset(expr: impl Into<String>, value: i64, modifier: i64) -> Self {
        Self::new(expr, Breakdown::Preset(value), modifier)
    }

    fn new(expr: impl Into<String>, breakdown: Breakdown, modifier: i64) -> Self {
        Self {
            expr: expr.into(),
            breakdown,
            modifier,
        }
    }

    /// Show the result under a different expression
    pub fn with_expr(mut self, expr: impl Into<String>) -> Self {
        self.expr = expr.into();
        self
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn breakdown(&self) -> &Breakdown {
        &self.breakdown
    }

    pub fn modifier(&self) -> i64 {
        self.modifier
    }

    /// Values of the dice that count, negated for subtracted terms
    pub fn taken_dice(&self) -> Box<dyn Iterator<Item = i64> + '_> {
        let taken = |d: &Die| (!d.drop).then_some(d.val);
        match &self.breakdown {
            Breakdown::Dice(dice) => Box::new(dice.iter().filter_map(taken)),
            Breakdown::Terms(terms) => Box::new(terms.iter().flat_map(move |t| {
                let sign = if t.negative { -1 } else { 1 };
                t.dice.iter().filter_map(taken).map(move |v| sign * v)
            })),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Sum of the dice alone, the value that gets a percentile
    pub fn dice_total(&self) -> i64 {
        match &self.breakdown {
            Breakdown::Dice(_) => self.taken_dice().sum(),
            Breakdown::Terms(terms) => terms.iter().map(Term::total).sum(),
            Breakdown::Fudge(faces) => fudge_sum(faces),
            Breakdown::Fallout(faces) => total_damage(faces),
            Breakdown::Preset(value) => *value,
        }
    }

    /// Extra points for an all `+` or all `-` fudge pool
    pub fn bonus(&self) -> i64 {
        match &self.breakdown {
            Breakdown::Fudge(faces) => fudge_bonus(faces),
            _ => 0,
        }
    }

    /// Fallout effects rolled
    pub fn effects(&self) -> u32 {
        match &self.breakdown {
            Breakdown::Fallout(faces) => total_effects(faces),
            _ => 0,
        }
    }

    /// Total value
    pub fn total(&self) -> i64 {
        self.dice_total()
            .saturating_add(self.bonus())
            .saturating_add(self.modifier)
    }
}

impl Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return self.total().fmt(f);
        }

        write!(f, "{}: ", self.expr.bright_white())?;

        match &self.breakdown {
            Breakdown::Dice(dice) => {
                if dice.len() > 1 || self.modifier != 0 {
                    print_list(f, dice, "+".dimmed())?;
                    print_modifier(f, self.modifier)?;
                    write!(f, " = ")?;
                }
                write!(f, "{}", self.total().bold())
            }
            Breakdown::Terms(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if term.negative {
                        f.write_str("-")?;
                    } else if i > 0 {
                        f.write_str("+")?;
                    }
                    print_list(f, &term.dice, "+".dimmed())?;
                }
                print_modifier(f, self.modifier)?;
                write!(f, " = {}", self.total().bold())
            }
            Breakdown::Fudge(faces) => {
                let glyphs: Vec<_> = faces.iter().map(|&v| face_glyph(v)).collect();
                print_list(f, &glyphs, " ")?;
                print_modifier(f, self.modifier)?;
                match self.bonus() {
                    0 => {}
                    1.. => write!(f, " {}", format!("{:+} bonus", self.bonus()).green())?,
                    _ => write!(f, " {}", format!("{:+} bonus", self.bonus()).red())?,
                }
                write!(f, " = {}", self.total().bold())
            }
            Breakdown::Fallout(faces) => {
                print_list(f, faces, " ")?;
                print_modifier(f, self.modifier)?;
                write!(f, " = {} damage", self.total().bold())?;
                match self.effects() {
                    0 => Ok(()),
                    1 => write!(f, ", {}", "1 effect".yellow()),
                    n => write!(f, ", {}", format!("{n} effects").yellow()),
                }
            }
            Breakdown::Preset(value) => {
                if self.modifier != 0 {
                    write!(f, "{value}")?;
                    print_modifier(f, self.modifier)?;
                    write!(f, " = ")?;
                }
                write!(f, "{}", self.total().bold())
            }
        }
    }
}

impl Display for Die {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.drop {
            write!(f, "{}{}", self.val.dimmed().red(), "d".dimmed().red())
        } else {
            self.val.fmt(f)
        }
    }
}

fn print_list<T: Display>(f: &mut fmt::Formatter<'_>, items: &[T], sep: impl Display) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str("]")
}

pub(crate) fn print_modifier(f: &mut fmt::Formatter<'_>, modifier: i64) -> fmt::Result {
    match modifier {
        0 => Ok(()),
        1.. => write!(f, "{:+}", modifier.green()),
        ..=-1 => write!(f, "{:+}", modifier.red()),
    }
}
