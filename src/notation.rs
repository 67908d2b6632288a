//! Dice notation helpers
//!
//! Everything here works on the raw text a user typed: splitting off flat
//! modifiers, safety validation, lookup keys and rewriting drop syntax into the
//! keep form the evaluator understands. [`DiceKind`] is the parsed shape that
//! the rest of the crate matches on.

use regex::Captures;

use crate::regex;

/// Longest accepted expression, in characters
pub const MAX_EXPRESSION_LEN: usize = 150;
/// Largest bare number allowed outside operator tokens
pub const MAX_NUMBER: u64 = 1000;
/// Most dice in a single `<N>d<S>` term
pub const MAX_DICE: u64 = 100;
/// Most sides on a single die
pub const MAX_SIDES: u64 = 1000;

/// Reason a dice expression was rejected by [`validate_dice_expression`]
///
/// The [`Display`](std::fmt::Display) output is meant to be shown to users.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidExpression {
    #[error("empty dice expression")]
    Empty,
    #[error("dice expression too long (max 150 characters)")]
    TooLong,
    #[error("negative numbers not allowed: {0}")]
    Negative(String),
    #[error("number too large: {0} (max 1000)")]
    NumberTooLarge(String),
    #[error("too many dice: {0} (max 100)")]
    TooManyDice(u64),
    #[error("too many fudge dice: {0} (max 100)")]
    TooManyFudgeDice(u64),
    #[error("too many fallout dice: {0} (max 100)")]
    TooManyFalloutDice(u64),
    #[error("die size too large: {0} (max 1000)")]
    DieTooLarge(u64),
    #[error("invalid die size: {0} (min 1)")]
    DieTooSmall(u64),
}

/// Split an expression into its dice part and the sum of its flat modifiers
///
/// ```
/// use chimera_dice::notation::parse_dice_modifiers;
/// assert_eq!(parse_dice_modifiers("4df+5+2-1"), ("4df", 6));
/// assert_eq!(parse_dice_modifiers("1d20"), ("1d20", 0));
/// ```
///
/// Input without a leading dice part is returned untouched with a modifier of 0.
pub fn parse_dice_modifiers(expr: &str) -> (&str, i64) {
    let Some(dice) = regex!(r"\A[^+-]+").find(expr) else {
        return (expr, 0);
    };
    let rest = &expr[dice.end()..];

    let modifier = regex!(r"([+-])(\d+)")
        .captures_iter(rest)
        .map(|caps| {
            // only overflow can fail here
            let value = caps[2].parse::<i64>().unwrap_or(i64::MAX);
            if &caps[1] == "-" {
                -value
            } else {
                value
            }
        })
        .fold(0i64, i64::saturating_add);

    (dice.as_str(), modifier)
}

/// Check an expression against the safety limits
///
/// This never panics, whatever the input. Operator tokens (`kh3`, `ro<2`,
/// `e6`...) are stripped before looking for oversized numbers so their counts
/// are not mistaken for bare numbers.
pub fn validate_dice_expression(expr: &str) -> Result<(), InvalidExpression> {
    if expr.is_empty() {
        return Err(InvalidExpression::Empty);
    }
    if expr.chars().count() > MAX_EXPRESSION_LEN {
        return Err(InvalidExpression::TooLong);
    }
    if let Some(caps) = regex!(r"\A\s*(-\d+)").captures(expr) {
        return Err(InvalidExpression::Negative(caps[1].to_string()));
    }

    let stripped = regex!(r"[<>]\d+").replace_all(expr, "");
    let stripped = regex!(r"(?i)(kh|kl|dh|dl|ro|rr|ra|e|mi|ma|p)\d*").replace_all(&stripped, "");
    for num in regex!(r"\d+").find_iter(&stripped) {
        let too_large = num.as_str().parse::<u64>().map_or(true, |n| n > MAX_NUMBER);
        if too_large {
            return Err(InvalidExpression::NumberTooLarge(num.as_str().to_string()));
        }
    }

    let lower = expr.to_lowercase();
    for caps in regex!(r"(\d+)d(\d+)").captures_iter(&lower) {
        let count = parse_limit(&caps[1]);
        let sides = parse_limit(&caps[2]);
        if count > MAX_DICE {
            return Err(InvalidExpression::TooManyDice(count));
        }
        if sides > MAX_SIDES {
            return Err(InvalidExpression::DieTooLarge(sides));
        }
        if sides < 1 {
            return Err(InvalidExpression::DieTooSmall(sides));
        }
    }

    for caps in regex!(r"(\d+)d([fd])?").captures_iter(&lower) {
        let count = parse_limit(&caps[1]);
        if count <= MAX_DICE {
            continue;
        }
        return Err(match caps.get(2).map(|m| m.as_str()) {
            Some("d") => InvalidExpression::TooManyFalloutDice(count),
            Some(_) => InvalidExpression::TooManyFudgeDice(count),
            None => InvalidExpression::TooManyDice(count),
        });
    }

    Ok(())
}

fn parse_limit(digits: &str) -> u64 {
    digits.parse().unwrap_or(u64::MAX)
}

/// Lookup key for an expression: no modifiers, lowercase, explicit count
///
/// ```
/// use chimera_dice::notation::normalize_dice_key;
/// assert_eq!(normalize_dice_key("d20+5"), "1d20");
/// assert_eq!(normalize_dice_key("4DF"), "4df");
/// ```
pub fn normalize_dice_key(expr: &str) -> String {
    let (dice, _) = parse_dice_modifiers(expr);
    let key = dice.to_lowercase();
    if key.starts_with('d') {
        format!("1{key}")
    } else {
        key
    }
}

/// Rewrite drop syntax into keep syntax and make keep counts explicit
///
/// `4d6dl1` becomes `4d6kh3`, `3d20dh` becomes `3d20kl2` and a bare `2d20kh`
/// becomes `2d20kh1`. A drop that would remove every die is left as written.
pub fn translate_dice_syntax(expr: &str) -> String {
    let expr = regex!(r"(\d+)d(\d+)dl(\d*)").replace_all(expr, |caps: &Captures| drop_to_keep(caps, "kh"));
    let expr = regex!(r"(\d+)d(\d+)dh(\d*)").replace_all(&expr, |caps: &Captures| drop_to_keep(caps, "kl"));
    let expr = regex!(r"(\d+)d(\d+)(k[hl])(\d*)").replace_all(&expr, |caps: &Captures| {
        let keep = if caps[4].is_empty() { "1" } else { &caps[4] };
        format!("{}d{}{}{keep}", &caps[1], &caps[2], &caps[3])
    });
    expr.into_owned()
}

fn drop_to_keep(caps: &Captures, keep_op: &str) -> String {
    let total = caps[1].parse::<i64>().ok();
    let dropped = match &caps[3] {
        "" => Some(1),
        n => n.parse::<i64>().ok(),
    };
    match (total, dropped) {
        (Some(total), Some(dropped)) if total - dropped > 0 => {
            format!("{total}d{}{keep_op}{}", &caps[2], total - dropped)
        }
        _ => caps[0].to_string(),
    }
}

/// The leading `<N>d<S>` of an expression, lowercased
///
/// Falls back to the dice part from [`parse_dice_modifiers`] when there is no
/// plain `<N>d<S>` at the start.
pub fn extract_base_dice(expr: &str) -> String {
    let lower = expr.to_lowercase();
    match regex!(r"\A\d+d\d+").find(&lower) {
        Some(m) => m.as_str().to_string(),
        None => parse_dice_modifiers(expr).0.to_string(),
    }
}

/// Whether the expression uses any operator beyond plain `<N>d<S>`
pub fn has_advanced_operation(expr: &str) -> bool {
    regex!(r"(?i)(kh|kl|dh|dl|ro|rr|ra|e|mi|ma|p)\d*").is_match(expr)
}

/// Split `"1d20+5 perception"` into the expression and an optional label
pub fn parse_roll_and_label(input: &str) -> (&str, Option<&str>) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((roll, label)) => {
            let label = label.trim();
            (roll, (!label.is_empty()).then_some(label))
        }
        None => (input, None),
    }
}

/// Shape of a dice expression, parsed once from its normalized key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiceKind {
    /// Plain `<N>d<S>`
    Standard { count: u32, sides: u32 },
    /// `<N>dF`, faces -1, 0 and +1
    Fudge { count: u32 },
    /// `<N>dD`, Fallout damage dice
    Fallout { count: u32 },
    /// `<N>d<S>` followed by operators
    Advanced {
        count: u32,
        sides: u32,
        select: Option<Select>,
    },
}

/// Select a subset of the dice rolled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Select {
    /// What to do with the selected dice
    pub action: SelectAction,
    /// Which dice to select
    pub which: SelectWhich,
    /// Number of dice to select
    pub amount: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectAction {
    Keep,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectWhich {
    High,
    Low,
}

impl Select {
    /// Parse the first keep/drop token in an operator string
    fn find(ops: &str) -> Option<Self> {
        let caps = regex!(r"(kh|kl|dh|dl)(\d*)").captures(ops)?;
        let (action, which) = match &caps[1] {
            "kh" => (SelectAction::Keep, SelectWhich::High),
            "kl" => (SelectAction::Keep, SelectWhich::Low),
            "dh" => (SelectAction::Drop, SelectWhich::High),
            _ => (SelectAction::Drop, SelectWhich::Low),
        };
        let amount = match &caps[2] {
            "" => 1,
            n => n.parse().ok()?,
        };
        Some(Select {
            action,
            which,
            amount,
        })
    }

    /// Number of dice that end up kept out of `count`, and which end they come from
    ///
    /// Dropping the lowest is keeping the highest of the rest, and the other way
    /// around.
    pub fn kept(&self, count: u32) -> (u32, SelectWhich) {
        match (self.action, self.which) {
            (SelectAction::Keep, which) => (self.amount, which),
            (SelectAction::Drop, SelectWhich::High) => {
                (count.saturating_sub(self.amount), SelectWhich::Low)
            }
            (SelectAction::Drop, SelectWhich::Low) => {
                (count.saturating_sub(self.amount), SelectWhich::High)
            }
        }
    }
}

impl DiceKind {
    /// Parse the dice family of an expression
    ///
    /// Flat modifiers are ignored. Returns [`None`] for anything that is not a
    /// single known dice term followed by `±k` terms, like `coin`, `2d6x` or
    /// `1d20+1d6`.
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();
        if !regex!(r"\A[^+-]*(?:[+-]\d+)*\z").is_match(expr) {
            return None;
        }
        let key = normalize_dice_key(expr);

        if let Some(caps) = regex!(r"\A(\d+)df\z").captures(&key) {
            return Some(DiceKind::Fudge {
                count: parse_count(&caps[1])?,
            });
        }
        if let Some(caps) = regex!(r"\A(\d+)dd\z").captures(&key) {
            return Some(DiceKind::Fallout {
                count: parse_count(&caps[1])?,
            });
        }

        let caps = regex!(r"\A(\d+)d(\d+)(.*)\z").captures(&key)?;
        let count = parse_count(&caps[1])?;
        let sides = parse_count(&caps[2])?;
        let ops = &caps[3];
        if ops.is_empty() {
            return Some(DiceKind::Standard { count, sides });
        }
        if !has_advanced_operation(ops) {
            return None;
        }
        Some(DiceKind::Advanced {
            count,
            sides,
            select: Select::find(ops),
        })
    }

    /// Number of dice rolled, before any selection
    pub fn count(&self) -> u32 {
        match *self {
            DiceKind::Standard { count, .. }
            | DiceKind::Fudge { count }
            | DiceKind::Fallout { count }
            | DiceKind::Advanced { count, .. } => count,
        }
    }
}

fn parse_count(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}
