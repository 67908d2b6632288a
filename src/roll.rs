//! Dice notation evaluator
//!
//! Handles everything the weighted paths don't: big pools, sums of several
//! dice terms, keep/drop, exploding dice, rerolls and per die floors and
//! ceilings. Rolls here are always fair.
//!
//! Operators apply in the order they are written. Those that pick dice take a
//! selector: `N` for dice showing exactly N, `>N` and `<N` for dice above or
//! below it, and for `k`/`p` also `hN`/`lN` for the N highest or lowest.
//!
//! | op | effect |
//! |---|---|
//! | `k` | keep the selected dice, drop the rest |
//! | `p` | drop the selected dice (`dh`/`dl` are `ph`/`pl`) |
//! | `ro` | reroll selected dice once |
//! | `rr` | reroll selected dice until they no longer match |
//! | `ra` | roll one extra die if any die matches |
//! | `e`, `!` | roll an extra die for every match, extra dice included |
//! | `mi`, `ma` | raise or lower every die to a bound |

use std::fmt::{self, Display};
use std::str::FromStr;

use rand::Rng;

use crate::engine::Fallback;
use crate::regex;
use crate::result::{Die, RollResult, Term};
use crate::{Error, Pcg};

/// Extra dice a term can explode into, per die rolled
pub const MAX_EXPLOSIONS: u32 = 100;
/// Times a single die can be rerolled with `rr`
pub const MAX_REROLLS: u32 = 100;

/// A sum of dice terms and flat modifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roll {
    terms: Vec<DiceTerm>,
    /// Amount to add/subtract to the sum of the rolls
    modifier: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DiceTerm {
    negative: bool,
    /// Number of dice
    amount: u16,
    /// Number of sides
    sides: u16,
    ops: Vec<Op>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Keep(Selector),
    Drop(Selector),
    Reroll(RerollKind, Compare),
    Explode(Compare),
    Min(u16),
    Max(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RerollKind {
    /// `ro`
    Once,
    /// `rr`
    Recursive,
    /// `ra`
    Add,
}

/// Which dice an operator applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selector {
    Value(Compare),
    Highest(u16),
    Lowest(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compare {
    Equal(u16),
    Less(u16),
    Greater(u16),
}

impl Compare {
    fn matches(self, val: i64) -> bool {
        match self {
            Compare::Equal(n) => val == i64::from(n),
            Compare::Less(n) => val < i64::from(n),
            Compare::Greater(n) => val > i64::from(n),
        }
    }
}

impl Display for Compare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compare::Equal(n) => write!(f, "{n}"),
            Compare::Less(n) => write!(f, "<{n}"),
            Compare::Greater(n) => write!(f, ">{n}"),
        }
    }
}

impl Selector {
    /// Indices of the kept dice this selects
    fn pick(self, dice: &[Die]) -> Vec<usize> {
        let mut kept: Vec<usize> = (0..dice.len()).filter(|&i| !dice[i].drop).collect();
        match self {
            Selector::Value(cmp) => {
                kept.retain(|&i| cmp.matches(dice[i].val));
                kept
            }
            Selector::Highest(n) => {
                kept.sort_by_key(|&i| std::cmp::Reverse(dice[i].val));
                kept.truncate(n as usize);
                kept
            }
            Selector::Lowest(n) => {
                kept.sort_by_key(|&i| dice[i].val);
                kept.truncate(n as usize);
                kept
            }
        }
    }
}

/// Error from [`Roll::from_str`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RollParseError {
    #[error("unsupported dice expression")]
    NoMatch,
    #[error("invalid dice roll: {0}")]
    Invalid(String),
}

fn invalid(msg: impl Into<String>) -> RollParseError {
    RollParseError::Invalid(msg.into())
}

fn parse_number(s: &str, what: &str) -> Result<u16, RollParseError> {
    s.parse::<u16>()
        .map_err(|e| invalid(format!("bad {what}: {e}")))
}

fn parse_nonzero(s: &str, what: &str) -> Result<u16, RollParseError> {
    match parse_number(s, what)? {
        0 => Err(invalid(format!("{what} can't be 0"))),
        n => Ok(n),
    }
}

impl FromStr for Roll {
    type Err = RollParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let re = regex!(r"([+-]?)(?:(\d*)d(\d+|%)([a-z!<>\d]*)|(\d+))");

        let s = s.trim().to_ascii_lowercase();
        let mut roll = Roll {
            terms: Vec::new(),
            modifier: 0,
        };

        let mut pos = 0;
        for caps in re.captures_iter(&s) {
            let whole = caps.get(0).map_or(pos..pos, |m| m.range());
            let signed = !caps[1].is_empty();
            if whole.start != pos || signed == (pos == 0) {
                break;
            }
            pos = whole.end;
            let negative = &caps[1] == "-";

            if let Some(flat) = caps.get(5) {
                let term = flat
                    .as_str()
                    .parse::<i64>()
                    .map_err(|e| invalid(format!("bad modifier: {e}")))?;
                let term = if negative { -term } else { term };
                roll.modifier = roll
                    .modifier
                    .checked_add(term)
                    .ok_or_else(|| invalid("modifier out of range"))?;
                continue;
            }

            let amount = match caps.get(2).map(|m| m.as_str()) {
                None | Some("") => 1,
                Some(num) => parse_nonzero(num, "amount")?,
            };
            let sides = match &caps[3] {
                "%" => 100,
                num => parse_nonzero(num, "number of sides")?,
            };
            let mut term = DiceTerm {
                negative,
                amount,
                sides,
                ops: Vec::new(),
            };
            term.parse_ops(&caps[4])?;
            roll.terms.push(term);
        }

        if roll.terms.is_empty() || pos != s.len() {
            return Err(RollParseError::NoMatch);
        }
        Ok(roll)
    }
}

impl DiceTerm {
    fn parse_ops(&mut self, ops: &str) -> Result<(), RollParseError> {
        let re = regex!(r"(rr|ro|ra|mi|ma|k|p|d|e|!)([hl<>]?)(\d*)");

        let mut pos = 0;
        for caps in re.captures_iter(ops) {
            let whole = caps.get(0).map_or(pos..pos, |m| m.range());
            if whole.start != pos {
                return Err(invalid(format!("unknown operator: {}", &ops[pos..whole.start])));
            }
            pos = whole.end;

            let (op, sel, num) = (&caps[1], &caps[2], &caps[3]);
            let op = match op {
                "k" | "p" | "d" => {
                    let selector = self.selector(op, sel, num)?;
                    if op == "k" {
                        Op::Keep(selector)
                    } else {
                        Op::Drop(selector)
                    }
                }
                "e" | "!" => {
                    let cmp = if sel.is_empty() && num.is_empty() {
                        Compare::Equal(self.sides)
                    } else {
                        self.compare(op, sel, num)?
                    };
                    if (1..=i64::from(self.sides)).all(|v| cmp.matches(v)) {
                        return Err(invalid("every result would explode"));
                    }
                    Op::Explode(cmp)
                }
                "ro" | "rr" | "ra" => {
                    let kind = match op {
                        "ro" => RerollKind::Once,
                        "rr" => RerollKind::Recursive,
                        _ => RerollKind::Add,
                    };
                    Op::Reroll(kind, self.compare(op, sel, num)?)
                }
                _ => {
                    if !sel.is_empty() {
                        return Err(invalid(format!("'{op}' does not take a selector")));
                    }
                    if num.is_empty() {
                        return Err(invalid(format!("'{op}' needs a value")));
                    }
                    if op == "mi" {
                        Op::Min(parse_number(num, "minimum")?)
                    } else {
                        Op::Max(parse_number(num, "maximum")?)
                    }
                }
            };
            self.ops.push(op);
        }

        if pos != ops.len() {
            return Err(invalid(format!("unknown operator: {}", &ops[pos..])));
        }
        Ok(())
    }

    fn selector(&self, op: &str, sel: &str, num: &str) -> Result<Selector, RollParseError> {
        // `kh`, `dl`... without a count pick one die
        let count = || {
            if num.is_empty() {
                Ok(1)
            } else {
                parse_nonzero(num, "select amount")
            }
        };
        match (op, sel) {
            (_, "h") => Ok(Selector::Highest(count()?)),
            (_, "l") => Ok(Selector::Lowest(count()?)),
            ("k", "") if num.is_empty() => Ok(Selector::Highest(1)),
            ("d", "") if num.is_empty() => Ok(Selector::Lowest(1)),
            ("d", _) => Err(invalid("'d' needs h or l, use 'p' to drop by value")),
            _ => Ok(Selector::Value(self.compare(op, sel, num)?)),
        }
    }

    fn compare(&self, op: &str, sel: &str, num: &str) -> Result<Compare, RollParseError> {
        if num.is_empty() {
            return Err(invalid(format!("'{op}' needs a value")));
        }
        let n = parse_number(num, op)?;
        match sel {
            "" => Ok(Compare::Equal(n)),
            "<" => Ok(Compare::Less(n)),
            ">" => Ok(Compare::Greater(n)),
            _ => Err(invalid(format!("'{op}' can't select the highest or lowest dice"))),
        }
    }

    fn roll_die(&self, rng: &mut Pcg) -> Die {
        Die::new(i64::from(rng.gen_range(1..=self.sides)))
    }

    fn eval(&self, rng: &mut Pcg) -> Vec<Die> {
        let mut dice: Vec<Die> = (0..self.amount).map(|_| self.roll_die(rng)).collect();

        for op in &self.ops {
            match *op {
                Op::Keep(sel) => {
                    let picked = sel.pick(&dice);
                    for (i, die) in dice.iter_mut().enumerate() {
                        if !picked.contains(&i) {
                            die.drop = true;
                        }
                    }
                }
                Op::Drop(sel) => {
                    for i in sel.pick(&dice) {
                        dice[i].drop = true;
                    }
                }
                Op::Reroll(RerollKind::Add, cmp) => {
                    if dice.iter().any(|d| !d.drop && cmp.matches(d.val)) {
                        dice.push(self.roll_die(rng));
                    }
                }
                Op::Reroll(kind, cmp) => {
                    let tries = if kind == RerollKind::Recursive { MAX_REROLLS } else { 1 };
                    for i in Selector::Value(cmp).pick(&dice) {
                        dice[i].drop = true;
                        let mut new = self.roll_die(rng);
                        for _ in 1..tries {
                            if !cmp.matches(new.val) {
                                break;
                            }
                            new = self.roll_die(rng);
                        }
                        dice.push(new);
                    }
                }
                Op::Explode(cmp) => {
                    let limit = u32::from(self.amount) * MAX_EXPLOSIONS;
                    let mut exploded = 0;
                    let mut i = 0;
                    while i < dice.len() && exploded < limit {
                        if !dice[i].drop && cmp.matches(dice[i].val) {
                            dice.push(self.roll_die(rng));
                            exploded += 1;
                        }
                        i += 1;
                    }
                }
                Op::Min(min) => dice
                    .iter_mut()
                    .for_each(|d| d.val = d.val.max(i64::from(min))),
                Op::Max(max) => dice
                    .iter_mut()
                    .for_each(|d| d.val = d.val.min(i64::from(max))),
            }
        }

        dice
    }
}

impl Roll {
    pub fn eval(&self, rng: &mut Pcg) -> RollResult {
        let terms = self
            .terms
            .iter()
            .map(|term| Term {
                negative: term.negative,
                dice: term.eval(rng),
            })
            .collect();
        RollResult::terms(self.to_string(), terms, self.modifier)
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = |n: u16| if n > 1 { n.to_string() } else { String::new() };
        match *self {
            Op::Keep(Selector::Highest(n)) => write!(f, "kh{}", count(n)),
            Op::Keep(Selector::Lowest(n)) => write!(f, "kl{}", count(n)),
            Op::Keep(Selector::Value(cmp)) => write!(f, "k{cmp}"),
            Op::Drop(Selector::Highest(n)) => write!(f, "dh{}", count(n)),
            Op::Drop(Selector::Lowest(n)) => write!(f, "dl{}", count(n)),
            Op::Drop(Selector::Value(cmp)) => write!(f, "p{cmp}"),
            Op::Reroll(RerollKind::Once, cmp) => write!(f, "ro{cmp}"),
            Op::Reroll(RerollKind::Recursive, cmp) => write!(f, "rr{cmp}"),
            Op::Reroll(RerollKind::Add, cmp) => write!(f, "ra{cmp}"),
            Op::Explode(cmp) => write!(f, "e{cmp}"),
            Op::Min(n) => write!(f, "mi{n}"),
            Op::Max(n) => write!(f, "ma{n}"),
        }
    }
}

impl Display for DiceTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.amount > 1 {
            write!(f, "{}", self.amount)?;
        }
        write!(f, "d{}", self.sides)?;
        for op in &self.ops {
            match op {
                Op::Explode(Compare::Equal(n)) if *n == self.sides => f.write_str("!")?,
                op => write!(f, "{op}")?,
            }
        }
        Ok(())
    }
}

impl Display for Roll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if term.negative {
                f.write_str("-")?;
            } else if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{term}")?;
        }
        if self.modifier != 0 {
            write!(f, "{:+}", self.modifier)?;
        }
        Ok(())
    }
}

/// [`Fallback`] backed by [`Roll`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NotationFallback;

impl Fallback for NotationFallback {
    fn evaluate(&self, expr: &str, rng: &mut Pcg) -> Result<RollResult, Error> {
        let roll: Roll = expr.parse()?;
        Ok(roll.eval(rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Breakdown;
    use rand::SeedableRng;
    use test_case::test_case;

    fn rng() -> Pcg {
        Pcg::seed_from_u64(11)
    }

    fn dice(res: &RollResult) -> &[Die] {
        match res.breakdown() {
            Breakdown::Dice(dice) => dice,
            other => panic!("not dice: {other:?}"),
        }
    }

    #[test_case("d20" => "d20")]
    #[test_case("4D6KH3" => "4d6kh3" ; "uppercase")]
    #[test_case("4d6k" => "4d6kh" ; "bare keep")]
    #[test_case("4d6k3" => "4d6k3" ; "keep threes")]
    #[test_case("4d6d" => "4d6dl" ; "bare drop")]
    #[test_case("1d%" => "d100")]
    #[test_case("2d20kl1+3-1" => "2d20kl+2")]
    #[test_case("3d6!" => "3d6!")]
    #[test_case("3d6e6" => "3d6!" ; "explode on max")]
    #[test_case("3d6e>4" => "3d6e>4" ; "explode above")]
    #[test_case("1d20ro<3" => "d20ro<3")]
    #[test_case("1d20rr1" => "d20rr1")]
    #[test_case("2d6ra1" => "2d6ra1")]
    #[test_case("8d6ma6p1" => "8d6ma6p1")]
    #[test_case("6d6ph2" => "6d6dh2" ; "drop highest")]
    #[test_case("4d6mi2ma5" => "4d6mi2ma5")]
    #[test_case("4d6ro1ro2kh3" => "4d6ro1ro2kh3" ; "chained")]
    #[test_case("1d20+1d6+2" => "d20+d6+2" ; "two terms")]
    #[test_case("2d20kh1-1d4" => "2d20kh-d4" ; "subtracted term")]
    fn parse(input: &str) -> String {
        input.parse::<Roll>().unwrap().to_string()
    }

    #[test_case("coin" => RollParseError::NoMatch)]
    #[test_case("4dF" => RollParseError::NoMatch ; "fudge")]
    #[test_case("1d20+4dF" => RollParseError::NoMatch ; "fudge term")]
    #[test_case("+1d20" => RollParseError::NoMatch ; "leading sign")]
    #[test_case("5" => RollParseError::NoMatch ; "no dice")]
    #[test_case("0d6" => matches RollParseError::Invalid(_) ; "zero dice")]
    #[test_case("1d0" => matches RollParseError::Invalid(_) ; "no sides")]
    #[test_case("4d6x" => matches RollParseError::Invalid(_) ; "unknown op")]
    #[test_case("4d6ro" => matches RollParseError::Invalid(_) ; "reroll without value")]
    #[test_case("4d6roh1" => matches RollParseError::Invalid(_) ; "reroll highest")]
    #[test_case("4d6d3" => matches RollParseError::Invalid(_) ; "drop by value needs p")]
    #[test_case("4d6mi>2" => matches RollParseError::Invalid(_) ; "min with compare")]
    #[test_case("1d1!" => matches RollParseError::Invalid(_) ; "always explodes")]
    #[test_case("1d6e<7" => matches RollParseError::Invalid(_) ; "always explodes below")]
    #[test_case("99999d6" => matches RollParseError::Invalid(_) ; "too many")]
    fn parse_err(input: &str) -> RollParseError {
        input.parse::<Roll>().unwrap_err()
    }

    #[test]
    fn keep_highest_drops_the_rest() {
        let roll: Roll = "4d6kh3".parse().unwrap();
        let mut rng = rng();
        for _ in 0..100 {
            let res = roll.eval(&mut rng);
            let dice = dice(&res);
            assert_eq!(dice.len(), 4);
            assert_eq!(dice.iter().filter(|d| d.drop).count(), 1);
            let lowest = dice.iter().map(|d| d.val).min().unwrap();
            let kept: i64 = dice.iter().map(|d| d.val).sum::<i64>() - lowest;
            assert_eq!(res.dice_total(), kept);
        }
    }

    #[test]
    fn keep_by_value() {
        let roll: Roll = "20d6k6".parse().unwrap();
        let res = roll.eval(&mut rng());
        assert!(res.taken_dice().all(|v| v == 6));
        assert_eq!(dice(&res).len(), 20);
    }

    #[test]
    fn drop_matching_dice() {
        let roll: Roll = "30d6p<3".parse().unwrap();
        let res = roll.eval(&mut rng());
        assert!(res.taken_dice().all(|v| v >= 3));
        let dropped = dice(&res).iter().filter(|d| d.drop).count();
        assert!(dropped > 0);
        assert!(dice(&res).iter().filter(|d| d.drop).all(|d| d.val < 3));
    }

    #[test]
    fn reroll_until_it_passes() {
        let roll: Roll = "1d20rr<20".parse().unwrap();
        let mut rng = rng();
        // with 100 rerolls a d20 almost always reaches 20
        let twenties = (0..100)
            .filter(|_| roll.eval(&mut rng).dice_total() == 20)
            .count();
        assert!(twenties > 90);
    }

    #[test]
    fn reroll_once_replaces_the_die() {
        let roll: Roll = "50d6ro1".parse().unwrap();
        let res = roll.eval(&mut rng());
        let dice = dice(&res);
        let dropped: Vec<_> = dice.iter().filter(|d| d.drop).collect();
        assert!(!dropped.is_empty());
        assert!(dropped.iter().all(|d| d.val == 1));
        assert_eq!(dice.len(), 50 + dropped.len());
        assert_eq!(res.taken_dice().count(), 50);
    }

    #[test]
    fn reroll_and_add_rolls_one_more() {
        let roll: Roll = "10d6ra<7".parse().unwrap();
        let res = roll.eval(&mut rng());
        assert_eq!(res.taken_dice().count(), 11);

        let roll: Roll = "3d6ra7".parse().unwrap();
        let res = roll.eval(&mut rng());
        assert_eq!(res.taken_dice().count(), 3);
    }

    #[test]
    fn explode_on_an_exact_value() {
        let roll: Roll = "1d6e1".parse().unwrap();
        let mut rng = rng();
        for _ in 0..200 {
            let res = roll.eval(&mut rng);
            let vals: Vec<_> = res.taken_dice().collect();
            // every die but the last is a 1
            let (last, rest) = vals.split_last().unwrap();
            assert!(rest.iter().all(|&v| v == 1));
            assert!(*last != 1 || vals.len() == 1 + MAX_EXPLOSIONS as usize);
        }
    }

    #[test]
    fn min_and_max_clamp() {
        let roll: Roll = "10d20mi5ma15".parse().unwrap();
        let mut rng = rng();
        let res = roll.eval(&mut rng);
        assert!(res.taken_dice().all(|v| (5..=15).contains(&v)));
    }

    #[test]
    fn max_then_drop() {
        let roll: Roll = "40d6ma3p3".parse().unwrap();
        let res = roll.eval(&mut rng());
        assert!(res.taken_dice().all(|v| v < 3));
    }

    #[test]
    fn explosions_are_capped() {
        let roll: Roll = "1d2!2".parse().unwrap();
        let mut rng = rng();
        for _ in 0..50 {
            let res = roll.eval(&mut rng);
            let count = res.taken_dice().count();
            assert!(count >= 1 && count <= 1 + MAX_EXPLOSIONS as usize);
        }
    }

    #[test]
    fn exploding_adds_dice() {
        let roll: Roll = "100d6!".parse().unwrap();
        let mut rng = rng();
        let res = roll.eval(&mut rng);
        assert!(res.taken_dice().count() > 100);
    }

    #[test]
    fn modifier_in_total() {
        let roll: Roll = "3d1+4".parse().unwrap();
        let res = roll.eval(&mut rng());
        assert_eq!(res.total(), 7);
        assert_eq!(res.modifier(), 4);
    }

    #[test]
    fn every_term_is_rolled() {
        let roll: Roll = "1d20+1d6".parse().unwrap();
        let mut rng = rng();
        let totals: Vec<_> = (0..2000).map(|_| roll.eval(&mut rng).total()).collect();
        assert!(totals.iter().all(|t| (2..=26).contains(t)));
        assert!(totals.iter().any(|&t| t > 21));

        let res: RollResult = "2d1-3d1+10".parse::<Roll>().unwrap().eval(&mut rng);
        assert_eq!(res.dice_total(), -1);
        assert_eq!(res.total(), 9);
    }

    #[test]
    fn fallback_errors() {
        let mut rng = rng();
        assert!(NotationFallback.evaluate("2d20kh1", &mut rng).is_ok());
        assert!(NotationFallback.evaluate("1d20+1d4", &mut rng).is_ok());
        assert!(matches!(
            NotationFallback.evaluate("4dF", &mut rng),
            Err(Error::Expr(RollParseError::NoMatch))
        ));
    }
}
