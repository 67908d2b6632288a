//! Percentile rank estimates for roll results
//!
//! Single dice and fudge dice use closed formulas. Sums of several dice and
//! keep/drop pools use monotonic approximations: they are what the karma debt
//! is tuned against, so they stay as they are even where they are not exact.

use tracing::debug;

use crate::notation::{DiceKind, Select, SelectWhich};

/// How much fudge results away from zero are pulled toward the median
const FUDGE_COMPRESSION: f64 = 0.8;
/// Power curve shaping for pools that keep the highest dice
const KEEP_HIGH_EXPONENT: f64 = 0.7;
/// Power curve shaping for pools that keep the lowest dice
const KEEP_LOW_EXPONENT: f64 = 1.4;

/// Percentile of a single die result, from the middle of its slot
///
/// ```
/// use chimera_dice::percentile::single_die_percentile;
/// assert_eq!(single_die_percentile(1, 20), Some(2.5));
/// assert_eq!(single_die_percentile(21, 20), None);
/// ```
pub fn single_die_percentile(result: i64, sides: u32) -> Option<f64> {
    if result < 1 || result > i64::from(sides) {
        return None;
    }
    Some((result as f64 - 0.5) / f64::from(sides) * 100.0)
}

/// Percentile of the sum of `count` dice with `sides` sides
///
/// Linear from the minimum up to the mean (0 to 50) and from the mean up to
/// the maximum (50 to 100).
pub fn multiple_dice_percentile(result: i64, count: u32, sides: u32) -> Option<f64> {
    let min = f64::from(count);
    let max = f64::from(count) * f64::from(sides);
    let result = result as f64;
    if result < min || result > max {
        return None;
    }

    let mean = f64::from(count) * (f64::from(sides) + 1.0) / 2.0;
    let percentile = if result <= mean {
        if mean <= min {
            return None;
        }
        (result - min) / (mean - min) * 50.0
    } else {
        50.0 + (result - mean) / (max - mean) * 50.0
    };
    Some(percentile.clamp(0.0, 100.0))
}

/// Percentile of the sum of `count` fudge dice
///
/// A sum of zero sits exactly on the median.
pub fn fudge_percentile(result: i64, count: u32) -> Option<f64> {
    let max = i64::from(count);
    let min = -max;
    if count == 0 || result < min || result > max {
        return None;
    }

    let position = (result - min) as f64 / (max - min) as f64;
    let percentile = match result {
        0 => 50.0,
        1.. => 50.0 + (position - 0.5) * 100.0 * FUDGE_COMPRESSION,
        _ => position * 100.0 * FUDGE_COMPRESSION,
    };
    Some(percentile.clamp(0.0, 100.0))
}

/// [`fudge_percentile`] for an expression like `"4dF"`
pub fn calculate_fudge_percentile(expr: &str, result: i64) -> Option<f64> {
    match DiceKind::parse(expr)? {
        DiceKind::Fudge { count } => fudge_percentile(result, count),
        _ => None,
    }
}

/// Percentile for a keep/drop pool, over the range of the kept dice
pub fn keep_percentile(select: &Select, result: i64, count: u32, sides: u32) -> Option<f64> {
    let (kept, which) = select.kept(count);
    let min = f64::from(kept);
    let max = f64::from(kept) * f64::from(sides);
    let result = result as f64;
    if result < min || result > max || max <= min {
        return None;
    }

    let position = (result - min) / (max - min);
    let exponent = match which {
        SelectWhich::High => KEEP_HIGH_EXPONENT,
        SelectWhich::Low => KEEP_LOW_EXPONENT,
    };
    Some((position.powf(exponent) * 100.0).clamp(0.0, 100.0))
}

/// Percentile of a raw dice total (no flat modifiers) for a parsed expression
///
/// Fallout dice are not modeled and always give [`None`].
pub fn percentile_of(kind: &DiceKind, result: i64) -> Option<f64> {
    match *kind {
        DiceKind::Fudge { count } => fudge_percentile(result, count),
        DiceKind::Fallout { .. } => None,
        DiceKind::Advanced {
            count,
            sides,
            select: Some(select),
        } => keep_percentile(&select, result, count, sides),
        DiceKind::Standard { count: 1, sides }
        | DiceKind::Advanced {
            count: 1,
            sides,
            select: None,
        } => single_die_percentile(result, sides),
        DiceKind::Standard { count, sides }
        | DiceKind::Advanced {
            count,
            sides,
            select: None,
        } => multiple_dice_percentile(result, count, sides),
    }
}

/// Percentile rank of `result` for the expression `expr`
///
/// Returns [`None`] for anything that can't be ranked: unknown notation,
/// Fallout dice or a result out of range. Callers just skip luck tracking for
/// that roll.
pub fn calculate_roll_percentile(expr: &str, result: i64) -> Option<f64> {
    let Some(kind) = DiceKind::parse(expr) else {
        debug!(expr, "no percentile for unrecognized notation");
        return None;
    };
    let percentile = percentile_of(&kind, result);
    match percentile {
        Some(p) => debug!(expr, result, percentile = p, "percentile calculated"),
        None => debug!(expr, result, "no percentile for this result"),
    }
    percentile
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test_case(1, 20 => Some(2.5))]
    #[test_case(20, 20 => Some(97.5))]
    #[test_case(3, 6 => Some(2.5 / 6.0 * 100.0))]
    #[test_case(1, 1 => Some(50.0) ; "one sided")]
    #[test_case(0, 20 => None)]
    #[test_case(21, 20 => None)]
    fn single(result: i64, sides: u32) -> Option<f64> {
        single_die_percentile(result, sides)
    }

    #[test]
    fn multiple_landmarks() {
        assert_eq!(multiple_dice_percentile(3, 3, 6), Some(0.0));
        assert_eq!(multiple_dice_percentile(18, 3, 6), Some(100.0));
        // 3d6 mean is 10.5
        let below = multiple_dice_percentile(10, 3, 6).unwrap();
        let above = multiple_dice_percentile(11, 3, 6).unwrap();
        assert!(below < 50.0 && above > 50.0);
        assert!(approx(below, 7.0 / 7.5 * 50.0));
        assert_eq!(multiple_dice_percentile(2, 3, 6), None);
        assert_eq!(multiple_dice_percentile(19, 3, 6), None);
    }

    #[test]
    fn multiple_one_sided_has_no_spread() {
        assert_eq!(multiple_dice_percentile(3, 3, 1), None);
    }

    #[test_case("4dF", 0 => Some(50.0))]
    #[test_case("4dF", 4 => Some(90.0))]
    #[test_case("4dF", -4 => Some(0.0))]
    #[test_case("4dF+2", 1 => Some(50.0 + (5.0 / 8.0 - 0.5) * 80.0) ; "modifier ignored")]
    #[test_case("4dF", 5 => None)]
    #[test_case("1d20", 5 => None ; "not fudge")]
    fn fudge(expr: &str, result: i64) -> Option<f64> {
        calculate_fudge_percentile(expr, result)
    }

    #[test]
    fn fudge_extremes() {
        for count in 1..=6 {
            let top = fudge_percentile(i64::from(count), count).unwrap();
            let bottom = fudge_percentile(-i64::from(count), count).unwrap();
            assert!(top > 80.0, "{count}dF max gave {top}");
            assert!(bottom < 20.0, "{count}dF min gave {bottom}");
            assert_eq!(fudge_percentile(0, count), Some(50.0));
        }
    }

    #[test]
    fn keep_highest_leans_high() {
        let kh = DiceKind::parse("4d6kh3").unwrap();
        let plain = DiceKind::parse("3d6").unwrap();
        assert_eq!(percentile_of(&kh, 3), Some(0.0));
        assert_eq!(percentile_of(&kh, 18), Some(100.0));
        let position: f64 = (12.0 - 3.0) / 15.0;
        assert!(approx(
            percentile_of(&kh, 12).unwrap(),
            position.powf(0.7) * 100.0
        ));
        assert!(percentile_of(&kh, 12).unwrap() > position * 100.0);
        assert!(percentile_of(&plain, 12).is_some());
    }

    #[test]
    fn drop_lowest_matches_keep_highest() {
        let dl = DiceKind::parse("4d6dl1").unwrap();
        let kh = DiceKind::parse("4d6kh3").unwrap();
        for result in 3..=18 {
            assert_eq!(percentile_of(&dl, result), percentile_of(&kh, result));
        }
    }

    #[test]
    fn drop_highest_leans_low() {
        let dh = DiceKind::parse("3d20dh1").unwrap();
        // keeps 2 lowest: range 2..=40
        let p = percentile_of(&dh, 21).unwrap();
        let position: f64 = 19.0 / 38.0;
        assert!(approx(p, position.powf(1.4) * 100.0));
        assert!(p < 50.0);
        assert_eq!(percentile_of(&dh, 41), None);
    }

    #[test]
    fn advantage_single_kept_die() {
        let adv = calculate_roll_percentile("2d20kh1", 20).unwrap();
        let dis = calculate_roll_percentile("2d20kl1", 20).unwrap();
        assert_eq!(adv, 100.0);
        assert_eq!(dis, 100.0);
        let adv = calculate_roll_percentile("2d20kh1", 10).unwrap();
        let dis = calculate_roll_percentile("2d20kl1", 10).unwrap();
        assert!(adv > dis);
    }

    #[test_case("1d20", 20 => Some(97.5))]
    #[test_case("1d20+5", 10 => Some(47.5) ; "modifiers stripped")]
    #[test_case("d20", 1 => Some(2.5))]
    #[test_case("3d6", 3 => Some(0.0))]
    #[test_case("1d20ro<3", 20 => Some(97.5) ; "reroll uses base dice")]
    #[test_case("3dD", 2 => None ; "fallout unsupported")]
    #[test_case("2d20dl2", 10 => None ; "dropping everything")]
    #[test_case("coin", 1 => None)]
    #[test_case("1d20", 25 => None)]
    fn dispatch(expr: &str, result: i64) -> Option<f64> {
        calculate_roll_percentile(expr, result)
    }

    proptest! {
        #[test]
        fn single_is_monotonic(sides in 1u32..=1000) {
            let mut last = 0.0;
            for result in 1..=i64::from(sides) {
                let p = single_die_percentile(result, sides).unwrap();
                prop_assert!((0.0..=100.0).contains(&p));
                prop_assert!(p >= last);
                last = p;
            }
        }

        #[test]
        fn multiple_hits_the_ends(count in 1u32..=100, sides in 2u32..=100) {
            let low = multiple_dice_percentile(i64::from(count), count, sides).unwrap();
            let high = multiple_dice_percentile(i64::from(count * sides), count, sides).unwrap();
            prop_assert!(low.abs() < 1e-9);
            prop_assert!((high - 100.0).abs() < 1e-9);
        }

        #[test]
        fn keep_is_monotonic(count in 2u32..=10, sides in 2u32..=20, keep in 1u32..=9) {
            prop_assume!(keep < count);
            let kind = DiceKind::parse(&format!("{count}d{sides}kh{keep}")).unwrap();
            let mut last = -1.0;
            for result in i64::from(keep)..=i64::from(keep * sides) {
                let p = percentile_of(&kind, result).unwrap();
                prop_assert!(p >= last);
                last = p;
            }
        }
    }
}
