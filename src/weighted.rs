//! Debt weighted sampling
//!
//! Positive debt means a user is owed good rolls and negative debt bad ones.
//! The samplers here lean the outcome that way while still drawing from a
//! proper distribution, and fall back to fair rolls when the debt is too small
//! to matter or the pool is one they have no table for.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::config::Bias;
use crate::fudge::{fudge_sum, generate_realistic_fudge_faces, roll_fudge_dice};
use crate::Pcg;

/// Ways to roll each sum of 1 to 6 fudge dice, lowest sum first, out of `3^n`
const FUDGE_SUM_WAYS: [&[u32]; 6] = [
    &[1, 1, 1],
    &[1, 2, 3, 2, 1],
    &[1, 3, 6, 7, 6, 3, 1],
    &[1, 4, 10, 16, 19, 16, 10, 4, 1],
    &[1, 5, 15, 30, 45, 51, 45, 30, 15, 5, 1],
    &[1, 6, 21, 50, 90, 126, 141, 126, 90, 50, 21, 6, 1],
];

/// Largest fudge pool with a known sum distribution
pub const MAX_TABLED_FUDGE_DICE: u32 = FUDGE_SUM_WAYS.len() as u32;

/// Exact `(sum, probability)` table for `count` fudge dice
///
/// Only available for 1 to [`MAX_TABLED_FUDGE_DICE`] dice.
pub fn fudge_sum_distribution(count: u32) -> Option<Vec<(i64, f64)>> {
    let ways = FUDGE_SUM_WAYS.get(count.checked_sub(1)? as usize)?;
    let outcomes = 3f64.powi(count as i32);
    let lowest = -i64::from(count);
    Some(
        ways.iter()
            .zip(lowest..)
            .map(|(&w, sum)| (sum, f64::from(w) / outcomes))
            .collect(),
    )
}

/// Unnormalized weight of each face `1..=sides`
pub fn face_weights(sides: u32, debt: f64, bias: &Bias) -> Vec<f64> {
    let strength = bias.strength(debt);
    let midpoint = (f64::from(sides) + 1.0) / 2.0;
    (1..=sides)
        .map(|face| {
            let face = f64::from(face);
            let favored = if debt > 0.0 {
                face > midpoint
            } else {
                face < midpoint
            };
            if favored {
                1.0 + strength * bias.boost
            } else {
                1.0 - strength * bias.penalty
            }
        })
        .collect()
}

/// Roll one die with `sides` faces, leaning toward good faces for positive
/// debt and bad faces for negative debt
///
/// Below the bias threshold this is a fair roll.
pub fn roll_weighted_standard_die(rng: &mut Pcg, sides: u32, debt: f64, bias: &Bias) -> u32 {
    let sides = sides.max(1);
    if !bias.is_active(debt) {
        return rng.gen_range(1..=sides);
    }
    match WeightedIndex::new(face_weights(sides, debt, bias)) {
        Ok(dist) => dist.sample(rng) as u32 + 1,
        // only reachable with a penalty that zeroes every face
        Err(_) => rng.gen_range(1..=sides),
    }
}

/// Biased `(sum, probability)` table for `count` fudge dice
///
/// Positive sums are favored for positive debt and negative sums for negative
/// debt. A sum of zero keeps its weight. The result is normalized again.
pub fn weighted_fudge_distribution(count: u32, debt: f64, bias: &Bias) -> Option<Vec<(i64, f64)>> {
    let table = fudge_sum_distribution(count)?;
    let strength = bias.strength(debt);
    let favored = if debt > 0.0 { 1 } else { -1 };

    let mut table: Vec<(i64, f64)> = table
        .into_iter()
        .map(|(sum, p)| {
            let scale = match sum.signum() {
                0 => 1.0,
                s if s == favored => 1.0 + strength * bias.boost,
                _ => 1.0 - strength * bias.penalty,
            };
            (sum, p * scale)
        })
        .collect();

    let total: f64 = table.iter().map(|(_, p)| p).sum();
    if total <= 0.0 {
        return None;
    }
    for (_, p) in &mut table {
        *p /= total;
    }
    Some(table)
}

/// Roll `count` fudge dice leaning the sum toward the debt's side
///
/// Returns the faces and their sum. Pools without a table and debts below the
/// threshold are rolled fairly, one die at a time.
pub fn roll_weighted_fudge_dice(rng: &mut Pcg, count: u32, debt: f64, bias: &Bias) -> (Vec<i8>, i64) {
    let table = bias
        .is_active(debt)
        .then(|| weighted_fudge_distribution(count, debt, bias))
        .flatten();

    let target = table.and_then(|table| {
        let dist = WeightedIndex::new(table.iter().map(|(_, p)| *p)).ok()?;
        Some(table[dist.sample(rng)].0)
    });

    match target {
        Some(target) => (generate_realistic_fudge_faces(rng, count, target), target),
        None => {
            let faces = roll_fudge_dice(rng, count);
            let sum = fudge_sum(&faces);
            (faces, sum)
        }
    }
}
