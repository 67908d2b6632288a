//! Fudge dice faces
//!
//! Weighted fudge rolls pick a sum first. The functions here turn that sum back
//! into individual faces that look like they came from real dice.

use rand::seq::{index, SliceRandom};
use rand::Rng;

use crate::Pcg;

/// Faces of a fudge die
pub const FUDGE_FACES: [i8; 3] = [-1, 0, 1];

/// Chance that one spreading step moves a point between two dice
const SPREAD_CHANCE: f64 = 0.3;

/// Roll `count` fair fudge dice
pub fn roll_fudge_dice(rng: &mut Pcg, count: u32) -> Vec<i8> {
    (0..count).map(|_| rng.gen_range(-1..=1)).collect()
}

pub fn fudge_sum(faces: &[i8]) -> i64 {
    faces.iter().map(|&f| i64::from(f)).sum()
}

/// Leading faces set to +1 or -1 until `target` is reached, zeros after
fn greedy_fill(count: u32, target: i64) -> Vec<i8> {
    let max = i64::from(count);
    let mut remaining = target.clamp(-max, max);
    (0..count)
        .map(|_| match remaining {
            1.. => {
                remaining -= 1;
                1
            }
            ..=-1 => {
                remaining += 1;
                -1
            }
            0 => 0,
        })
        .collect()
}

/// Faces summing to `target` (clamped to the possible range), in random order
///
/// Deterministic in everything except the order, which makes it a good fit
/// for forcing a known result.
pub fn generate_fudge_dice_for_sum(rng: &mut Pcg, count: u32, target: i64) -> Vec<i8> {
    let mut dice = greedy_fill(count, target);
    dice.shuffle(rng);
    dice
}

/// Faces summing to `target` (clamped to the possible range) that don't look
/// arranged
///
/// Starts from the greedy fill and then moves single points between random
/// pairs of dice, so a sum of +1 on four dice can come out as `+ + - ☐`
/// instead of always `+ ☐ ☐ ☐`. The sum never changes.
pub fn generate_realistic_fudge_faces(rng: &mut Pcg, count: u32, target: i64) -> Vec<i8> {
    let mut dice = greedy_fill(count, target);
    let len = dice.len();
    if len < 2 {
        return dice;
    }

    for _ in 0..len * 2 {
        let pair = index::sample(rng, len, 2);
        let (i, j) = (pair.index(0), pair.index(1));

        if dice[i] > -1 && dice[j] < 1 {
            if rng.gen_bool(SPREAD_CHANCE) {
                dice[i] -= 1;
                dice[j] += 1;
            }
        } else if dice[i] < 1 && dice[j] > -1 && rng.gen_bool(SPREAD_CHANCE) {
            dice[i] += 1;
            dice[j] -= 1;
        }
    }

    dice.shuffle(rng);
    dice
}

/// Bonus for a pool showing all `+` or all `-`
///
/// Half the number of dice, rounded up, with the sign of the faces.
pub fn fudge_bonus(faces: &[i8]) -> i64 {
    if faces.is_empty() {
        return 0;
    }
    let half = (faces.len() as i64 + 1) / 2;
    if faces.iter().all(|&f| f == 1) {
        half
    } else if faces.iter().all(|&f| f == -1) {
        -half
    } else {
        0
    }
}

/// How a fudge face is shown
pub fn face_glyph(face: i8) -> &'static str {
    match face {
        1.. => "+",
        0 => "☐",
        _ => "-",
    }
}
