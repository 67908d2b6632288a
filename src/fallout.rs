//! Fallout combat dice
//!
//! A d6 with faces `1`, `2`, `0`, `0`, `1E`, `1E`, where `E` marks an effect.

use std::fmt;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::Pcg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FalloutFace {
    pub damage: u8,
    pub effect: bool,
}

impl FalloutFace {
    pub const fn new(damage: u8, effect: bool) -> Self {
        Self { damage, effect }
    }
}

impl fmt::Display for FalloutFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.damage)?;
        if self.effect {
            f.write_str("E")?;
        }
        Ok(())
    }
}

pub const FALLOUT_FACES: [FalloutFace; 6] = [
    FalloutFace::new(1, false),
    FalloutFace::new(2, false),
    FalloutFace::new(0, false),
    FalloutFace::new(0, false),
    FalloutFace::new(1, true),
    FalloutFace::new(1, true),
];

/// Highest damage on a single face
pub const MAX_FACE_DAMAGE: u8 = 2;

pub fn roll_fallout_dice(rng: &mut Pcg, count: u32) -> Vec<FalloutFace> {
    (0..count)
        .map(|_| *FALLOUT_FACES.choose(rng).unwrap_or(&FALLOUT_FACES[0]))
        .collect()
}

/// Faces adding up to `damage`, highest first
///
/// Damage beyond what the pool can show is capped. Forced faces never carry
/// effects.
pub fn fallout_faces_for_damage(count: u32, damage: i64) -> Vec<FalloutFace> {
    let mut remaining = damage.max(0);
    (0..count)
        .map(|_| {
            let face = remaining.min(i64::from(MAX_FACE_DAMAGE));
            remaining -= face;
            FalloutFace::new(face as u8, false)
        })
        .collect()
}

pub fn total_damage(faces: &[FalloutFace]) -> i64 {
    faces.iter().map(|f| i64::from(f.damage)).sum()
}

pub fn total_effects(faces: &[FalloutFace]) -> u32 {
    faces.iter().filter(|f| f.effect).count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use test_case::test_case;

    #[test]
    fn display() {
        let shown: Vec<_> = FALLOUT_FACES.iter().map(ToString::to_string).collect();
        assert_eq!(shown, ["1", "2", "0", "0", "1E", "1E"]);
    }

    #[test]
    fn rolls_real_faces() {
        let mut rng = Pcg::seed_from_u64(3);
        let faces = roll_fallout_dice(&mut rng, 50);
        assert_eq!(faces.len(), 50);
        assert!(faces.iter().all(|f| FALLOUT_FACES.contains(f)));
        assert!(total_damage(&faces) <= 100);
    }

    #[test_case(3, 4 => vec![2, 2, 0])]
    #[test_case(3, 5 => vec![2, 2, 1])]
    #[test_case(2, 0 => vec![0, 0])]
    #[test_case(2, 9 => vec![2, 2] ; "capped")]
    #[test_case(2, -1 => vec![0, 0] ; "negative")]
    fn forced(count: u32, damage: i64) -> Vec<u8> {
        let faces = fallout_faces_for_damage(count, damage);
        assert_eq!(total_effects(&faces), 0);
        faces.iter().map(|f| f.damage).collect()
    }

    #[test]
    fn totals() {
        let faces = [FALLOUT_FACES[1], FALLOUT_FACES[4], FALLOUT_FACES[5], FALLOUT_FACES[2]];
        assert_eq!(total_damage(&faces), 4);
        assert_eq!(total_effects(&faces), 2);
    }
}
