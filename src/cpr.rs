//! Cyberpunk RED dice
//!
//! Skill checks roll a d10 that explodes on a 10 and implodes on a 1. Damage
//! pools of d6 are critical with two or more sixes, and a critical hit rolls
//! 2d6 on the injury table of the hit location.

use std::fmt;
use std::str::FromStr;

use owo_colors::OwoColorize;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Error, Pcg};

/// A d10 skill check die
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CprD10 {
    /// 2 to 9, nothing else happens
    Normal(u8),
    /// Rolled a 10 and added a second d10
    Exploded(u8),
    /// Rolled a 1 and subtracted a second d10
    Imploded(u8),
}

impl CprD10 {
    /// The first die
    pub fn base(&self) -> u8 {
        match *self {
            CprD10::Normal(v) => v,
            CprD10::Exploded(_) => 10,
            CprD10::Imploded(_) => 1,
        }
    }

    /// Die total, from -9 to 20
    pub fn total(&self) -> i64 {
        match *self {
            CprD10::Normal(v) => i64::from(v),
            CprD10::Exploded(extra) => 10 + i64::from(extra),
            CprD10::Imploded(extra) => 1 - i64::from(extra),
        }
    }

    /// Show the die roll with a skill modifier
    pub fn with_modifier(self, modifier: i64) -> CprCheck {
        CprCheck {
            roll: self,
            modifier,
        }
    }
}

pub fn roll_cpr_d10(rng: &mut Pcg) -> CprD10 {
    match rng.gen_range(1..=10) {
        10 => CprD10::Exploded(rng.gen_range(1..=10)),
        1 => CprD10::Imploded(rng.gen_range(1..=10)),
        base => CprD10::Normal(base),
    }
}

/// A d10 and the skill modifier it was rolled with
///
/// [`Display`](fmt::Display) shows the dice part of the result. An implosion
/// also shows the total without the second die, which a player can keep by
/// spending Luck.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CprCheck {
    pub roll: CprD10,
    pub modifier: i64,
}

impl CprCheck {
    pub fn total(&self) -> i64 {
        self.roll.total().saturating_add(self.modifier)
    }
}

impl fmt::Display for CprCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.roll {
            CprD10::Normal(v) => write!(f, "({v})"),
            CprD10::Exploded(extra) => write!(f, "(10->10!+{extra})"),
            CprD10::Imploded(extra) => {
                let luck = 1i64.saturating_add(self.modifier);
                write!(
                    f,
                    "(1->1!-{extra}) [Luck? {} (1{:+})]",
                    luck.bold(),
                    self.modifier
                )
            }
        }
    }
}

/// Two or more sixes in a d6 damage pool
pub fn check_cpr_d6_critical(dice: &[i64]) -> bool {
    dice.iter().filter(|&&v| v == 6).count() >= 2
}

/// Where a critical injury lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitLocation {
    Body,
    Head,
}

impl FromStr for HitLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "body" => Ok(HitLocation::Body),
            "head" => Ok(HitLocation::Head),
            other => Err(Error::Unsupported(format!("unknown hit location: {other}"))),
        }
    }
}

impl HitLocation {
    fn table(self) -> &'static [CriticalInjury; 11] {
        match self {
            HitLocation::Body => &CPR_CRITICAL_BODY,
            HitLocation::Head => &CPR_CRITICAL_HEAD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CriticalInjury {
    pub name: &'static str,
    pub effect: &'static str,
    pub quick_fix: &'static str,
    pub treatment: &'static str,
}

impl fmt::Display for CriticalInjury {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name.bold())?;
        writeln!(f, "{}", self.effect)?;
        writeln!(f, "{} {}", "Quick Fix:".dimmed(), self.quick_fix)?;
        write!(f, "{} {}", "Treatment:".dimmed(), self.treatment)
    }
}

const fn injury(
    name: &'static str,
    effect: &'static str,
    quick_fix: &'static str,
    treatment: &'static str,
) -> CriticalInjury {
    CriticalInjury {
        name,
        effect,
        quick_fix,
        treatment,
    }
}

const MOVE_PENALTY_EFFECT: &str = "At the end of every Turn where you move further than 4m/yds on foot, you re-suffer this Critical Injury's Bonus Damage directly to your Hit Points.";

/// Critical injuries to the body, for 2d6 results 2 to 12
pub static CPR_CRITICAL_BODY: [CriticalInjury; 11] = [
    injury(
        "Dismembered Arm",
        "The Dismembered Arm is gone. You drop any items in that dismembered arm's hand immediately. Base Death Save Penalty is increased by 1.",
        "N/A",
        "Surgery DV17",
    ),
    injury(
        "Dismembered Hand",
        "The Dismembered Hand is gone. You drop any items in the dismembered hand immediately. Base Death Save Penalty is increased by 1.",
        "N/A",
        "Surgery DV17",
    ),
    injury(
        "Collapsed Lung",
        "-2 to MOVE (minimum 1). Base Death Save Penalty is increased by 1.",
        "Paramedic DV15",
        "Surgery DV15",
    ),
    injury(
        "Broken Ribs",
        MOVE_PENALTY_EFFECT,
        "Paramedic DV13",
        "Paramedic DV15 or Surgery DV13",
    ),
    injury(
        "Broken Arm",
        "The Broken Arm cannot be used. You drop any items in that arm's hand immediately.",
        "Paramedic DV13",
        "Paramedic DV15 or Surgery DV13",
    ),
    injury(
        "Foreign Object",
        MOVE_PENALTY_EFFECT,
        "First Aid or Paramedic DV13",
        "Quick Fix removes Injury Effect permanently",
    ),
    injury(
        "Broken Leg",
        "-4 to MOVE (minimum 1).",
        "Paramedic DV13",
        "Paramedic DV15 or Surgery DV13",
    ),
    injury(
        "Torn Muscle",
        "-2 to Melee Attacks.",
        "First Aid or Paramedic DV13",
        "Quick Fix removes Injury Effect permanently",
    ),
    injury(
        "Spinal Injury",
        "Next Turn, you cannot take an Action, but you can still take a Move Action. Base Death Save Penalty is increased by 1.",
        "Paramedic DV15",
        "Surgery DV15",
    ),
    injury(
        "Crushed Fingers",
        "-4 to all Actions involving that hand.",
        "Paramedic DV13",
        "Surgery DV15",
    ),
    injury(
        "Dismembered Leg",
        "The Dismembered Leg is gone. -6 to MOVE (minimum 1). You cannot dodge attacks. Base Death Save Penalty is increased by 1.",
        "N/A",
        "Surgery DV17",
    ),
];

/// Critical injuries to the head, for 2d6 results 2 to 12
pub static CPR_CRITICAL_HEAD: [CriticalInjury; 11] = [
    injury(
        "Lost Eye",
        "The Lost Eye is gone. -4 to Ranged Attacks & Perception Checks involving vision. Base Death Save Penalty is increased by 1.",
        "N/A",
        "Surgery DV17",
    ),
    injury(
        "Brain Injury",
        "-2 to all Actions. Base Death Save Penalty is increased by 1.",
        "N/A",
        "Surgery DV17",
    ),
    injury(
        "Damaged Eye",
        "-2 to Ranged Attacks & Perception Checks involving vision.",
        "Paramedic DV15",
        "Surgery DV13",
    ),
    injury(
        "Concussion",
        "-2 to all Actions.",
        "First Aid or Paramedic DV13",
        "Quick Fix removes Injury Effect permanently",
    ),
    injury(
        "Broken Jaw",
        "-4 to all Actions involving speech.",
        "Paramedic DV13",
        "Paramedic or Surgery DV13",
    ),
    injury(
        "Foreign Object",
        MOVE_PENALTY_EFFECT,
        "First Aid or Paramedic DV13",
        "Quick Fix removes Injury Effect permanently",
    ),
    injury(
        "Whiplash",
        "Base Death Save Penalty is increased by 1.",
        "Paramedic DV13",
        "Paramedic or Surgery DV13",
    ),
    injury(
        "Cracked Skull",
        "Aimed Shots to your head multiply the damage that gets through your SP by 3 instead of 2. Base Death Save Penalty is increased by 1.",
        "Paramedic DV15",
        "Paramedic or Surgery DV15",
    ),
    injury(
        "Damaged Ear",
        "Whenever you move further than 4m/yds on foot in a Turn, you cannot take a Move Action on your next Turn. Additionally you take a -2 to Perception Checks involving hearing.",
        "Paramedic DV13",
        "Surgery DV13",
    ),
    injury(
        "Crushed Windpipe",
        "You cannot speak. Base Death Save Penalty is increased by 1.",
        "N/A",
        "Surgery DV15",
    ),
    injury(
        "Lost Ear",
        "The Lost Ear is gone. Whenever you move further than 4m/yds on foot in a Turn, you cannot take a Move Action on your next Turn. Additionally you take a -4 to Perception Checks involving hearing. Base Death Save Penalty is increased by 1.",
        "N/A",
        "Surgery DV17",
    ),
];

/// Injury for a 2d6 result, [`None`] outside 2..=12
pub fn lookup_cpr_critical_injury(location: HitLocation, roll: i64) -> Option<&'static CriticalInjury> {
    let index = usize::try_from(roll.checked_sub(2)?).ok()?;
    location.table().get(index)
}

/// Roll 2d6 on the injury table of `location`
pub fn roll_cpr_critical_injury(rng: &mut Pcg, location: HitLocation) -> (i64, &'static CriticalInjury) {
    let roll: i64 = rng.gen_range(1..=6) + rng.gen_range(1..=6);
    (roll, &location.table()[(roll - 2) as usize])
}
