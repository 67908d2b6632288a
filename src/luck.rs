//! Per user luck and karma state

use std::fmt::{self, Write};
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Error;

/// Percentile history size that starts getting warnings
const LARGE_HISTORY: usize = 1000;

/// How a roll is made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollMode {
    /// Fair dice
    #[default]
    Standard,
    /// Dice biased by the user's set luck
    Luck,
    /// Dice biased by the user's accumulated debt, which the roll then pays off
    Karma,
}

impl RollMode {
    pub fn emoji(self) -> &'static str {
        match self {
            RollMode::Standard => "🎲",
            RollMode::Luck => "🍀",
            RollMode::Karma => "⚖️",
        }
    }
}

impl FromStr for RollMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "roll" => Ok(RollMode::Standard),
            "luck" | "lroll" => Ok(RollMode::Luck),
            "karma" | "kroll" => Ok(RollMode::Karma),
            other => Err(Error::Unsupported(format!("unknown roll mode: {other}"))),
        }
    }
}

impl fmt::Display for RollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RollMode::Standard => "standard",
            RollMode::Luck => "luck",
            RollMode::Karma => "karma",
        })
    }
}

/// One roll in a user's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollRecord {
    pub at: DateTime<Utc>,
    pub mode: RollMode,
    pub expr: String,
    pub total: i64,
    pub percentile: Option<f64>,
}

/// Rolls over a recent window, see [`LuckProfile::recent_luck`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecentLuck {
    pub rolls: usize,
    /// Mean percentile of the rolls that have one
    pub luck: Option<f64>,
}

/// Everything the engine remembers about a user between rolls
///
/// The host is expected to store it somewhere; every field has a default so
/// older records keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LuckProfile {
    /// How far below the median the user's karma rolls have landed, in
    /// percentile points. Positive means good rolls are owed.
    pub percentile_debt: f64,
    /// Fixed luck for luck mode, 50 is neutral
    pub set_luck: u8,
    /// Mean of [`percentile_history`](Self::percentile_history)
    pub natural_luck: f64,
    pub percentile_history: Vec<f64>,
    pub standard_rolls: u64,
    pub luck_rolls: u64,
    pub karma_rolls: u64,
    /// Every roll, oldest first
    pub history: Vec<RollRecord>,
}

impl Default for LuckProfile {
    fn default() -> Self {
        Self {
            percentile_debt: 0.0,
            set_luck: 50,
            natural_luck: 50.0,
            percentile_history: Vec::new(),
            standard_rolls: 0,
            luck_rolls: 0,
            karma_rolls: 0,
            history: Vec::new(),
        }
    }
}

impl LuckProfile {
    pub fn total_rolls(&self) -> u64 {
        self.standard_rolls + self.luck_rolls + self.karma_rolls
    }

    /// Book a finished roll
    ///
    /// Every roll is counted and kept in the history. Rolls with a percentile
    /// also feed natural luck, and karma rolls with one move the debt.
    pub fn record_roll(&mut self, record: RollRecord, debt_limit: f64) {
        let counter = match record.mode {
            RollMode::Standard => &mut self.standard_rolls,
            RollMode::Luck => &mut self.luck_rolls,
            RollMode::Karma => &mut self.karma_rolls,
        };
        *counter = counter.saturating_add(1);

        if let Some(p) = record.percentile {
            self.record_percentile(p);
            if record.mode == RollMode::Karma {
                self.apply_karma(p, debt_limit);
            }
        }
        self.history.push(record);
    }

    /// Rolls made in the `window` before `now`, and how lucky they were
    pub fn recent_luck(&self, now: DateTime<Utc>, window: TimeDelta) -> RecentLuck {
        let cutoff = now - window;
        let recent = || self.history.iter().filter(move |r| r.at >= cutoff);
        let percentiles: Vec<f64> = recent().filter_map(|r| r.percentile).collect();
        RecentLuck {
            rolls: recent().count(),
            luck: (!percentiles.is_empty())
                .then(|| percentiles.iter().sum::<f64>() / percentiles.len() as f64),
        }
    }

    /// Plain text dump of the history, grouped by mode
    pub fn export_history(&self) -> String {
        let mut out = String::new();
        for mode in [RollMode::Standard, RollMode::Luck, RollMode::Karma] {
            let mut rolls = self.history.iter().filter(|r| r.mode == mode).peekable();
            if rolls.peek().is_none() {
                continue;
            }
            let _ = writeln!(out, "=== {mode} rolls ===");
            for r in rolls {
                let _ = writeln!(out, "{}: {} = {}", r.at.to_rfc3339(), r.expr, r.total);
            }
            out.push('\n');
        }
        out
    }

    /// Add a percentile to the history and recompute natural luck
    pub fn record_percentile(&mut self, percentile: f64) {
        self.percentile_history.push(percentile);
        let len = self.percentile_history.len();
        if len > LARGE_HISTORY && len % 100 == 0 {
            warn!(entries = len, "large percentile history");
        }
        self.natural_luck = self.percentile_history.iter().sum::<f64>() / len as f64;
    }

    /// Move the debt by how far `percentile` is from the median
    ///
    /// A roll under the median adds debt, one over it pays it back.
    pub fn apply_karma(&mut self, percentile: f64, limit: f64) {
        let limit = limit.abs();
        let debt = self.percentile_debt + (50.0 - percentile);
        let clamped = debt.clamp(-limit, limit);
        if clamped != debt {
            warn!(debt, limit, "percentile debt clamped");
        }
        self.percentile_debt = clamped;
    }

    /// Debt that biases a roll in this mode
    pub fn effective_debt(&self, mode: RollMode) -> f64 {
        match mode {
            RollMode::Standard => 0.0,
            RollMode::Luck => f64::from(self.set_luck) - 50.0,
            RollMode::Karma => self.percentile_debt,
        }
    }

    /// Set luck, clamped to 0..=100
    pub fn set_luck(&mut self, luck: i64) {
        self.set_luck = luck.clamp(0, 100) as u8;
    }

    pub fn set_debt(&mut self, debt: f64, limit: f64) {
        let limit = limit.abs();
        self.percentile_debt = if debt.is_nan() {
            0.0
        } else {
            debt.clamp(-limit, limit)
        };
    }

    pub fn reset_debt(&mut self) {
        self.percentile_debt = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("standard" => RollMode::Standard)]
    #[test_case("roll" => RollMode::Standard ; "roll alias")]
    #[test_case("LUCK" => RollMode::Luck)]
    #[test_case("lroll" => RollMode::Luck ; "lroll alias")]
    #[test_case("kroll" => RollMode::Karma)]
    fn mode_from_str(s: &str) -> RollMode {
        s.parse().unwrap()
    }

    #[test]
    fn mode_round_trips_through_display() {
        for mode in [RollMode::Standard, RollMode::Luck, RollMode::Karma] {
            assert_eq!(mode.to_string().parse::<RollMode>().unwrap(), mode);
        }
        assert!("chaos".parse::<RollMode>().is_err());
    }

    #[test]
    fn natural_luck_is_the_mean() {
        let mut p = LuckProfile::default();
        assert_eq!(p.natural_luck, 50.0);
        p.record_percentile(60.0);
        p.record_percentile(40.0);
        p.record_percentile(80.0);
        assert_eq!(p.natural_luck, 60.0);
    }

    #[test]
    fn karma_moves_and_clamps() {
        let mut p = LuckProfile::default();
        p.apply_karma(10.0, 100.0);
        assert_eq!(p.percentile_debt, 40.0);
        p.apply_karma(90.0, 100.0);
        assert_eq!(p.percentile_debt, 0.0);
        for _ in 0..5 {
            p.apply_karma(0.0, 100.0);
        }
        assert_eq!(p.percentile_debt, 100.0);
        for _ in 0..5 {
            p.apply_karma(100.0, 100.0);
        }
        assert_eq!(p.percentile_debt, -100.0);
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn record(mode: RollMode, percentile: Option<f64>, hours_ago: i64) -> RollRecord {
        RollRecord {
            at: t0() - TimeDelta::hours(hours_ago),
            mode,
            expr: "1d20".to_string(),
            total: 10,
            percentile,
        }
    }

    #[test]
    fn only_karma_touches_debt() {
        let mut p = LuckProfile::default();
        p.record_roll(record(RollMode::Standard, Some(10.0), 0), 100.0);
        p.record_roll(record(RollMode::Luck, Some(10.0), 0), 100.0);
        assert_eq!(p.percentile_debt, 0.0);
        p.record_roll(record(RollMode::Karma, Some(10.0), 0), 100.0);
        assert_eq!(p.percentile_debt, 40.0);
        p.record_roll(record(RollMode::Karma, None, 0), 100.0);
        assert_eq!(p.percentile_debt, 40.0);
        assert_eq!(p.total_rolls(), 4);
        assert_eq!(p.percentile_history.len(), 3);
        assert_eq!(p.history.len(), 4);
        assert_eq!((p.standard_rolls, p.luck_rolls, p.karma_rolls), (1, 1, 2));
    }

    #[test]
    fn recent_luck_window() {
        let mut p = LuckProfile::default();
        p.record_roll(record(RollMode::Standard, Some(10.0), 30), 100.0);
        p.record_roll(record(RollMode::Luck, Some(60.0), 5), 100.0);
        p.record_roll(record(RollMode::Karma, Some(80.0), 1), 100.0);
        p.record_roll(record(RollMode::Standard, None, 0), 100.0);

        let day = p.recent_luck(t0(), TimeDelta::hours(24));
        assert_eq!(day.rolls, 3);
        assert_eq!(day.luck, Some(70.0));

        let hour = p.recent_luck(t0(), TimeDelta::hours(1));
        assert_eq!(hour.rolls, 2);
        assert_eq!(hour.luck, Some(80.0));

        let none = p.recent_luck(t0(), TimeDelta::minutes(30));
        assert_eq!(none, RecentLuck { rolls: 1, luck: None });
    }

    #[test]
    fn history_export() {
        let mut p = LuckProfile::default();
        assert_eq!(p.export_history(), "");
        p.record_roll(record(RollMode::Karma, Some(50.0), 0), 100.0);
        p.record_roll(record(RollMode::Standard, Some(50.0), 2), 100.0);
        let text = p.export_history();
        let standard = text.find("=== standard rolls ===").unwrap();
        let karma = text.find("=== karma rolls ===").unwrap();
        assert!(standard < karma);
        assert!(!text.contains("luck rolls"));
        assert!(text.contains("2024-05-01T10:00:00+00:00: 1d20 = 10"));
    }

    #[test]
    fn effective_debt_per_mode() {
        let mut p = LuckProfile::default();
        p.set_luck(80);
        p.set_debt(-30.0, 100.0);
        assert_eq!(p.effective_debt(RollMode::Standard), 0.0);
        assert_eq!(p.effective_debt(RollMode::Luck), 30.0);
        assert_eq!(p.effective_debt(RollMode::Karma), -30.0);
    }

    #[test]
    fn admin_setters_clamp() {
        let mut p = LuckProfile::default();
        p.set_luck(250);
        assert_eq!(p.set_luck, 100);
        p.set_luck(-4);
        assert_eq!(p.set_luck, 0);
        p.set_debt(500.0, 100.0);
        assert_eq!(p.percentile_debt, 100.0);
        p.reset_debt();
        assert_eq!(p.percentile_debt, 0.0);
    }

    #[test]
    fn old_records_load() {
        let mut p: LuckProfile = serde_json::from_str(r#"{ "set_luck": 70 }"#).unwrap();
        assert_eq!(p.set_luck, 70);
        assert_eq!(p.natural_luck, 50.0);
        assert!(p.history.is_empty());
        p.record_roll(record(RollMode::Luck, Some(42.0), 0), 100.0);
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(serde_json::from_str::<LuckProfile>(&json).unwrap(), p);
    }
}
