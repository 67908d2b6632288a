//! Queued preset rolls
//!
//! An admin can line up the results a user's next rolls of a given expression
//! will show, which makes it possible to test a table setup end to end. Entries
//! are dropped once they get old.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::config::Tuning;
use crate::notation::{extract_base_dice, normalize_dice_key, DiceKind};
use crate::Error;

pub type UserId = u64;

/// How long presets stay queued unless configured otherwise
pub const DEFAULT_PRESET_TTL_HOURS: i64 = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PresetEntry {
    values: VecDeque<i64>,
    queued_at: DateTime<Utc>,
}

/// Preset values per user and dice expression
///
/// Expressions are keyed by [`normalize_dice_key`], so a preset for `1d20`
/// is also used by `1D20+5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetQueue {
    users: HashMap<UserId, HashMap<String, PresetEntry>>,
    ttl: TimeDelta,
}

impl Default for PresetQueue {
    fn default() -> Self {
        Self::new(TimeDelta::hours(DEFAULT_PRESET_TTL_HOURS))
    }
}

impl From<&Tuning> for PresetQueue {
    fn from(tuning: &Tuning) -> Self {
        Self::new(tuning.preset_ttl())
    }
}

/// Whether something queued at `queued_at` is older than `ttl` at `now`
pub fn is_expired(queued_at: DateTime<Utc>, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
    now.signed_duration_since(queued_at) > ttl
}

impl PresetQueue {
    pub fn new(ttl: TimeDelta) -> Self {
        Self {
            users: HashMap::new(),
            ttl,
        }
    }

    /// Queue `values` for the next rolls of `expr` by `user`
    ///
    /// Replaces whatever was queued for the same expression.
    pub fn push(
        &mut self,
        user: UserId,
        expr: &str,
        values: Vec<i64>,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        if values.is_empty() {
            return Err(Error::Preset("no values to queue".to_string()));
        }
        validate_preset_results(expr, &values)?;
        let key = normalize_dice_key(expr);
        debug!(user, key = %key, count = values.len(), "preset rolls queued");
        self.users.entry(user).or_default().insert(
            key,
            PresetEntry {
                values: values.into(),
                queued_at: now,
            },
        );
        Ok(())
    }

    /// Take the next preset for a roll of `expr` by `user`, if any
    pub fn pop(&mut self, user: UserId, expr: &str, now: DateTime<Utc>) -> Option<i64> {
        self.cleanup(now);

        let key = normalize_dice_key(expr);
        let presets = self.users.get_mut(&user)?;
        let entry = presets.get_mut(&key)?;
        let value = entry.values.pop_front();
        if entry.values.is_empty() {
            presets.remove(&key);
        }
        if presets.is_empty() {
            self.users.remove(&user);
        }
        if let Some(value) = value {
            debug!(user, key = %key, value, "preset roll used");
        }
        value
    }

    /// Values still queued for `user` and `expr`
    pub fn pending(&self, user: UserId, expr: &str) -> Vec<i64> {
        self.users
            .get(&user)
            .and_then(|presets| presets.get(&normalize_dice_key(expr)))
            .map(|entry| entry.values.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Forget every preset of `user`, returns whether there was any
    pub fn clear_user(&mut self, user: UserId) -> bool {
        self.users.remove(&user).is_some()
    }

    /// Drop expired entries, returns how many expressions were removed
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let mut removed = 0;
        self.users.retain(|_, presets| {
            let before = presets.len();
            presets.retain(|_, entry| !is_expired(entry.queued_at, now, ttl));
            removed += before - presets.len();
            !presets.is_empty()
        });
        if removed > 0 {
            debug!(removed, "expired preset rolls cleaned up");
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Check that every value can actually come up on the dice of `expr`
///
/// Values are dice totals before flat modifiers. Expressions that don't parse
/// are accepted as they are.
pub fn validate_preset_results(expr: &str, values: &[i64]) -> Result<(), Error> {
    let Some(kind) = DiceKind::parse(expr) else {
        return Ok(());
    };
    let count = i64::from(kind.count());
    let (min, max, shown) = match kind {
        DiceKind::Fudge { .. } => (-count, count, expr.to_string()),
        DiceKind::Fallout { .. } => (0, count * 2, expr.to_string()),
        DiceKind::Standard { sides, .. } | DiceKind::Advanced { sides, .. } => {
            (count, count * i64::from(sides), extract_base_dice(expr))
        }
    };
    match values.iter().find(|v| !(min..=max).contains(*v)) {
        Some(v) => Err(Error::Preset(format!(
            "{v} is impossible for {shown} (range: {min} to {max})"
        ))),
        None => Ok(()),
    }
}
