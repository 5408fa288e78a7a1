//! Pure quota transition detection
//!
//! Every function here is total: missing or inconsistent inputs produce a
//! neutral answer (`QuotaTransition::None`, an empty collection, `false`)
//! instead of an error. A missed notification is preferable to a wrong one.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::QuotaTransition;

/// Remaining percent at or below which the session counts as depleted
pub const DEPLETED_EPSILON: f64 = 0.0001;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Whether a remaining percent counts as depleted
pub fn is_depleted(remaining: Option<f64>) -> bool {
    remaining.is_some_and(|r| r <= DEPLETED_EPSILON)
}

/// Detect depletion or restoration between two remaining-percent readings
pub fn transition(previous_remaining: Option<f64>, current_remaining: Option<f64>) -> QuotaTransition {
    let (Some(previous), Some(current)) = (previous_remaining, current_remaining) else {
        return QuotaTransition::None;
    };

    let was_depleted = previous <= DEPLETED_EPSILON;
    let is_depleted = current <= DEPLETED_EPSILON;

    match (was_depleted, is_depleted) {
        (false, true) => QuotaTransition::Depleted,
        (true, false) => QuotaTransition::Restored,
        _ => QuotaTransition::None,
    }
}

/// Thresholds newly crossed as usage rose, in ascending order
///
/// Thresholds are usage percents, so remaining 25% crosses a 75 threshold.
/// Entries already in `already_notified` are never returned.
pub fn crossed_thresholds(
    previous_remaining: Option<f64>,
    current_remaining: Option<f64>,
    enabled: &BTreeSet<u8>,
    already_notified: &BTreeSet<u8>,
) -> Vec<u8> {
    let (Some(previous), Some(current)) = (previous_remaining, current_remaining) else {
        return Vec::new();
    };
    if current >= previous {
        return Vec::new();
    }

    let previous_used = 100.0 - previous;
    let current_used = 100.0 - current;

    enabled
        .iter()
        .copied()
        .filter(|t| !already_notified.contains(t))
        .filter(|&t| {
            let t = f64::from(t);
            previous_used < t && t <= current_used
        })
        .collect()
}

/// Notified thresholds that usage has dropped back below
///
/// Only the current reading matters; `_previous_remaining` is accepted so
/// call sites read the same as [`crossed_thresholds`].
pub fn cleared_thresholds(
    _previous_remaining: Option<f64>,
    current_remaining: Option<f64>,
    already_notified: &BTreeSet<u8>,
) -> BTreeSet<u8> {
    let Some(current) = current_remaining else {
        return BTreeSet::new();
    };
    let current_used = 100.0 - current;

    already_notified
        .iter()
        .copied()
        .filter(|&t| current_used < f64::from(t))
        .collect()
}

/// Remaining-percent jump treated as an implicit window refill when no
/// expired reset boundary was observed.
///
/// The defaults (below 50 jumping to at least 90) have no derivation behind
/// them and are configurable for that reason.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefillHeuristic {
    /// Previous remaining percent must be strictly below this
    pub refill_below: f64,
    /// Current remaining percent must be at or above this
    pub refill_at_or_above: f64,
}

impl Default for RefillHeuristic {
    fn default() -> Self {
        Self {
            refill_below: 50.0,
            refill_at_or_above: 90.0,
        }
    }
}

impl RefillHeuristic {
    /// Whether a remaining-percent change looks like a refill
    pub fn is_refill(&self, previous_remaining: Option<f64>, current_remaining: Option<f64>) -> bool {
        match (previous_remaining, current_remaining) {
            (Some(previous), Some(current)) => {
                previous < self.refill_below && current >= self.refill_at_or_above
            }
            _ => false,
        }
    }
}

/// Detect the start of a new quota window using the default refill heuristic
pub fn detect_window_reset(
    previous_resets_at: Option<DateTime<Utc>>,
    current_resets_at: Option<DateTime<Utc>>,
    previous_remaining: Option<f64>,
    current_remaining: Option<f64>,
    now: DateTime<Utc>,
) -> bool {
    detect_window_reset_with(
        previous_resets_at,
        current_resets_at,
        previous_remaining,
        current_remaining,
        now,
        &RefillHeuristic::default(),
    )
}

/// Detect the start of a new quota window
///
/// Requires a current window end in the future. A previous window end at or
/// before `now` means that window expired; failing that, a large jump in
/// remaining percent is taken as a refill.
pub fn detect_window_reset_with(
    previous_resets_at: Option<DateTime<Utc>>,
    current_resets_at: Option<DateTime<Utc>>,
    previous_remaining: Option<f64>,
    current_remaining: Option<f64>,
    now: DateTime<Utc>,
    heuristic: &RefillHeuristic,
) -> bool {
    let Some(current_resets_at) = current_resets_at else {
        return false;
    };
    if current_resets_at <= now {
        return false;
    }

    if previous_resets_at.is_some_and(|previous| previous <= now) {
        return true;
    }

    heuristic.is_refill(previous_remaining, current_remaining)
}

/// Whole days until `resets_at`, rounded up and never negative
pub fn days_until(resets_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
    let Some(resets_at) = resets_at else {
        return 0;
    };
    let seconds = (resets_at - now).num_milliseconds() as f64 / 1000.0;
    let days = (seconds / SECONDS_PER_DAY).ceil();
    if days <= 0.0 {
        0
    } else {
        days.min(f64::from(u32::MAX)) as u32
    }
}

/// Edge-triggered weekly usage warning
///
/// Fires only on the step where usage goes from below `threshold` to at or
/// above it. An absent previous reading counts as 0.
pub fn smart_warning_transition(
    previous_used_percent: Option<f64>,
    current_used_percent: f64,
    threshold: u8,
    resets_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<QuotaTransition> {
    let threshold = f64::from(threshold);

    let was_below = previous_used_percent.unwrap_or(0.0) < threshold;
    let is_at_or_above = current_used_percent >= threshold;
    if !(was_below && is_at_or_above) {
        return None;
    }

    Some(QuotaTransition::SmartWarning {
        used_percent: current_used_percent.round() as i32,
        days_remaining: days_until(resets_at, now),
    })
}
