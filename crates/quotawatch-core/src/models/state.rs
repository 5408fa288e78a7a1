//! Externally-owned quota bookkeeping

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quota state carried between evaluation cycles for one provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaState {
    /// Remaining percent from the last observation
    pub last_remaining: Option<f64>,

    /// Weekly used percent from the last observation that reported one
    pub last_used_percent: Option<f64>,

    /// Window end from the last observation
    pub last_resets_at: Option<DateTime<Utc>>,

    /// Thresholds already notified and not yet cleared
    pub notified_thresholds: BTreeSet<u8>,
}

/// Changes to the notified threshold set produced by one evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdDelta {
    /// Newly crossed thresholds, ascending
    pub added: Vec<u8>,
    /// Thresholds whose notification was cleared
    pub removed: BTreeSet<u8>,
}

impl ThresholdDelta {
    /// Whether the delta changes nothing
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Apply the delta to a notified set, returning the new set
    pub fn apply(&self, notified: &BTreeSet<u8>) -> BTreeSet<u8> {
        notified
            .difference(&self.removed)
            .copied()
            .chain(self.added.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_apply() {
        let notified: BTreeSet<u8> = BTreeSet::from([50, 75]);
        let delta = ThresholdDelta {
            added: vec![90],
            removed: BTreeSet::from([75]),
        };
        let next = delta.apply(&notified);
        assert_eq!(next, BTreeSet::from([50, 90]));
        assert!(!delta.is_empty());
        assert!(ThresholdDelta::default().is_empty());
    }

    #[test]
    fn test_state_deserializes_from_partial_json() {
        let state: QuotaState = serde_json::from_str(r#"{"notified_thresholds": [90, 50]}"#).unwrap();
        assert_eq!(state.last_remaining, None);
        assert_eq!(state.notified_thresholds.iter().copied().collect::<Vec<_>>(), vec![50, 90]);
    }
}
