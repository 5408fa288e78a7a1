//! Quota transition events

use serde::{Deserialize, Serialize};

/// A notification-worthy change in quota state between two observations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuotaTransition {
    /// Nothing worth reporting
    #[default]
    None,
    /// Session quota ran out
    Depleted,
    /// Session quota became available again after depletion
    Restored,
    /// Usage rose through a configured threshold
    CrossedThreshold {
        /// Usage percent of the threshold
        percent: u8,
    },
    /// A new quota window started
    WindowReset,
    /// Weekly usage crossed the smart warning threshold
    SmartWarning {
        /// Current weekly used percent, rounded
        used_percent: i32,
        /// Whole days until the weekly window resets, rounded up
        days_remaining: u32,
    },
}

impl QuotaTransition {
    /// Stable kind string used in notification identifiers
    pub fn kind(&self) -> String {
        match self {
            QuotaTransition::None => "none".to_string(),
            QuotaTransition::Depleted => "depleted".to_string(),
            QuotaTransition::Restored => "restored".to_string(),
            QuotaTransition::CrossedThreshold { percent } => format!("threshold-{percent}"),
            QuotaTransition::WindowReset => "window-reset".to_string(),
            QuotaTransition::SmartWarning { .. } => "smartWarning".to_string(),
        }
    }
}
