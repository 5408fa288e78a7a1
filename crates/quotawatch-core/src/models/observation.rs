//! Quota observation data model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Assistant provider whose session quota is being observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageProvider {
    /// OpenAI Codex
    Codex,
    /// Anthropic Claude
    Claude,
    /// Google Gemini
    Gemini,
    /// Antigravity
    Antigravity,
}

impl UsageProvider {
    /// All known providers
    pub const ALL: [UsageProvider; 4] = [
        UsageProvider::Codex,
        UsageProvider::Claude,
        UsageProvider::Gemini,
        UsageProvider::Antigravity,
    ];

    /// Stable identifier used in notification ids and state keys
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageProvider::Codex => "codex",
            UsageProvider::Claude => "claude",
            UsageProvider::Gemini => "gemini",
            UsageProvider::Antigravity => "antigravity",
        }
    }

    /// Human-readable name used in notification text
    pub fn display_name(&self) -> &'static str {
        match self {
            UsageProvider::Codex => "Codex",
            UsageProvider::Claude => "Claude",
            UsageProvider::Gemini => "Gemini",
            UsageProvider::Antigravity => "Antigravity",
        }
    }
}

impl fmt::Display for UsageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UsageProvider {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UsageProvider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::error::Error::validation(format!("unknown provider '{s}'")))
    }
}

/// Weekly usage reading, reported as used percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeeklyUsage {
    /// Percent of the weekly limit already used
    pub used_percent: f64,

    /// When the weekly window resets
    #[serde(default)]
    pub resets_at: Option<DateTime<Utc>>,
}

/// A reading of session quota state at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Percent of the session quota left (0-100). `None` means unknown.
    #[serde(default)]
    pub remaining_percent: Option<f64>,

    /// End of the current session window
    #[serde(default)]
    pub resets_at: Option<DateTime<Utc>>,

    /// Weekly usage, when the provider reports it
    #[serde(default)]
    pub weekly: Option<WeeklyUsage>,
}

impl Observation {
    /// Observation with only a remaining percent
    pub fn remaining(remaining_percent: f64) -> Self {
        Self {
            remaining_percent: Some(remaining_percent),
            ..Self::default()
        }
    }

    /// Set the session window end
    pub fn with_resets_at(mut self, resets_at: DateTime<Utc>) -> Self {
        self.resets_at = Some(resets_at);
        self
    }

    /// Attach a weekly usage reading
    pub fn with_weekly(mut self, used_percent: f64, resets_at: Option<DateTime<Utc>>) -> Self {
        self.weekly = Some(WeeklyUsage {
            used_percent,
            resets_at,
        });
        self
    }

    /// Used percent of the session quota, derived from the remaining percent
    pub fn used_percent(&self) -> Option<f64> {
        self.remaining_percent.map(|r| 100.0 - r)
    }
}
