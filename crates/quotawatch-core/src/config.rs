//! Configuration management for quotawatch

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alerting::RefillHeuristic;
use crate::error::{Error, Result};

/// Environment variable prefix, e.g. `QUOTAWATCH__MONITOR__POLL_INTERVAL=30s`
pub const ENV_PREFIX: &str = "QUOTAWATCH";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which notifications are enabled
    pub notifications: NotificationConfig,

    /// Window reset refill heuristic
    pub window_reset: RefillHeuristic,

    /// Monitor loop configuration
    pub monitor: MonitorConfig,

    /// Notification delivery configuration
    pub delivery: DeliveryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// With no explicit path the per-user config directory is consulted
    /// (`config.toml`, `config.json`, ...) and silently skipped if absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env is the common case.
        let _ = dotenvy::dotenv();

        let mut builder = ::config::Config::builder();

        match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration file");
                builder = builder.add_source(::config::File::from(path));
            }
            None => {
                if let Some(dirs) = project_dirs() {
                    let default = dirs.config_dir().join("config");
                    builder = builder.add_source(
                        ::config::File::with_name(&default.to_string_lossy()).required(false),
                    );
                }
            }
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("notifications.thresholds"),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        for threshold in &self.notifications.thresholds {
            if !(1..=100).contains(threshold) {
                return Err(Error::config(format!(
                    "notification threshold {threshold} must be between 1 and 100"
                )));
            }
        }

        let smart = &self.notifications.smart_warning;
        if !(1..=100).contains(&smart.threshold) {
            return Err(Error::config(format!(
                "smart warning threshold {} must be between 1 and 100",
                smart.threshold
            )));
        }

        let refill = &self.window_reset;
        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(refill.refill_below) || !in_range(refill.refill_at_or_above) {
            return Err(Error::config("window reset percentages must be between 0 and 100"));
        }
        if refill.refill_below >= refill.refill_at_or_above {
            return Err(Error::config(format!(
                "window reset refill_below ({}) must be less than refill_at_or_above ({})",
                refill.refill_below, refill.refill_at_or_above
            )));
        }

        if self.monitor.poll_interval < Duration::from_secs(1) {
            return Err(Error::config("monitor poll interval must be at least 1s"));
        }

        Ok(())
    }

    /// Where the file state store keeps its data
    pub fn state_path(&self) -> Option<PathBuf> {
        self.monitor
            .state_path
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().join("state.json")))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "quotawatch", "quotawatch")
}

/// Notification toggles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Notify when the session quota runs out and comes back
    pub depletion: bool,

    /// Usage-percent thresholds that trigger a one-time warning
    pub thresholds: BTreeSet<u8>,

    /// Notify when a new quota window starts
    pub window_reset: bool,

    /// Weekly usage warning
    pub smart_warning: SmartWarningConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            depletion: true,
            thresholds: BTreeSet::from([50, 75, 90]),
            window_reset: true,
            smart_warning: SmartWarningConfig::default(),
        }
    }
}

/// Smart (weekly) warning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartWarningConfig {
    /// Whether the warning is enabled
    pub enabled: bool,
    /// Weekly used percent at which to warn
    pub threshold: u8,
}

impl Default for SmartWarningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 80,
        }
    }
}

/// Ordering of state commit relative to notification dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryGuarantee {
    /// Persist state, then dispatch. A crash may drop a notification.
    #[default]
    AtMostOnce,
    /// Dispatch, then persist state. A crash may repeat a notification.
    AtLeastOnce,
}

/// Monitor loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Time between fetches
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Commit ordering
    pub delivery: DeliveryGuarantee,

    /// State file override
    pub state_path: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            delivery: DeliveryGuarantee::default(),
            state_path: None,
        }
    }
}

/// Notification sinks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Write notifications to the log
    pub log: bool,

    /// POST notifications to this URL
    pub webhook_url: Option<String>,

    /// Webhook request timeout
    #[serde(with = "humantime_serde")]
    pub webhook_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            log: true,
            webhook_url: None,
            webhook_timeout: Duration::from_secs(10),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
