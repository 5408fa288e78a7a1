//! # quotawatch
//!
//! Session quota notifications for AI assistants.
//!
//! quotawatch watches "remaining capacity" readings for a rate-limited
//! assistant session and decides which notifications should fire as the quota
//! evolves: depletion and restoration, usage thresholds, window resets and a
//! weekly "smart" warning.
//!
//! ## Architecture
//!
//! - **Alerting**: pure transition detection and the per-cycle evaluator,
//!   notification rendering and delivery sinks, state stores
//! - **Monitor**: periodic fetch/evaluate/commit/dispatch loop over a usage source
//! - **Replay**: offline evaluation of recorded observations
//!
//! ## Quick Start
//!
//! ```bash
//! # Watch a usage snapshot file written by another process
//! quotawatch watch --provider claude --snapshot usage.json
//!
//! # Replay recorded observations
//! quotawatch replay --provider codex observations.json
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod replay;

pub use crate::config::Config;
pub use crate::error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{NotificationDispatcher, QuotaEvaluator, StateStore};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::monitor::{QuotaMonitor, UsageSource};
}
