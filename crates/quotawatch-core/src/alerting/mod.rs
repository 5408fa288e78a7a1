//! Quota transition alerting for quotawatch
//!
//! Pure transition detection, the per-cycle evaluator, notification
//! rendering/delivery and state storage.

mod evaluator;
pub mod logic;
mod notifier;
mod repository;

pub use evaluator::{Evaluation, QuotaEvaluator};
pub use logic::{
    cleared_thresholds, crossed_thresholds, detect_window_reset, detect_window_reset_with,
    smart_warning_transition, transition, RefillHeuristic, DEPLETED_EPSILON,
};
pub use notifier::{
    DeliveryResult, LogSink, Notification, NotificationDispatcher, NotificationError,
    NotificationSink, WebhookSink,
};
pub use repository::{FileStateStore, MemoryStateStore, StateStore};
