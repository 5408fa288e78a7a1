//! Quota evaluation cycle
//!
//! Combines the individual detectors in [`super::logic`] into one pure step
//! `(state, observation, config) -> (events, state')`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::config::{Config, NotificationConfig};
use crate::models::{Observation, QuotaState, QuotaTransition, ThresholdDelta};

use super::logic::{self, RefillHeuristic};

/// Result of evaluating one observation
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Events to dispatch, in order
    pub events: Vec<QuotaTransition>,
    /// Changes to the notified threshold set
    pub delta: ThresholdDelta,
    /// State to commit for the next cycle
    pub state: QuotaState,
}

/// Evaluates observations against the last known state
#[derive(Debug, Clone, Default)]
pub struct QuotaEvaluator {
    notifications: NotificationConfig,
    heuristic: RefillHeuristic,
}

impl QuotaEvaluator {
    /// Create an evaluator from explicit settings
    pub fn new(notifications: NotificationConfig, heuristic: RefillHeuristic) -> Self {
        Self {
            notifications,
            heuristic,
        }
    }

    /// Create an evaluator from the application config
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.notifications.clone(), config.window_reset)
    }

    /// Evaluate `observation` against `state`
    ///
    /// Events come out as window reset, depletion/restoration, threshold
    /// crossings (ascending), then the smart warning. An observation with no
    /// remaining percent or reset time leaves the last known value in place.
    pub fn evaluate(
        &self,
        state: &QuotaState,
        observation: &Observation,
        now: DateTime<Utc>,
    ) -> Evaluation {
        let previous = state.last_remaining;
        let current = observation.remaining_percent;
        let mut events = Vec::new();

        let window_reset = self.notifications.window_reset
            && logic::detect_window_reset_with(
                state.last_resets_at,
                observation.resets_at,
                previous,
                current,
                now,
                &self.heuristic,
            );
        if window_reset {
            events.push(QuotaTransition::WindowReset);
        }

        if self.notifications.depletion {
            match logic::transition(previous, current) {
                QuotaTransition::None => {}
                other => events.push(other),
            }
        }

        let removed = logic::cleared_thresholds(previous, current, &state.notified_thresholds);
        let still_notified: BTreeSet<u8> = state
            .notified_thresholds
            .difference(&removed)
            .copied()
            .collect();
        let added = logic::crossed_thresholds(
            previous,
            current,
            &self.notifications.thresholds,
            &still_notified,
        );
        events.extend(
            added
                .iter()
                .map(|&percent| QuotaTransition::CrossedThreshold { percent }),
        );
        let delta = ThresholdDelta { added, removed };

        let smart = &self.notifications.smart_warning;
        if let Some(weekly) = observation.weekly {
            if smart.enabled {
                if let Some(warning) = logic::smart_warning_transition(
                    state.last_used_percent,
                    weekly.used_percent,
                    smart.threshold,
                    weekly.resets_at,
                    now,
                ) {
                    events.push(warning);
                }
            }
        }

        let next = QuotaState {
            last_remaining: current.or(previous),
            last_used_percent: observation
                .weekly
                .map(|w| w.used_percent)
                .or(state.last_used_percent),
            last_resets_at: observation.resets_at.or(state.last_resets_at),
            notified_thresholds: delta.apply(&state.notified_thresholds),
        };

        Evaluation {
            events,
            delta,
            state: next,
        }
    }
}
