//! Offline replay of recorded observations through the evaluator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alerting::{Notification, QuotaEvaluator};
use crate::models::{Observation, QuotaState, QuotaTransition, UsageProvider};

/// One recorded observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayStep {
    /// When the observation was taken
    pub at: DateTime<Utc>,
    /// The observation
    pub observation: Observation,
}

/// What the evaluator decided for one step
#[derive(Debug, Clone, Serialize)]
pub struct ReplayRecord {
    /// Step time
    pub at: DateTime<Utc>,
    /// Events, in dispatch order
    pub events: Vec<QuotaTransition>,
    /// Rendered notifications for those events
    pub notifications: Vec<Notification>,
}

/// Feed `steps` through `evaluator` in order, threading state between them
///
/// Returns the per-step records and the final state.
pub fn replay(
    evaluator: &QuotaEvaluator,
    provider: UsageProvider,
    initial: QuotaState,
    steps: &[ReplayStep],
) -> (Vec<ReplayRecord>, QuotaState) {
    let mut state = initial;
    let mut records = Vec::with_capacity(steps.len());

    for step in steps {
        let evaluation = evaluator.evaluate(&state, &step.observation, step.at);
        let notifications = evaluation
            .events
            .iter()
            .filter_map(|event| Notification::render(event, provider, None))
            .collect();

        records.push(ReplayRecord {
            at: step.at,
            events: evaluation.events,
            notifications,
        });
        state = evaluation.state;
    }

    (records, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_replay_session_lifecycle() {
        let start = Utc::now();
        let window_end = start + Duration::hours(5);
        let next_window_end = window_end + Duration::hours(5);

        let steps = vec![
            ReplayStep {
                at: start,
                observation: Observation::remaining(100.0).with_resets_at(window_end),
            },
            ReplayStep {
                at: start + Duration::hours(1),
                observation: Observation::remaining(45.0).with_resets_at(window_end),
            },
            ReplayStep {
                at: start + Duration::hours(2),
                observation: Observation::remaining(0.0).with_resets_at(window_end),
            },
            ReplayStep {
                at: window_end + Duration::minutes(1),
                observation: Observation::remaining(100.0).with_resets_at(next_window_end),
            },
        ];

        let (records, state) = replay(
            &QuotaEvaluator::default(),
            UsageProvider::Codex,
            QuotaState::default(),
            &steps,
        );

        assert!(records[0].events.is_empty());
        assert_eq!(
            records[1].events,
            vec![QuotaTransition::CrossedThreshold { percent: 50 }]
        );
        assert_eq!(
            records[2].events,
            vec![
                QuotaTransition::Depleted,
                QuotaTransition::CrossedThreshold { percent: 75 },
                QuotaTransition::CrossedThreshold { percent: 90 },
            ]
        );
        assert_eq!(
            records[3].events,
            vec![QuotaTransition::WindowReset, QuotaTransition::Restored]
        );
        assert_eq!(records[3].notifications[0].title, "Codex limit reset");

        assert!(state.notified_thresholds.is_empty());
        assert_eq!(state.last_resets_at, Some(next_window_end));
    }

    #[test]
    fn test_replay_steps_parse_from_json() {
        let json = r#"[
            {"at": "2025-01-06T09:00:00Z", "observation": {"remaining_percent": 95}},
            {"at": "2025-01-06T10:00:00Z", "observation": {"remaining_percent": 5}}
        ]"#;
        let steps: Vec<ReplayStep> = serde_json::from_str(json).unwrap();
        let (records, _) = replay(
            &QuotaEvaluator::default(),
            UsageProvider::Claude,
            QuotaState::default(),
            &steps,
        );
        let ids: Vec<&str> = records[1]
            .notifications
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec![
                "session-claude-threshold-50",
                "session-claude-threshold-75",
                "session-claude-threshold-90",
            ]
        );
    }
}
