//! Monitor loop: fetch, evaluate, commit, dispatch
//!
//! One monitor drives one provider's quota stream. Cycles run sequentially on
//! the monitor's task, so two evaluations never race on the same state.

mod source;

pub use source::{SnapshotFileSource, UsageSource};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::alerting::{DeliveryResult, NotificationDispatcher, QuotaEvaluator, StateStore};
use crate::config::{Config, DeliveryGuarantee};
use crate::error::Result;
use crate::models::QuotaTransition;

/// What one monitor cycle did
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// The source had no observation this cycle
    Skipped,
    /// An observation was evaluated
    Evaluated {
        /// Events produced, in dispatch order
        events: Vec<QuotaTransition>,
        /// Per-sink delivery results
        deliveries: Vec<DeliveryResult>,
    },
}

/// Periodic quota monitor for one usage source
pub struct QuotaMonitor<S> {
    source: S,
    evaluator: QuotaEvaluator,
    dispatcher: NotificationDispatcher,
    store: Arc<dyn StateStore>,
    poll_interval: Duration,
    delivery: DeliveryGuarantee,
}

impl<S: UsageSource> QuotaMonitor<S> {
    /// Create a monitor with default timing
    pub fn new(
        source: S,
        evaluator: QuotaEvaluator,
        dispatcher: NotificationDispatcher,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            source,
            evaluator,
            dispatcher,
            store,
            poll_interval: Duration::from_secs(60),
            delivery: DeliveryGuarantee::default(),
        }
    }

    /// Create a monitor using the application config for evaluator and timing
    pub fn from_config(
        config: &Config,
        source: S,
        dispatcher: NotificationDispatcher,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self::new(source, QuotaEvaluator::from_config(config), dispatcher, store)
            .with_poll_interval(config.monitor.poll_interval)
            .with_delivery(config.monitor.delivery)
    }

    /// Set the time between cycles
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set commit ordering
    pub fn with_delivery(mut self, delivery: DeliveryGuarantee) -> Self {
        self.delivery = delivery;
        self
    }

    /// Run until `shutdown` resolves
    pub async fn start(&self, shutdown: impl Future<Output = ()>) {
        let provider = self.source.provider();
        info!(
            provider = %provider,
            interval = ?self.poll_interval,
            delivery = ?self.delivery,
            "Starting quota monitor"
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle(Utc::now()).await {
                        error!(provider = %provider, error = %e, "Quota monitor cycle failed");
                    }
                }
                _ = &mut shutdown => {
                    info!(provider = %provider, "Quota monitor stopped");
                    break;
                }
            }
        }
    }

    /// Run a single fetch/evaluate/commit/dispatch cycle
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let provider = self.source.provider();

        let observation = match self.source.fetch().await {
            Ok(observation) => observation,
            Err(e) => {
                warn!(provider = %provider, error = %e, "No usage observation this cycle");
                return Ok(CycleOutcome::Skipped);
            }
        };

        let state = self.store.load(provider).await?;
        let evaluation = self.evaluator.evaluate(&state, &observation, now);

        debug!(
            provider = %provider,
            events = evaluation.events.len(),
            added = ?evaluation.delta.added,
            removed = ?evaluation.delta.removed,
            "Evaluated observation"
        );

        let changed = evaluation.state != state;
        let deliveries = match self.delivery {
            DeliveryGuarantee::AtMostOnce => {
                if changed {
                    self.store.persist(provider, &evaluation.state).await?;
                }
                self.dispatcher.dispatch_all(&evaluation.events, provider).await
            }
            DeliveryGuarantee::AtLeastOnce => {
                let deliveries = self.dispatcher.dispatch_all(&evaluation.events, provider).await;
                if changed {
                    self.store.persist(provider, &evaluation.state).await?;
                }
                deliveries
            }
        };

        Ok(CycleOutcome::Evaluated {
            events: evaluation.events,
            deliveries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::{MemoryStateStore, Notification, NotificationError, NotificationSink};
    use crate::error::Error;
    use crate::models::{Observation, QuotaState, UsageProvider};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeSet, VecDeque};
    use std::sync::Mutex;

    struct ScriptedSource {
        readings: Mutex<VecDeque<Result<Observation>>>,
    }

    impl ScriptedSource {
        fn new(readings: Vec<Result<Observation>>) -> Self {
            Self {
                readings: Mutex::new(readings.into()),
            }
        }
    }

    #[async_trait]
    impl UsageSource for ScriptedSource {
        fn provider(&self) -> UsageProvider {
            UsageProvider::Claude
        }

        async fn fetch(&self) -> Result<Observation> {
            self.readings
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::fetch("exhausted")))
        }
    }

    /// Records, for each delivery, the notified set the store held at that moment
    #[derive(Clone)]
    struct StoreProbeSink {
        store: MemoryStateStore,
        seen: Arc<Mutex<Vec<(String, BTreeSet<u8>)>>>,
    }

    #[async_trait]
    impl NotificationSink for StoreProbeSink {
        fn name(&self) -> &'static str {
            "probe"
        }

        async fn deliver(&self, notification: &Notification) -> std::result::Result<(), NotificationError> {
            let state = self
                .store
                .load(UsageProvider::Claude)
                .await
                .map_err(|e| NotificationError::HttpError(e.to_string()))?;
            self.seen
                .lock()
                .unwrap()
                .push((notification.id.clone(), state.notified_thresholds));
            Ok(())
        }
    }

    fn monitor_with(
        readings: Vec<Result<Observation>>,
        delivery: DeliveryGuarantee,
    ) -> (QuotaMonitor<ScriptedSource>, MemoryStateStore, StoreProbeSink) {
        let store = MemoryStateStore::new();
        let sink = StoreProbeSink {
            store: store.clone(),
            seen: Arc::new(Mutex::new(Vec::new())),
        };
        let monitor = QuotaMonitor::new(
            ScriptedSource::new(readings),
            QuotaEvaluator::default(),
            NotificationDispatcher::new().with_sink(sink.clone()),
            Arc::new(store.clone()),
        )
        .with_delivery(delivery);
        (monitor, store, sink)
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_cycle_without_touching_state() {
        let (monitor, store, sink) = monitor_with(
            vec![
                Ok(Observation::remaining(30.0)),
                Err(Error::fetch("timeout")),
                Ok(Observation::remaining(20.0)),
            ],
            DeliveryGuarantee::AtMostOnce,
        );
        let now = Utc::now();

        monitor.run_cycle(now).await.unwrap();
        assert!(matches!(monitor.run_cycle(now).await.unwrap(), CycleOutcome::Skipped));
        assert_eq!(
            store.load(UsageProvider::Claude).await.unwrap().last_remaining,
            Some(30.0)
        );

        // The failed fetch is not a depletion; 30 -> 20 crosses 75 only
        let outcome = monitor.run_cycle(now).await.unwrap();
        match outcome {
            CycleOutcome::Evaluated { events, deliveries } => {
                assert_eq!(events, vec![QuotaTransition::CrossedThreshold { percent: 75 }]);
                assert_eq!(deliveries.len(), 1);
                assert!(deliveries[0].success);
            }
            CycleOutcome::Skipped => panic!("expected evaluation"),
        }
        assert_eq!(sink.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_at_most_once_commits_before_dispatch() {
        let (monitor, store, sink) = monitor_with(
            vec![Ok(Observation::remaining(60.0)), Ok(Observation::remaining(40.0))],
            DeliveryGuarantee::AtMostOnce,
        );
        let now = Utc::now();
        monitor.run_cycle(now).await.unwrap();
        monitor.run_cycle(now).await.unwrap();

        let seen = sink.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![(
                "session-claude-threshold-50".to_string(),
                BTreeSet::from([50])
            )]
        );
        assert_eq!(
            store.load(UsageProvider::Claude).await.unwrap().notified_thresholds,
            BTreeSet::from([50])
        );
    }

    #[tokio::test]
    async fn test_at_least_once_dispatches_before_commit() {
        let (monitor, store, sink) = monitor_with(
            vec![Ok(Observation::remaining(60.0)), Ok(Observation::remaining(40.0))],
            DeliveryGuarantee::AtLeastOnce,
        );
        let now = Utc::now();
        monitor.run_cycle(now).await.unwrap();
        monitor.run_cycle(now).await.unwrap();

        let seen = sink.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![("session-claude-threshold-50".to_string(), BTreeSet::new())]
        );
        assert_eq!(
            store.load(UsageProvider::Claude).await.unwrap(),
            QuotaState {
                last_remaining: Some(40.0),
                notified_thresholds: BTreeSet::from([50]),
                ..QuotaState::default()
            }
        );
    }

    #[tokio::test]
    async fn test_start_stops_on_shutdown() {
        let (monitor, store, _sink) = monitor_with(
            vec![Ok(Observation::remaining(80.0))],
            DeliveryGuarantee::AtMostOnce,
        );
        let monitor = monitor.with_poll_interval(Duration::from_millis(10));

        monitor
            .start(tokio::time::sleep(Duration::from_millis(50)))
            .await;

        assert_eq!(
            store.load(UsageProvider::Claude).await.unwrap().last_remaining,
            Some(80.0)
        );
    }
}
