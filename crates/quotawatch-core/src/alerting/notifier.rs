//! Notification rendering and delivery for quota transitions

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DeliveryConfig;
use crate::models::{QuotaTransition, UsageProvider};

/// A rendered notification ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Stable identifier, `session-<provider>-<kind>`
    pub id: String,
    /// Title line
    pub title: String,
    /// Body text
    pub body: String,
    /// Optional badge count
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
}

impl Notification {
    /// Render a transition for a provider. `QuotaTransition::None` renders nothing.
    pub fn render(
        transition: &QuotaTransition,
        provider: UsageProvider,
        badge: Option<u32>,
    ) -> Option<Self> {
        let name = provider.display_name();

        let (title, body) = match *transition {
            QuotaTransition::None => return None,
            QuotaTransition::Depleted => (
                format!("{name} session depleted"),
                "0% left. Will notify when it's available again.".to_string(),
            ),
            QuotaTransition::Restored => (
                format!("{name} session restored"),
                "Session quota is available again.".to_string(),
            ),
            QuotaTransition::CrossedThreshold { percent } => (
                format!("{name} at {percent}% usage"),
                format!(
                    "{}% of session quota remaining.",
                    100u8.saturating_sub(percent)
                ),
            ),
            QuotaTransition::WindowReset => (
                format!("{name} limit reset"),
                "Your quota window has reset. Full capacity available.".to_string(),
            ),
            QuotaTransition::SmartWarning {
                used_percent,
                days_remaining,
            } => {
                let days = if days_remaining == 1 {
                    "1 day".to_string()
                } else {
                    format!("{days_remaining} days")
                };
                (
                    format!("{name} usage running high"),
                    format!(
                        "You've used {used_percent}% of your weekly limit with {days} remaining."
                    ),
                )
            }
        };

        Some(Self {
            id: format!("session-{}-{}", provider.as_str(), transition.kind()),
            title,
            body,
            badge,
        })
    }
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Request failed or returned a non-success status
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Sink could not be built
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// A destination for rendered notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short name used in logs and delivery results
    fn name(&self) -> &'static str;

    /// Deliver one notification
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        info!(
            id = %notification.id,
            title = %notification.title,
            body = %notification.body,
            badge = ?notification.badge,
            "Notification"
        );
        Ok(())
    }
}

/// POSTs notifications as JSON to a webhook
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    /// Create a webhook sink
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        let payload = WebhookPayload {
            dedup_key: &notification.id,
            title: &notification.title,
            body: &notification.body,
            badge: notification.badge,
            sent_at: Utc::now(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::HttpError(format!(
                "Webhook returned {}: {}",
                status, body
            )));
        }

        debug!(id = %notification.id, url = %self.url, "Webhook notification sent");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    dedup_key: &'a str,
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<u32>,
    sent_at: DateTime<Utc>,
}

/// Result of delivering a notification to one sink
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    /// Id of the delivered notification
    pub notification_id: String,
    /// Sink name
    pub sink: &'static str,
    /// Whether delivery succeeded
    pub success: bool,
    /// Error message if failed
    pub error: Option<String>,
    /// When delivery was attempted
    pub sent_at: DateTime<Utc>,
}

/// Renders transitions and fans them out to every sink
#[derive(Default)]
pub struct NotificationDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl NotificationDispatcher {
    /// Create a dispatcher with no sinks
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dispatcher from delivery configuration
    pub fn from_config(config: &DeliveryConfig) -> Result<Self, NotificationError> {
        let mut dispatcher = Self::new();
        if config.log {
            dispatcher = dispatcher.with_sink(LogSink);
        }
        if let Some(url) = &config.webhook_url {
            dispatcher = dispatcher.with_sink(WebhookSink::new(url.clone(), config.webhook_timeout)?);
        }
        Ok(dispatcher)
    }

    /// Add a sink
    pub fn with_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of configured sinks
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Render and deliver one transition
    ///
    /// A failing sink is logged and does not stop the others.
    pub async fn dispatch(
        &self,
        transition: &QuotaTransition,
        provider: UsageProvider,
        badge: Option<u32>,
    ) -> Vec<DeliveryResult> {
        let Some(notification) = Notification::render(transition, provider, badge) else {
            return Vec::new();
        };

        info!(id = %notification.id, "Enqueuing notification");

        let mut results = Vec::with_capacity(self.sinks.len());
        for sink in &self.sinks {
            let sent_at = Utc::now();
            let result = sink.deliver(&notification).await;
            if let Err(e) = &result {
                warn!(id = %notification.id, sink = sink.name(), error = %e, "Notification delivery failed");
            }
            results.push(DeliveryResult {
                notification_id: notification.id.clone(),
                sink: sink.name(),
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
                sent_at,
            });
        }

        results
    }

    /// Deliver transitions in order
    pub async fn dispatch_all(
        &self,
        transitions: &[QuotaTransition],
        provider: UsageProvider,
    ) -> Vec<DeliveryResult> {
        let mut results = Vec::new();
        for transition in transitions {
            results.extend(self.dispatch(transition, provider, None).await);
        }
        results
    }
}
