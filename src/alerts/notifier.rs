//! Alert delivery

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::event::AlertEvent;

/// Destination for alert events
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Deliver one alert
    async fn send(&self, alert: &AlertEvent) -> Result<(), SinkError>;
}

/// Posts alerts to a Slack incoming webhook
pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    /// Create a notifier whose requests give up after `timeout`
    pub fn new(webhook_url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            webhook_url: webhook_url.into(),
            client,
        })
    }

    fn payload(alert: &AlertEvent) -> SlackPayload<'_> {
        SlackPayload {
            attachments: vec![SlackAttachment {
                fallback: &alert.title,
                color: alert.severity.color(),
                title: &alert.title,
                text: &alert.body,
            }],
        }
    }
}

#[async_trait]
impl AlertSink for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn send(&self, alert: &AlertEvent) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&Self::payload(alert))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }

        tracing::debug!(kind = %alert.kind, "Slack notification sent");
        Ok(())
    }
}

/// Sink used when no webhook is configured; alerts are only logged
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl AlertSink for NullSink {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn send(&self, alert: &AlertEvent) -> Result<(), SinkError> {
        tracing::debug!(kind = %alert.kind, "No webhook configured, alert not delivered");
        Ok(())
    }
}

#[derive(Serialize)]
struct SlackPayload<'a> {
    attachments: Vec<SlackAttachment<'a>>,
}

#[derive(Serialize)]
struct SlackAttachment<'a> {
    fallback: &'a str,
    color: &'a str,
    title: &'a str,
    text: &'a str,
}

/// Alert delivery errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook returned status {0}")]
    Status(u16),
}
