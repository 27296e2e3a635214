//! Webhook notifier - POSTs reminders as JSON to an HTTP endpoint.
//!
//! A 4xx answer means the endpoint refused this reminder and is reported as
//! `Rejected`. Transport errors and any other non-success status are
//! `Unavailable` and will be retried on a later tick.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::{ensure_recipients, Notifier};
use crate::error::NotificationError;
use crate::types::{reminder_message, Appointment, ReminderOffset};

/// Body sent to the webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload<'a> {
    pub appointment_id: &'a str,
    pub title: &'a str,
    pub start: DateTime<Utc>,
    pub offset_seconds: u64,
    pub recipients: &'a [String],
    pub message: String,
}

impl<'a> WebhookPayload<'a> {
    /// Build the payload for one reminder.
    pub fn new(appointment: &'a Appointment, offset: ReminderOffset) -> Self {
        Self {
            appointment_id: &appointment.id,
            title: &appointment.title,
            start: appointment.start,
            offset_seconds: offset.as_secs(),
            recipients: &appointment.recipients,
            message: reminder_message(appointment, offset),
        }
    }
}

/// Notifier delivering reminders to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Create a notifier for `url` with a per-request timeout.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Unavailable(e.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    /// Endpoint reminders are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send_reminder(
        &self,
        appointment: &Appointment,
        offset: ReminderOffset,
    ) -> Result<(), NotificationError> {
        ensure_recipients(appointment)?;

        let payload = WebhookPayload::new(appointment, offset);
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_client_error() {
            Err(NotificationError::Rejected(format!(
                "webhook answered {}",
                status
            )))
        } else {
            Err(NotificationError::Unavailable(format!(
                "webhook answered {}",
                status
            )))
        }
    }
}
