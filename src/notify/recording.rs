//! Recording notifier for tests and dry runs.
//!
//! Every call is recorded. Failures can be scripted per appointment so the
//! engine's retry and abandonment paths can be driven deterministically.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::Notifier;
use crate::error::NotificationError;
use crate::types::{Appointment, ReminderOffset};

/// A scripted failure for one appointment.
#[derive(Debug, Clone)]
struct ScriptedFailure {
    error: NotificationError,
    /// `None` fails forever.
    remaining: Option<u32>,
}

/// One recorded `send_reminder` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReminder {
    pub appointment_id: String,
    pub offset: ReminderOffset,
    pub delivered: bool,
}

/// Notifier that records calls instead of delivering anything.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    calls: Arc<Mutex<Vec<SentReminder>>>,
    failures: Arc<Mutex<HashMap<String, ScriptedFailure>>>,
}

impl RecordingNotifier {
    /// Create a notifier that accepts every reminder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every reminder for `appointment_id` with `error`.
    pub async fn fail_always(&self, appointment_id: &str, error: NotificationError) {
        self.failures.lock().await.insert(
            appointment_id.to_string(),
            ScriptedFailure {
                error,
                remaining: None,
            },
        );
    }

    /// Fail the next `times` reminders for `appointment_id` with `error`.
    pub async fn fail_times(&self, appointment_id: &str, error: NotificationError, times: u32) {
        self.failures.lock().await.insert(
            appointment_id.to_string(),
            ScriptedFailure {
                error,
                remaining: Some(times),
            },
        );
    }

    /// Every call made so far, in call order.
    pub async fn calls(&self) -> Vec<SentReminder> {
        self.calls.lock().await.clone()
    }

    /// Calls made for one (appointment, offset) pair.
    pub async fn calls_for(&self, appointment_id: &str, offset: ReminderOffset) -> usize {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.appointment_id == appointment_id && c.offset == offset)
            .count()
    }

    /// Successfully delivered reminders, in call order.
    pub async fn delivered(&self) -> Vec<(String, ReminderOffset)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.delivered)
            .map(|c| (c.appointment_id.clone(), c.offset))
            .collect()
    }

    async fn scripted_failure(&self, appointment_id: &str) -> Option<NotificationError> {
        let mut failures = self.failures.lock().await;
        let failure = failures.get_mut(appointment_id)?;
        match failure.remaining {
            None => Some(failure.error.clone()),
            Some(0) => None,
            Some(ref mut n) => {
                *n -= 1;
                Some(failure.error.clone())
            }
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_reminder(
        &self,
        appointment: &Appointment,
        offset: ReminderOffset,
    ) -> Result<(), NotificationError> {
        let failure = self.scripted_failure(&appointment.id).await;

        self.calls.lock().await.push(SentReminder {
            appointment_id: appointment.id.clone(),
            offset,
            delivered: failure.is_none(),
        });

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_records_calls_and_scripted_failures() {
        let notifier = RecordingNotifier::new();
        notifier
            .fail_times("a", NotificationError::Unavailable("smtp down".into()), 1)
            .await;

        let appt = Appointment::new("a", "Sync", Utc::now());
        let offset = ReminderOffset::from_hours(1);

        assert!(notifier.send_reminder(&appt, offset).await.is_err());
        assert!(notifier.send_reminder(&appt, offset).await.is_ok());

        assert_eq!(notifier.calls_for("a", offset).await, 2);
        assert_eq!(notifier.delivered().await, vec![("a".to_string(), offset)]);
    }
}
