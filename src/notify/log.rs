//! Log notifier - writes reminders to the tracing output.

use async_trait::async_trait;

use super::{ensure_recipients, Notifier};
use crate::error::NotificationError;
use crate::types::{reminder_message, Appointment, ReminderOffset};

/// Notifier that logs each reminder at info level.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    /// Create a new log notifier.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send_reminder(
        &self,
        appointment: &Appointment,
        offset: ReminderOffset,
    ) -> Result<(), NotificationError> {
        ensure_recipients(appointment)?;

        tracing::info!(
            appointment_id = %appointment.id,
            offset = %offset,
            recipients = %appointment.recipients.join(", "),
            "{}",
            reminder_message(appointment, offset)
        );
        Ok(())
    }
}
