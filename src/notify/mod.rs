//! Reminder delivery.
//!
//! A notifier sends one reminder for one appointment and reports whether the
//! delivery succeeded. Notifiers are stateless from the engine's point of
//! view: retry bookkeeping lives in the reminder store, not here.

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::types::{Appointment, ReminderOffset};

pub mod log;
pub mod recording;
pub mod webhook;

pub use self::log::LogNotifier;
pub use recording::RecordingNotifier;
pub use webhook::WebhookNotifier;

/// Delivery channel for reminders.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Identifier used in logs (e.g., "log", "webhook").
    fn name(&self) -> &str;

    /// Send the reminder for `offset` to the appointment's recipients.
    async fn send_reminder(
        &self,
        appointment: &Appointment,
        offset: ReminderOffset,
    ) -> Result<(), NotificationError>;
}

/// Reject appointments nobody can be reminded about.
pub(crate) fn ensure_recipients(appointment: &Appointment) -> Result<(), NotificationError> {
    if appointment.recipients.iter().all(|r| r.trim().is_empty()) {
        return Err(NotificationError::Rejected(format!(
            "appointment {} has no recipients",
            appointment.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_ensure_recipients() {
        let appt = Appointment::new("a", "Sync", Utc::now());
        assert!(matches!(
            ensure_recipients(&appt),
            Err(NotificationError::Rejected(_))
        ));

        let appt = appt.with_recipients(vec!["  ".to_string()]);
        assert!(ensure_recipients(&appt).is_err());

        let appt = appt.with_recipients(vec!["ops@example.com".to_string()]);
        assert!(ensure_recipients(&appt).is_ok());
    }
}
