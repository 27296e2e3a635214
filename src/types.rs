//! Core types for calendar-reminder.
//!
//! Appointments are read-only views handed to us by a calendar source;
//! reminder offsets are the configured lead times at which a reminder fires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A calendar appointment as reported by the calendar source.
///
/// The engine never mutates appointments. `id` is treated as an opaque key
/// that stays stable across scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    /// Stable identifier assigned by the calendar
    pub id: String,

    /// Display title
    pub title: String,

    /// Absolute start time
    pub start: DateTime<Utc>,

    /// Addresses that should receive reminders
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Appointment {
    /// Create a new appointment.
    pub fn new(id: &str, title: &str, start: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            start,
            recipients: Vec::new(),
        }
    }

    /// Add recipients.
    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    /// Check whether the appointment has started at `now`.
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start
    }

    /// The instant at which the reminder for `offset` becomes due.
    pub fn due_at(&self, offset: ReminderOffset) -> DateTime<Utc> {
        self.start - offset.as_chrono()
    }
}

/// Longest lead time accepted for a reminder offset (one year).
pub const MAX_OFFSET_SECS: u64 = 366 * 24 * 3600;

/// Lead time before an appointment at which a reminder fires.
///
/// Stored with second granularity. Offsets order by duration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderOffset(u64);

impl ReminderOffset {
    /// Create an offset from seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Create an offset from minutes.
    pub const fn from_minutes(minutes: u64) -> Self {
        Self(minutes * 60)
    }

    /// Create an offset from hours.
    pub const fn from_hours(hours: u64) -> Self {
        Self(hours * 3600)
    }

    /// Offset length in seconds.
    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Offset as a signed chrono duration for timestamp arithmetic.
    pub fn as_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.0.min(MAX_OFFSET_SECS) as i64)
    }
}

impl fmt::Display for ReminderOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            s if s != 0 && s % 3600 == 0 => write!(f, "{}h", s / 3600),
            s if s != 0 && s % 60 == 0 => write!(f, "{}m", s / 60),
            s => write!(f, "{}s", s),
        }
    }
}

impl fmt::Debug for ReminderOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReminderOffset({})", self)
    }
}

/// Render the human-readable reminder text for an appointment.
pub fn reminder_message(appointment: &Appointment, offset: ReminderOffset) -> String {
    format!(
        "Reminder: \"{}\" starts in {} (at {})",
        appointment.title,
        offset,
        appointment.start.format("%Y-%m-%d %H:%M UTC"),
    )
}
