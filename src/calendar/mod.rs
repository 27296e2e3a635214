//! Calendar sources.
//!
//! A calendar source answers one question: which appointments start inside
//! a time window. Sources hold no reminder state; the engine calls them once
//! per tick.
//!
//! ## Adapters
//!
//! | Source             | Backing store                  |
//! |--------------------|--------------------------------|
//! | `InMemoryCalendar` | process memory, scriptable     |
//! | `JsonFileCalendar` | JSON file re-read on each scan |

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CalendarError;
use crate::types::Appointment;

pub mod file;
pub mod memory;

pub use file::JsonFileCalendar;
pub use memory::InMemoryCalendar;

/// Read access to a calendar.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Identifier used in logs (e.g., "memory", "json-file").
    fn name(&self) -> &str;

    /// List appointments whose start lies in `[window_start, window_end)`.
    async fn list_appointments(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, CalendarError>;
}

/// Keep appointments starting inside `[window_start, window_end)`, ordered by start.
pub(crate) fn within_window(
    appointments: impl IntoIterator<Item = Appointment>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<Appointment> {
    let mut selected: Vec<Appointment> = appointments
        .into_iter()
        .filter(|a| a.start >= window_start && a.start < window_end)
        .collect();
    selected.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_within_window_is_half_open() {
        let t0 = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let t1 = t0 + chrono::Duration::hours(2);
        let appointments = vec![
            Appointment::new("late", "Late", t1),
            Appointment::new("b", "Second", t0 + chrono::Duration::hours(1)),
            Appointment::new("a", "First", t0),
            Appointment::new("early", "Early", t0 - chrono::Duration::seconds(1)),
        ];

        let selected = within_window(appointments, t0, t1);
        let ids: Vec<&str> = selected.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
