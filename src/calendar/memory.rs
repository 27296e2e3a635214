//! In-memory calendar.
//!
//! Appointments live in a map guarded by an async lock. Reads can be made to
//! fail on demand, which is how tests exercise the engine's read-failure path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{within_window, CalendarSource};
use crate::error::CalendarError;
use crate::types::Appointment;

/// Calendar backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCalendar {
    appointments: Arc<RwLock<HashMap<String, Appointment>>>,
    failures_remaining: Arc<AtomicU32>,
    reads: Arc<AtomicU64>,
}

impl InMemoryCalendar {
    /// Create an empty calendar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a calendar pre-populated with appointments.
    pub async fn with_appointments(appointments: Vec<Appointment>) -> Self {
        let calendar = Self::new();
        for appointment in appointments {
            calendar.upsert(appointment).await;
        }
        calendar
    }

    /// Insert or replace an appointment by id.
    pub async fn upsert(&self, appointment: Appointment) {
        self.appointments
            .write()
            .await
            .insert(appointment.id.clone(), appointment);
    }

    /// Remove an appointment. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        self.appointments.write().await.remove(id).is_some()
    }

    /// Make the next `count` reads fail with `CalendarError::Unavailable`.
    pub fn fail_next_reads(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Number of list calls made so far, including failed ones.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarSource for InMemoryCalendar {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_appointments(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, CalendarError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(CalendarError::Unavailable(
                "simulated calendar outage".to_string(),
            ));
        }

        let appointments = self.appointments.read().await;
        Ok(within_window(
            appointments.values().cloned(),
            window_start,
            window_end,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_and_list() {
        let calendar = InMemoryCalendar::with_appointments(vec![
            Appointment::new("a", "Review", t0() + chrono::Duration::minutes(30)),
            Appointment::new("b", "Offsite", t0() + chrono::Duration::days(3)),
        ])
        .await;

        let listed = calendar
            .list_appointments(t0(), t0() + chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "a");

        calendar
            .upsert(Appointment::new("a", "Review (moved)", t0() + chrono::Duration::hours(2)))
            .await;
        let listed = calendar
            .list_appointments(t0(), t0() + chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(listed[0].title, "Review (moved)");
    }

    #[tokio::test]
    async fn test_remove() {
        let calendar = InMemoryCalendar::new();
        calendar.upsert(Appointment::new("a", "Review", t0())).await;
        assert!(calendar.remove("a").await);
        assert!(!calendar.remove("a").await);
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let calendar = InMemoryCalendar::new();
        calendar.fail_next_reads(2);

        let end = t0() + chrono::Duration::days(1);
        assert!(calendar.list_appointments(t0(), end).await.is_err());
        assert!(calendar.list_appointments(t0(), end).await.is_err());
        assert!(calendar.list_appointments(t0(), end).await.is_ok());
        assert_eq!(calendar.read_count(), 3);
    }
}
