//! Reminder state store.
//!
//! One record per (appointment, offset) pair. Records are created the first
//! time the scheduler evaluates a pair and removed once the appointment is
//! long past or has disappeared from the calendar.
//!
//! ## Record states
//!
//! ```text
//!            dispatch ok
//!   Pending ────────────▶ Fired
//!      │  │
//!      │  └─ attempts == max ─▶ PermanentlyFailed
//!      │
//!      └─ already stale when first seen ─▶ Missed
//! ```
//!
//! Every state except `Pending` is terminal. In particular `Fired` never
//! reverts to `Pending` while the record exists.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::config::ReminderConfig;
use crate::types::{Appointment, ReminderOffset};

/// Lifecycle state of one reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderState {
    /// Not yet delivered; may still be dispatched.
    Pending,
    /// Delivered.
    Fired,
    /// Retry budget exhausted, or the notifier refused it outright.
    PermanentlyFailed,
    /// Came due before the engine could have seen the appointment.
    Missed,
}

/// Key of a reminder record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReminderKey {
    pub appointment_id: String,
    pub offset: ReminderOffset,
}

impl ReminderKey {
    fn new(appointment_id: &str, offset: ReminderOffset) -> Self {
        Self {
            appointment_id: appointment_id.to_string(),
            offset,
        }
    }
}

/// State tracked for one (appointment, offset) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderRecord {
    /// Start of the appointment, as last reported by the calendar
    pub appointment_start: DateTime<Utc>,

    /// When the engine first evaluated this pair
    pub first_observed: DateTime<Utc>,

    /// Current state
    pub state: ReminderState,

    /// Delivery time, once fired
    pub fired_at: Option<DateTime<Utc>>,

    /// Dispatch attempts, successful or not
    pub attempts: u32,

    /// Most recent dispatch error
    pub last_error: Option<String>,
}

impl ReminderRecord {
    fn new(appointment_start: DateTime<Utc>, observed: DateTime<Utc>) -> Self {
        Self {
            appointment_start,
            first_observed: observed,
            state: ReminderState::Pending,
            fired_at: None,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.state == ReminderState::Fired
    }

    pub fn is_permanently_failed(&self) -> bool {
        self.state == ReminderState::PermanentlyFailed
    }

    pub fn is_pending(&self) -> bool {
        self.state == ReminderState::Pending
    }
}

/// Result of recording a failed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The reminder stays pending and will be retried.
    Retrying { attempts: u32, remaining: u32 },
    /// The retry budget is spent; the reminder is now permanently failed.
    Exhausted { attempts: u32 },
}

/// Serializable view of one record.
#[derive(Debug, Clone, Serialize)]
pub struct ReminderStatus {
    pub appointment_id: String,
    pub offset_seconds: u64,
    pub offset: String,
    #[serde(flatten)]
    pub record: ReminderRecord,
}

/// Record counts by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub pending: usize,
    pub fired: usize,
    pub permanently_failed: usize,
    pub missed: usize,
}

/// In-memory reminder state store.
#[derive(Debug, Clone)]
pub struct ReminderStore {
    records: HashMap<ReminderKey, ReminderRecord>,
    max_attempts: u32,
    retention: chrono::Duration,
}

impl ReminderStore {
    /// Create an empty store.
    pub fn new(max_attempts: u32, retention: chrono::Duration) -> Self {
        Self {
            records: HashMap::new(),
            max_attempts: max_attempts.max(1),
            retention,
        }
    }

    /// Create a store from the reminder configuration.
    pub fn from_config(config: &ReminderConfig) -> Self {
        Self::new(config.max_attempts, config.retention())
    }

    /// Get or lazily create the record for a pair.
    ///
    /// An existing record keeps its state but follows the appointment's
    /// current start time.
    pub fn observe(
        &mut self,
        appointment: &Appointment,
        offset: ReminderOffset,
        now: DateTime<Utc>,
    ) -> &ReminderRecord {
        let record = self
            .records
            .entry(ReminderKey::new(&appointment.id, offset))
            .or_insert_with(|| ReminderRecord::new(appointment.start, now));
        record.appointment_start = appointment.start;
        record
    }

    /// Look up a record.
    pub fn get(&self, appointment_id: &str, offset: ReminderOffset) -> Option<&ReminderRecord> {
        self.records.get(&ReminderKey::new(appointment_id, offset))
    }

    /// Whether the pair has been delivered. False when no record exists.
    pub fn is_fired(&self, appointment_id: &str, offset: ReminderOffset) -> bool {
        self.get(appointment_id, offset)
            .map(ReminderRecord::is_fired)
            .unwrap_or(false)
    }

    /// Mark a pending pair as delivered at `at`.
    ///
    /// Returns whether the record changed. Repeated calls leave `fired_at`
    /// and `attempts` untouched.
    pub fn mark_fired(
        &mut self,
        appointment_id: &str,
        offset: ReminderOffset,
        at: DateTime<Utc>,
    ) -> bool {
        match self.pending_mut(appointment_id, offset) {
            Some(record) => {
                record.state = ReminderState::Fired;
                record.fired_at = Some(at);
                record.attempts += 1;
                record.last_error = None;
                true
            }
            None => false,
        }
    }

    /// Count a failed dispatch.
    ///
    /// Once `max_attempts` failures accumulate the record becomes
    /// permanently failed. Returns `None` when the pair is not pending.
    pub fn record_attempt(
        &mut self,
        appointment_id: &str,
        offset: ReminderOffset,
        error: &str,
    ) -> Option<AttemptOutcome> {
        let max_attempts = self.max_attempts;
        let record = self.pending_mut(appointment_id, offset)?;

        record.attempts += 1;
        record.last_error = Some(error.to_string());

        if record.attempts >= max_attempts {
            record.state = ReminderState::PermanentlyFailed;
            Some(AttemptOutcome::Exhausted {
                attempts: record.attempts,
            })
        } else {
            Some(AttemptOutcome::Retrying {
                attempts: record.attempts,
                remaining: max_attempts - record.attempts,
            })
        }
    }

    /// Give up on a pending pair without spending the remaining budget.
    pub fn mark_permanently_failed(
        &mut self,
        appointment_id: &str,
        offset: ReminderOffset,
        reason: &str,
    ) -> bool {
        match self.pending_mut(appointment_id, offset) {
            Some(record) => {
                record.state = ReminderState::PermanentlyFailed;
                record.last_error = Some(reason.to_string());
                true
            }
            None => false,
        }
    }

    /// Mark a pending pair as missed.
    pub fn mark_missed(&mut self, appointment_id: &str, offset: ReminderOffset) -> bool {
        match self.pending_mut(appointment_id, offset) {
            Some(record) => {
                record.state = ReminderState::Missed;
                true
            }
            None => false,
        }
    }

    /// Remove records whose appointment started before `before - retention`.
    pub fn purge_expired(&mut self, before: DateTime<Utc>) -> usize {
        let cutoff = before - self.retention;
        let len = self.records.len();
        self.records.retain(|_, r| r.appointment_start >= cutoff);
        len - self.records.len()
    }

    /// Remove records for appointments the calendar no longer reports.
    ///
    /// Only records whose start lies inside `[window_start, window_end)` are
    /// considered, since the calendar says nothing about anything else.
    pub fn forget_missing(
        &mut self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        present: &HashSet<&str>,
    ) -> usize {
        let len = self.records.len();
        self.records.retain(|key, r| {
            let in_window = r.appointment_start >= window_start && r.appointment_start < window_end;
            !in_window || present.contains(key.appointment_id.as_str())
        });
        len - self.records.len()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Counts by state.
    pub fn counts(&self) -> StoreCounts {
        let mut counts = StoreCounts::default();
        for record in self.records.values() {
            match record.state {
                ReminderState::Pending => counts.pending += 1,
                ReminderState::Fired => counts.fired += 1,
                ReminderState::PermanentlyFailed => counts.permanently_failed += 1,
                ReminderState::Missed => counts.missed += 1,
            }
        }
        counts
    }

    /// Every record, ordered by appointment start then id then offset.
    pub fn snapshot(&self) -> Vec<ReminderStatus> {
        let mut entries: Vec<(&ReminderKey, &ReminderRecord)> = self.records.iter().collect();
        entries.sort_by(|(ka, ra), (kb, rb)| {
            ra.appointment_start
                .cmp(&rb.appointment_start)
                .then_with(|| ka.appointment_id.cmp(&kb.appointment_id))
                .then_with(|| kb.offset.cmp(&ka.offset))
        });

        entries
            .into_iter()
            .map(|(key, record)| ReminderStatus {
                appointment_id: key.appointment_id.clone(),
                offset_seconds: key.offset.as_secs(),
                offset: key.offset.to_string(),
                record: record.clone(),
            })
            .collect()
    }

    fn pending_mut(
        &mut self,
        appointment_id: &str,
        offset: ReminderOffset,
    ) -> Option<&mut ReminderRecord> {
        self.records
            .get_mut(&ReminderKey::new(appointment_id, offset))
            .filter(|r| r.is_pending())
    }
}
