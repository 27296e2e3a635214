//! Reminder scheduler.
//!
//! One tick is a full read -> compute -> dispatch -> persist pass:
//!
//! 1. compute the scan window from the clock,
//! 2. list appointments in that window (with short in-tick retries),
//! 3. work out which (appointment, offset) pairs are due,
//! 4. dispatch them earliest-due first, each failure isolated,
//! 5. purge records whose appointments are long past.
//!
//! A failed calendar read turns the tick into a no-dispatch pass. Nothing
//! here stops the loop; the lifecycle controller decides when to stop.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::clock::Clock;
use super::events::{EventBus, ReminderEvent};
use super::store::{AttemptOutcome, ReminderStore};
use crate::calendar::CalendarSource;
use crate::common::{with_retry, RetryPolicy};
use crate::config::ReminderConfig;
use crate::notify::Notifier;
use crate::types::{Appointment, ReminderOffset};

/// Time range scanned by one tick: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScanWindow {
    /// Window starting at `now` (or `floor`, whichever is later).
    ///
    /// The floor keeps the lower bound from retreating if the wall clock
    /// steps backwards between ticks.
    pub fn compute(
        now: DateTime<Utc>,
        floor: Option<DateTime<Utc>>,
        lookahead: chrono::Duration,
    ) -> Self {
        let start = floor.map_or(now, |f| f.max(now));
        Self {
            start,
            end: start + lookahead,
        }
    }

    /// Whether `t` lies inside the window.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }
}

/// A reminder selected for dispatch in the current tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReminder {
    pub appointment: Appointment,
    pub offset: ReminderOffset,
    pub due_at: DateTime<Utc>,
}

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Effective time the tick evaluated against
    pub now: DateTime<Utc>,
    pub window: ScanWindow,
    /// Calendar read error, when the tick degraded to a no-dispatch pass
    pub read_error: Option<String>,
    pub appointments: usize,
    pub due: usize,
    pub dispatched: usize,
    pub failed: usize,
    pub abandoned: usize,
    pub missed: usize,
    pub forgotten: usize,
    pub purged: usize,
    pub next_tick_in_seconds: u64,
}

impl TickReport {
    fn new(window: ScanWindow, next_tick: Duration) -> Self {
        Self {
            now: window.start,
            window,
            read_error: None,
            appointments: 0,
            due: 0,
            dispatched: 0,
            failed: 0,
            abandoned: 0,
            missed: 0,
            forgotten: 0,
            purged: 0,
            next_tick_in_seconds: next_tick.as_secs(),
        }
    }
}

/// The reminder control loop body.
pub struct ReminderScheduler {
    config: ReminderConfig,
    offsets: Vec<ReminderOffset>,
    calendar: Arc<dyn CalendarSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    store: ReminderStore,
    read_retry: RetryPolicy,
    window_floor: Option<DateTime<Utc>>,
    /// Window start of the last tick whose calendar read succeeded
    last_scan: Option<DateTime<Utc>>,
    ticks: u64,
}

impl ReminderScheduler {
    /// Create a scheduler with an empty reminder store.
    pub fn new(
        config: ReminderConfig,
        calendar: Arc<dyn CalendarSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        Self {
            offsets: config.offsets(),
            store: ReminderStore::from_config(&config),
            read_retry: RetryPolicy::new(config.calendar_read_retries),
            config,
            calendar,
            notifier,
            clock,
            events,
            window_floor: None,
            last_scan: None,
            ticks: 0,
        }
    }

    /// Reminder records.
    pub fn store(&self) -> &ReminderStore {
        &self.store
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Delay before the next tick. Constant: the loop is a steady heartbeat.
    pub fn next_delay(&self) -> Duration {
        self.config.poll_interval()
    }

    /// Run one full tick.
    pub async fn tick(&mut self) -> TickReport {
        let window = ScanWindow::compute(self.clock.now(), self.window_floor, self.config.lookahead());
        self.window_floor = Some(window.start);
        self.ticks += 1;

        let now = window.start;
        let mut report = TickReport::new(window, self.next_delay());

        let calendar = self.calendar.as_ref();
        let read = with_retry(&self.read_retry, || {
            calendar.list_appointments(window.start, window.end)
        })
        .await
        .into_result();

        match read {
            Ok(appointments) => {
                report.appointments = appointments.len();

                let present: HashSet<&str> = appointments.iter().map(|a| a.id.as_str()).collect();
                report.forgotten = self.store.forget_missing(window.start, window.end, &present);

                let due = self.collect_due(&appointments, now, &mut report);
                report.due = due.len();

                for reminder in &due {
                    self.dispatch(reminder, &mut report).await;
                }

                self.last_scan = Some(now);
            }
            Err(e) => {
                tracing::warn!(
                    "Calendar read from '{}' failed, skipping dispatch this tick: {}",
                    self.calendar.name(),
                    e
                );
                report.read_error = Some(e.to_string());
                self.events
                    .publish(ReminderEvent::CalendarReadFailed {
                        source: self.calendar.name().to_string(),
                        message: e.to_string(),
                    })
                    .await;
            }
        }

        report.purged = self.store.purge_expired(now);
        let removed = report.purged + report.forgotten;
        if removed > 0 {
            self.events
                .publish(ReminderEvent::RecordsPurged { count: removed })
                .await;
        }

        self.events
            .publish(ReminderEvent::TickCompleted {
                timestamp: now,
                appointments: report.appointments,
                dispatched: report.dispatched,
                failed: report.failed,
            })
            .await;

        tracing::debug!(
            "Tick {} at {}: {} appointments, {} due, {} sent, {} failed, {} purged",
            self.ticks,
            now,
            report.appointments,
            report.due,
            report.dispatched,
            report.failed,
            removed
        );

        report
    }

    /// Select due reminders, earliest due first.
    ///
    /// A pair is due when `due_at <= now < start` and it is still pending.
    /// A pair seen for the first time is marked missed instead when it became
    /// due before the previous successful scan (less the catch-up grace): the
    /// engine had a chance to see it then and the appointment was not there.
    /// With no previous scan the cutoff is `now` less the grace.
    fn collect_due(
        &mut self,
        appointments: &[Appointment],
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) -> Vec<DueReminder> {
        let stale_before = self.last_scan.unwrap_or(now) - self.config.catch_up_grace();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut due = Vec::new();

        for appointment in appointments {
            if !seen.insert(appointment.id.as_str()) {
                tracing::debug!("Duplicate appointment id '{}' in listing", appointment.id);
                continue;
            }
            if appointment.has_started(now) {
                continue;
            }

            for &offset in &self.offsets {
                let known = self.store.get(&appointment.id, offset).is_some();
                let pending = self.store.observe(appointment, offset, now).is_pending();

                let due_at = appointment.due_at(offset);
                if !pending || due_at > now {
                    continue;
                }

                if !known && due_at < stale_before {
                    tracing::debug!(
                        "Skipping stale {} reminder for '{}' (due {}, cutoff {})",
                        offset,
                        appointment.id,
                        due_at,
                        stale_before
                    );
                    self.store.mark_missed(&appointment.id, offset);
                    report.missed += 1;
                    continue;
                }

                due.push(DueReminder {
                    appointment: appointment.clone(),
                    offset,
                    due_at,
                });
            }
        }

        due.sort_by(|a, b| {
            a.due_at
                .cmp(&b.due_at)
                .then_with(|| a.appointment.id.cmp(&b.appointment.id))
                .then_with(|| b.offset.cmp(&a.offset))
        });
        due
    }

    /// Send one reminder and record the outcome.
    async fn dispatch(&mut self, reminder: &DueReminder, report: &mut TickReport) {
        let id = reminder.appointment.id.as_str();
        let offset = reminder.offset;

        match self.notifier.send_reminder(&reminder.appointment, offset).await {
            Ok(()) => {
                let fired_at = self.clock.now();
                self.store.mark_fired(id, offset, fired_at);
                report.dispatched += 1;

                tracing::info!("Sent {} reminder for '{}' via {}", offset, id, self.notifier.name());
                self.events
                    .publish(ReminderEvent::ReminderSent {
                        appointment_id: id.to_string(),
                        offset_seconds: offset.as_secs(),
                        fired_at,
                    })
                    .await;
            }
            Err(e) if !e.is_retryable() => {
                report.failed += 1;
                report.abandoned += 1;

                let reason = e.to_string();
                self.store.record_attempt(id, offset, &reason);
                self.store.mark_permanently_failed(id, offset, &reason);
                let attempts = self.store.get(id, offset).map(|r| r.attempts).unwrap_or(0);

                tracing::error!("Giving up on {} reminder for '{}': {}", offset, id, reason);
                self.events
                    .publish(ReminderEvent::ReminderAbandoned {
                        appointment_id: id.to_string(),
                        offset_seconds: offset.as_secs(),
                        attempts,
                        reason,
                    })
                    .await;
            }
            Err(e) => {
                report.failed += 1;

                let error = e.to_string();
                match self.store.record_attempt(id, offset, &error) {
                    Some(AttemptOutcome::Retrying { attempts, remaining }) => {
                        tracing::warn!(
                            "Sending {} reminder for '{}' failed (attempt {}, {} left): {}",
                            offset,
                            id,
                            attempts,
                            remaining,
                            error
                        );
                        self.events
                            .publish(ReminderEvent::ReminderFailed {
                                appointment_id: id.to_string(),
                                offset_seconds: offset.as_secs(),
                                attempts,
                                error,
                            })
                            .await;
                    }
                    Some(AttemptOutcome::Exhausted { attempts }) => {
                        report.abandoned += 1;
                        tracing::error!(
                            "Giving up on {} reminder for '{}' after {} attempts: {}",
                            offset,
                            id,
                            attempts,
                            error
                        );
                        self.events
                            .publish(ReminderEvent::ReminderAbandoned {
                                appointment_id: id.to_string(),
                                offset_seconds: offset.as_secs(),
                                attempts,
                                reason: error,
                            })
                            .await;
                    }
                    None => {}
                }
            }
        }
    }
}
