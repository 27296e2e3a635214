//! Lifecycle controller for the reminder engine.
//!
//! ```text
//!            start_reminder_automation()
//!   Idle ───────────────────────────────▶ Running ──┐
//!    ▲                                      │  ▲    │ tick, then rearm timer
//!    └──────────── cleanup() ───────────────┘  └────┘
//! ```
//!
//! Each service instance owns at most one engine: a scheduler (with its
//! reminder store) moved into a single tokio task, plus the cancellation
//! token that stands in for its timer. Starting a running service is a
//! no-op. `cleanup()` cancels the pending timer, waits for any in-flight
//! tick to finish, and drops the engine; once it returns no further
//! reminders are sent.

use std::sync::Arc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::clock::{Clock, SystemClock};
use super::events::{EventBus, ReminderEvent};
use super::scheduler::{ReminderScheduler, TickReport};
use super::store::{ReminderStatus, StoreCounts};
use crate::calendar::CalendarSource;
use crate::config::ReminderConfig;
use crate::error::ConfigError;
use crate::notify::Notifier;

/// What `start_reminder_automation` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new engine was started.
    Started,
    /// An engine was already running; nothing changed.
    AlreadyRunning,
}

/// Point-in-time view of the engine, refreshed after every tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub ticks: u64,
    pub last_tick: Option<TickReport>,
    pub counts: StoreCounts,
    pub reminders: Vec<ReminderStatus>,
}

/// A running engine: the loop task and the token that stops it.
struct Engine {
    cancel: CancellationToken,
    task: JoinHandle<u64>,
}

/// Owns the reminder engine and controls its lifecycle.
pub struct ReminderService {
    config: ReminderConfig,
    calendar: Arc<dyn CalendarSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    engine: Mutex<Option<Engine>>,
    status: Arc<RwLock<EngineStatus>>,
}

impl ReminderService {
    /// Create an idle service using the system clock.
    pub fn new(
        config: ReminderConfig,
        calendar: Arc<dyn CalendarSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            calendar,
            notifier,
            clock: Arc::new(SystemClock),
            events: EventBus::new(),
            engine: Mutex::new(None),
            status: Arc::new(RwLock::new(EngineStatus::default())),
        }
    }

    /// Use a different wall clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish events on an existing bus.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// The event bus the engine publishes on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Whether an engine is running.
    pub async fn is_running(&self) -> bool {
        self.engine.lock().await.is_some()
    }

    /// Latest engine status.
    pub async fn status(&self) -> EngineStatus {
        self.status.read().await.clone()
    }

    /// Start the engine.
    ///
    /// Runs one tick immediately, then arms the repeating timer. Returns
    /// once that first tick has been attempted.
    pub async fn start_reminder_automation(&self) -> Result<StartOutcome, ConfigError> {
        let mut engine = self.engine.lock().await;
        if engine.is_some() {
            tracing::warn!("Reminder automation already running, ignoring start");
            return Ok(StartOutcome::AlreadyRunning);
        }

        self.config.validate()?;

        let mut scheduler = ReminderScheduler::new(
            self.config.clone(),
            Arc::clone(&self.calendar),
            Arc::clone(&self.notifier),
            Arc::clone(&self.clock),
            self.events.clone(),
        );

        tracing::info!(
            "Starting reminder automation: calendar '{}', notifier '{}', every {:?}",
            self.calendar.name(),
            self.notifier.name(),
            self.config.poll_interval()
        );
        self.events
            .publish(ReminderEvent::AutomationStarted {
                timestamp: self.clock.now(),
            })
            .await;

        let report = scheduler.tick().await;
        publish_status(&self.status, &scheduler, report).await;

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_loop(scheduler, cancel.clone(), Arc::clone(&self.status)));
        *engine = Some(Engine { cancel, task });

        Ok(StartOutcome::Started)
    }

    /// Stop the engine and release its timer.
    ///
    /// Safe to call repeatedly and on a service that never started. An
    /// in-flight tick is allowed to finish before this returns.
    pub async fn cleanup(&self) {
        let mut engine = self.engine.lock().await;
        let Some(running) = engine.take() else {
            tracing::debug!("Reminder automation not running, nothing to clean up");
            return;
        };

        running.cancel.cancel();
        let ticks = match running.task.await {
            Ok(ticks) => ticks,
            Err(e) => {
                tracing::error!("Reminder loop ended abnormally: {}", e);
                0
            }
        };

        self.status.write().await.running = false;
        self.events
            .publish(ReminderEvent::AutomationStopped {
                timestamp: self.clock.now(),
                ticks,
            })
            .await;
        tracing::info!("Reminder automation stopped after {} ticks", ticks);
    }
}

impl Drop for ReminderService {
    fn drop(&mut self) {
        // Without an explicit cleanup, at least stop the timer.
        if let Ok(mut engine) = self.engine.try_lock() {
            if let Some(running) = engine.take() {
                running.cancel.cancel();
            }
        }
    }
}

/// Sleep, tick, repeat until cancelled. Returns the number of ticks run.
///
/// Cancellation only interrupts the sleep; a tick in progress always
/// completes.
async fn run_loop(
    mut scheduler: ReminderScheduler,
    cancel: CancellationToken,
    status: Arc<RwLock<EngineStatus>>,
) -> u64 {
    loop {
        let delay = scheduler.next_delay();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let report = scheduler.tick().await;
        publish_status(&status, &scheduler, report).await;

        if cancel.is_cancelled() {
            break;
        }
    }

    scheduler.ticks()
}

async fn publish_status(
    status: &RwLock<EngineStatus>,
    scheduler: &ReminderScheduler,
    report: TickReport,
) {
    let store = scheduler.store();
    let mut status = status.write().await;
    status.running = true;
    status.ticks = scheduler.ticks();
    status.last_tick = Some(report);
    status.counts = store.counts();
    status.reminders = store.snapshot();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::clock::ManualClock;
    use crate::automation::store::ReminderState;
    use crate::calendar::InMemoryCalendar;
    use crate::error::NotificationError;
    use crate::notify::RecordingNotifier;
    use crate::types::{Appointment, ReminderOffset};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::time::Duration;

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 11, 3, 10, 0, 0).unwrap()
    }

    fn appointment(id: &str, start: DateTime<Utc>) -> Appointment {
        Appointment::new(id, "Standup", start).with_recipients(vec!["me@example.com".to_string()])
    }

    fn config() -> ReminderConfig {
        ReminderConfig {
            offsets_seconds: vec![3600],
            ..ReminderConfig::for_testing()
        }
    }

    fn service(
        calendar: &InMemoryCalendar,
        notifier: Arc<dyn Notifier>,
        clock: Arc<ManualClock>,
    ) -> ReminderService {
        ReminderService::new(config(), Arc::new(calendar.clone()), notifier).with_clock(clock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_first_tick_immediately() {
        let calendar = InMemoryCalendar::new();
        calendar.upsert(appointment("evt", t())).await;
        let notifier = RecordingNotifier::new();
        let clock = Arc::new(ManualClock::new(t() - chrono::Duration::minutes(59)));
        let service = service(&calendar, Arc::new(notifier.clone()), clock);

        let outcome = service.start_reminder_automation().await.unwrap();
        assert_eq!(outcome, StartOutcome::Started);
        assert_eq!(notifier.delivered().await.len(), 1);

        let status = service.status().await;
        assert!(status.running);
        assert_eq!(status.ticks, 1);
        assert_eq!(status.counts.fired, 1);
        assert_eq!(status.reminders[0].record.state, ReminderState::Fired);

        service.cleanup().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_keeps_one_loop() {
        let calendar = InMemoryCalendar::new();
        let clock = Arc::new(ManualClock::new(t()));
        let service = service(&calendar, Arc::new(RecordingNotifier::new()), clock);

        assert_eq!(
            service.start_reminder_automation().await.unwrap(),
            StartOutcome::Started
        );
        assert_eq!(
            service.start_reminder_automation().await.unwrap(),
            StartOutcome::AlreadyRunning
        );

        // Three more intervals elapse: one loop means four ticks in total.
        tokio::time::sleep(Duration::from_secs(185)).await;
        assert_eq!(service.status().await.ticks, 4);
        assert_eq!(calendar.read_count(), 4);

        service.cleanup().await;
        assert_eq!(service.events().stats().await.count("automation_started"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_cleanup() {
        let calendar = InMemoryCalendar::new();
        let clock = Arc::new(ManualClock::new(t()));
        let service = service(&calendar, Arc::new(RecordingNotifier::new()), clock);

        service.start_reminder_automation().await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        service.cleanup().await;
        assert!(!service.is_running().await);
        assert!(!service.status().await.running);

        let reads = calendar.read_count();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(calendar.read_count(), reads);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let calendar = InMemoryCalendar::new();
        let clock = Arc::new(ManualClock::new(t()));
        let service = service(&calendar, Arc::new(RecordingNotifier::new()), clock);

        // Never started.
        service.cleanup().await;

        service.start_reminder_automation().await.unwrap();
        service.cleanup().await;
        service.cleanup().await;

        let stats = service.events().stats().await;
        assert_eq!(stats.count("automation_stopped"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_cleanup() {
        let calendar = InMemoryCalendar::new();
        let clock = Arc::new(ManualClock::new(t()));
        let service = service(&calendar, Arc::new(RecordingNotifier::new()), clock);

        service.start_reminder_automation().await.unwrap();
        service.cleanup().await;

        assert_eq!(
            service.start_reminder_automation().await.unwrap(),
            StartOutcome::Started
        );
        assert!(service.is_running().await);
        // Fresh engine state.
        assert_eq!(service.status().await.ticks, 1);

        service.cleanup().await;
    }

    #[tokio::test]
    async fn test_invalid_config_is_refused() {
        let calendar = InMemoryCalendar::new();
        let mut bad = config();
        bad.max_attempts = 0;
        let service = ReminderService::new(
            bad,
            Arc::new(calendar.clone()),
            Arc::new(RecordingNotifier::new()),
        );

        assert!(service.start_reminder_automation().await.is_err());
        assert!(!service.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_calendar_outage_does_not_stop_loop() {
        let calendar = InMemoryCalendar::new();
        calendar.upsert(appointment("evt", t())).await;
        let notifier = RecordingNotifier::new();
        let clock = Arc::new(ManualClock::new(t() - chrono::Duration::minutes(59)));
        calendar.fail_next_reads(2);
        let service = service(&calendar, Arc::new(notifier.clone()), clock);

        service.start_reminder_automation().await.unwrap();
        assert!(service.status().await.last_tick.unwrap().read_error.is_some());

        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(notifier.delivered().await.len(), 1);
        assert!(service.status().await.last_tick.unwrap().read_error.is_none());

        service.cleanup().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_visible_in_status() {
        let calendar = InMemoryCalendar::new();
        calendar.upsert(appointment("evt", t())).await;
        let notifier = RecordingNotifier::new();
        notifier
            .fail_always("evt", NotificationError::Unavailable("smtp down".into()))
            .await;
        let clock = Arc::new(ManualClock::new(t() - chrono::Duration::minutes(59)));
        let service = service(&calendar, Arc::new(notifier.clone()), clock);

        service.start_reminder_automation().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60 * 5 + 5)).await;

        assert_eq!(notifier.calls_for("evt", ReminderOffset::from_hours(1)).await, 3);
        let status = service.status().await;
        assert_eq!(status.counts.permanently_failed, 1);
        assert_eq!(status.reminders[0].record.attempts, 3);

        service.cleanup().await;
    }

    /// Notifier whose deliveries take a while.
    struct SlowNotifier {
        inner: RecordingNotifier,
        delay: Duration,
    }

    #[async_trait]
    impl Notifier for SlowNotifier {
        fn name(&self) -> &str {
            "slow"
        }

        async fn send_reminder(
            &self,
            appointment: &Appointment,
            offset: ReminderOffset,
        ) -> Result<(), NotificationError> {
            tokio::time::sleep(self.delay).await;
            self.inner.send_reminder(appointment, offset).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_waits_for_in_flight_tick() {
        let calendar = InMemoryCalendar::new();
        calendar.upsert(appointment("evt", t())).await;
        let recorder = RecordingNotifier::new();
        let notifier = Arc::new(SlowNotifier {
            inner: recorder.clone(),
            delay: Duration::from_secs(30),
        });
        let clock = Arc::new(ManualClock::new(t() - chrono::Duration::minutes(70)));
        let service = service(&calendar, notifier, clock.clone());

        // First tick: nothing due yet.
        service.start_reminder_automation().await.unwrap();
        assert!(recorder.calls().await.is_empty());

        // The next tick starts at +60s and spends 30s delivering.
        clock.set(t() - chrono::Duration::minutes(59));
        tokio::time::sleep(Duration::from_secs(65)).await;
        assert!(recorder.calls().await.is_empty());

        service.cleanup().await;
        assert_eq!(recorder.delivered().await.len(), 1);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(recorder.calls().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_instances() {
        let calendar = InMemoryCalendar::new();
        let clock = Arc::new(ManualClock::new(t()));
        let first = service(&calendar, Arc::new(RecordingNotifier::new()), clock.clone());
        let second = service(&calendar, Arc::new(RecordingNotifier::new()), clock);

        first.start_reminder_automation().await.unwrap();
        second.start_reminder_automation().await.unwrap();
        first.cleanup().await;

        assert!(!first.is_running().await);
        assert!(second.is_running().await);

        second.cleanup().await;
    }
}
