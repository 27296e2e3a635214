//! Event bus for reminder engine telemetry.
//!
//! The engine publishes what it does here; the status server and any other
//! observer subscribe. Publishing never blocks the tick: with no subscribers
//! events are only counted.

use std::collections::HashMap;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

/// Events emitted by the reminder engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReminderEvent {
    /// The automation loop started
    AutomationStarted {
        timestamp: DateTime<Utc>,
    },

    /// The automation loop stopped
    AutomationStopped {
        timestamp: DateTime<Utc>,
        ticks: u64,
    },

    /// A tick finished
    TickCompleted {
        timestamp: DateTime<Utc>,
        appointments: usize,
        dispatched: usize,
        failed: usize,
    },

    /// The calendar could not be read; the tick dispatched nothing
    CalendarReadFailed {
        source: String,
        message: String,
    },

    /// A reminder was delivered
    ReminderSent {
        appointment_id: String,
        offset_seconds: u64,
        fired_at: DateTime<Utc>,
    },

    /// A delivery failed and will be retried
    ReminderFailed {
        appointment_id: String,
        offset_seconds: u64,
        attempts: u32,
        error: String,
    },

    /// A reminder will never be delivered
    ReminderAbandoned {
        appointment_id: String,
        offset_seconds: u64,
        attempts: u32,
        reason: String,
    },

    /// Expired or deleted records were dropped
    RecordsPurged {
        count: usize,
    },
}

impl ReminderEvent {
    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            ReminderEvent::AutomationStarted { .. } => "automation_started",
            ReminderEvent::AutomationStopped { .. } => "automation_stopped",
            ReminderEvent::TickCompleted { .. } => "tick_completed",
            ReminderEvent::CalendarReadFailed { .. } => "calendar_read_failed",
            ReminderEvent::ReminderSent { .. } => "reminder_sent",
            ReminderEvent::ReminderFailed { .. } => "reminder_failed",
            ReminderEvent::ReminderAbandoned { .. } => "reminder_abandoned",
            ReminderEvent::RecordsPurged { .. } => "records_purged",
        }
    }
}

/// Statistics about event bus usage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventBusStats {
    /// Total events published
    pub events_published: u64,
    /// Events by type
    pub events_by_type: HashMap<String, u64>,
    /// Current subscribers
    pub subscriber_count: usize,
}

impl EventBusStats {
    /// Count of events of one type.
    pub fn count(&self, event_type: &str) -> u64 {
        self.events_by_type.get(event_type).copied().unwrap_or(0)
    }
}

/// Event bus for engine-wide telemetry.
#[derive(Debug, Clone)]
pub struct EventBus {
    /// Broadcast sender for events
    sender: broadcast::Sender<ReminderEvent>,

    /// Statistics
    stats: Arc<RwLock<EventBusStats>>,
}

impl EventBus {
    /// Create a new event bus.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create an event bus with a specific capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));

        Self {
            sender,
            stats: Arc::new(RwLock::new(EventBusStats::default())),
        }
    }

    /// Publish an event to all subscribers.
    pub async fn publish(&self, event: ReminderEvent) {
        {
            let mut stats = self.stats.write().await;
            stats.events_published += 1;
            *stats.events_by_type
                .entry(event.event_type().to_string())
                .or_insert(0) += 1;
        }

        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events.
    pub fn subscribe(&self) -> broadcast::Receiver<ReminderEvent> {
        self.sender.subscribe()
    }

    /// Get current statistics.
    pub async fn stats(&self) -> EventBusStats {
        let mut stats = self.stats.read().await.clone();
        stats.subscriber_count = self.sender.receiver_count();
        stats
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(ReminderEvent::RecordsPurged { count: 2 }).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event, ReminderEvent::RecordsPurged { count: 2 });
    }

    #[tokio::test]
    async fn test_stats() {
        let bus = EventBus::new();
        let _rx = bus.subscribe();

        bus.publish(ReminderEvent::RecordsPurged { count: 1 }).await;
        bus.publish(ReminderEvent::CalendarReadFailed {
            source: "memory".to_string(),
            message: "down".to_string(),
        })
        .await;
        bus.publish(ReminderEvent::RecordsPurged { count: 3 }).await;

        let stats = bus.stats().await;
        assert_eq!(stats.events_published, 3);
        assert_eq!(stats.count("records_purged"), 2);
        assert_eq!(stats.count("calendar_read_failed"), 1);
        assert_eq!(stats.count("reminder_sent"), 0);
        assert_eq!(stats.subscriber_count, 1);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::with_capacity(4);
        bus.publish(ReminderEvent::RecordsPurged { count: 1 }).await;
        assert_eq!(bus.stats().await.events_published, 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = ReminderEvent::ReminderAbandoned {
            appointment_id: "evt-1".to_string(),
            offset_seconds: 600,
            attempts: 3,
            reason: "smtp down".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"ReminderAbandoned\""));
        assert_eq!(event.event_type(), "reminder_abandoned");
    }
}
