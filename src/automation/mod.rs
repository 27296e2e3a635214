//! Reminder automation engine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  ReminderService                      │
//! │   start_reminder_automation()        cleanup()        │
//! │                        │                              │
//! │                        ↓                              │
//! │  ┌────────────┐  ┌────────────┐  ┌────────────┐       │
//! │  │  Calendar  │→ │ Scheduler  │→ │  Notifier  │       │
//! │  │   Source   │  │   (tick)   │  │            │       │
//! │  └────────────┘  └─────┬──────┘  └────────────┘       │
//! │                        ↓                              │
//! │              ┌──────────────────┐                     │
//! │              │  Reminder Store  │                     │
//! │              └──────────────────┘                     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The scheduler owns the store and runs inside a single task, so ticks
//! never overlap and the store needs no lock of its own.

pub mod clock;
pub mod events;
pub mod lifecycle;
pub mod scheduler;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{EventBus, EventBusStats, ReminderEvent};
pub use lifecycle::{EngineStatus, ReminderService, StartOutcome};
pub use scheduler::{DueReminder, ReminderScheduler, ScanWindow, TickReport};
pub use store::{ReminderRecord, ReminderState, ReminderStatus, ReminderStore, StoreCounts};
