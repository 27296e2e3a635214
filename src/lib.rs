//! # calendar-reminder
//!
//! Background engine that reminds people of upcoming calendar appointments.
//!
//! ## Overview
//!
//! On a fixed interval the engine reads upcoming appointments from a
//! calendar source, works out which reminders (24h, 1h, 10m before start by
//! default) have come due, and sends each one exactly once through a
//! notifier. Sent state is tracked per appointment and offset so a reminder
//! is never repeated, and failed sends are retried a bounded number of times.
//!
//! ## Core Concepts
//!
//! - **Ports**: `CalendarSource` and `Notifier` are traits; the engine never
//!   talks to a concrete backend
//! - **Ticks**: one read -> compute -> dispatch -> persist pass, never overlapping
//! - **Owned lifecycle**: `ReminderService` starts and stops its own engine;
//!   nothing is global
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use calendar_reminder::{ReminderService, config::ReminderConfig};
//! use calendar_reminder::calendar::JsonFileCalendar;
//! use calendar_reminder::notify::LogNotifier;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ReminderService::new(
//!         ReminderConfig::default(),
//!         Arc::new(JsonFileCalendar::new("appointments.json")),
//!         Arc::new(LogNotifier::new()),
//!     );
//!     service.start_reminder_automation().await?;
//!     tokio::signal::ctrl_c().await?;
//!     service.cleanup().await;
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod error;
pub mod config;
pub mod common;
pub mod calendar;
pub mod notify;
pub mod automation;
pub mod server;
pub mod cli;

// Re-export commonly used types
pub use types::{Appointment, ReminderOffset};
pub use error::{Error, Result};
pub use automation::{ReminderService, StartOutcome, EngineStatus};
pub use calendar::CalendarSource;
pub use notify::Notifier;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
