//! JSON file calendar.
//!
//! The file holds an array of appointments and is re-read on every scan, so
//! edits show up on the next tick without restarting the service:
//!
//! ```json
//! [
//!   {"id": "evt-1", "title": "Dentist", "start": "2026-03-02T09:30:00Z",
//!    "recipients": ["me@example.com"]}
//! ]
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use super::{within_window, CalendarSource};
use crate::error::CalendarError;
use crate::types::Appointment;

/// Calendar read from a JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileCalendar {
    path: PathBuf,
}

impl JsonFileCalendar {
    /// Create a calendar reading from `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CalendarSource for JsonFileCalendar {
    fn name(&self) -> &str {
        "json-file"
    }

    async fn list_appointments(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, CalendarError> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CalendarError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let appointments: Vec<Appointment> = serde_json::from_str(&contents).map_err(|e| {
            CalendarError::InvalidData(format!("{}: {}", self.path.display(), e))
        })?;

        Ok(within_window(appointments, window_start, window_end))
    }
}
