//! Service configuration.
//!
//! Configuration is a single JSON document. Every field has a default so a
//! partial file (or `{}`) is a valid starting point.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::{ReminderOffset, MAX_OFFSET_SECS};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP status server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Reminder engine configuration
    #[serde(default)]
    pub reminders: ReminderConfig,

    /// Where appointments are read from
    #[serde(default)]
    pub calendar: CalendarConfig,

    /// How reminders are delivered
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

/// Reminder engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Delay between two ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Lead times before an appointment at which reminders fire
    #[serde(default = "default_offsets")]
    pub offsets_seconds: Vec<u64>,

    /// How long records are kept after their appointment started
    #[serde(default = "default_retention")]
    pub retention_seconds: u64,

    /// Failed dispatches tolerated before a reminder is abandoned
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Extra lookahead added to the largest offset when scanning
    #[serde(default = "default_scan_margin")]
    pub scan_margin_seconds: u64,

    /// How far before first observation a due time may lie and still fire
    #[serde(default = "default_catch_up_grace")]
    pub catch_up_grace_seconds: u64,

    /// In-tick retries of a failed calendar read
    #[serde(default = "default_read_retries")]
    pub calendar_read_retries: u32,
}

/// Calendar source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// JSON file holding the appointments
    #[serde(default = "default_calendar_path")]
    pub path: PathBuf,
}

/// Notifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Write reminders to the log
    Log,

    /// POST reminders to an HTTP endpoint
    Webhook {
        url: String,
        #[serde(default = "default_webhook_timeout")]
        timeout_seconds: u64,
    },
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    60
}

fn default_offsets() -> Vec<u64> {
    vec![24 * 3600, 3600, 600]
}

fn default_retention() -> u64 {
    24 * 3600
}

fn default_max_attempts() -> u32 {
    3
}

fn default_scan_margin() -> u64 {
    300
}

fn default_catch_up_grace() -> u64 {
    120
}

fn default_read_retries() -> u32 {
    2
}

fn default_calendar_path() -> PathBuf {
    PathBuf::from("~/.calendar-reminder/appointments.json")
}

fn default_webhook_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            reminders: ReminderConfig::default(),
            calendar: CalendarConfig::default(),
            notifier: NotifierConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_true(),
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: default_poll_interval(),
            offsets_seconds: default_offsets(),
            retention_seconds: default_retention(),
            max_attempts: default_max_attempts(),
            scan_margin_seconds: default_scan_margin(),
            catch_up_grace_seconds: default_catch_up_grace(),
            calendar_read_retries: default_read_retries(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            path: default_calendar_path(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig::Log
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ReminderConfig {
    /// Delay between two ticks.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Configured offsets, largest first, without duplicates.
    pub fn offsets(&self) -> Vec<ReminderOffset> {
        let mut offsets: Vec<ReminderOffset> = self
            .offsets_seconds
            .iter()
            .map(|secs| ReminderOffset::from_secs(*secs))
            .collect();
        offsets.sort_by(|a, b| b.cmp(a));
        offsets.dedup();
        offsets
    }

    /// Largest offset plus the scan margin.
    pub fn lookahead(&self) -> chrono::Duration {
        let max_offset = self.offsets().first().map(|o| o.as_secs()).unwrap_or(0);
        seconds(max_offset.saturating_add(self.scan_margin_seconds))
    }

    /// Retention after an appointment's start.
    pub fn retention(&self) -> chrono::Duration {
        seconds(self.retention_seconds)
    }

    /// Catch-up grace before first observation.
    pub fn catch_up_grace(&self) -> chrono::Duration {
        seconds(self.catch_up_grace_seconds)
    }

    /// Validate the reminder settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_seconds == 0 {
            return Err(invalid(
                "reminders.poll_interval_seconds",
                "Polling interval must be at least one second",
            ));
        }

        if self.max_attempts == 0 {
            return Err(invalid(
                "reminders.max_attempts",
                "At least one dispatch attempt is required",
            ));
        }

        for secs in &self.offsets_seconds {
            if *secs == 0 || *secs > MAX_OFFSET_SECS {
                return Err(invalid(
                    "reminders.offsets_seconds",
                    &format!("Offset {} must be between 1 and {} seconds", secs, MAX_OFFSET_SECS),
                ));
            }
        }

        for (key, value) in [
            ("reminders.retention_seconds", self.retention_seconds),
            ("reminders.scan_margin_seconds", self.scan_margin_seconds),
            ("reminders.catch_up_grace_seconds", self.catch_up_grace_seconds),
        ] {
            if value > MAX_OFFSET_SECS {
                return Err(invalid(key, "Value exceeds one year"));
            }
        }

        Ok(())
    }

    /// Settings suitable for tests: no in-tick read retries.
    pub fn for_testing() -> Self {
        Self {
            calendar_read_retries: 0,
            ..Default::default()
        }
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(i64::MAX as u64 / 1000) as i64)
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

impl AppConfig {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;

        serde_json::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Note: port 0 is valid - it means "let the OS assign a port"
        self.reminders.validate()?;

        if let NotifierConfig::Webhook { url, .. } = &self.notifier {
            if url.trim().is_empty() {
                return Err(ConfigError::MissingRequired("notifier.url".to_string()));
            }
        }

        Ok(())
    }

    /// Get the server address string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Create a configuration for testing.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // OS will assign a port
                cors_enabled: true,
            },
            reminders: ReminderConfig::for_testing(),
            ..Default::default()
        }
    }
}
