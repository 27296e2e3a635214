//! Error types for calendar-reminder.
//!
//! This module defines all error types used throughout the system.

use thiserror::Error;

/// Main error type for calendar-reminder operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Calendar source errors
    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    /// Notification errors
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP status server errors
    #[error("Server error: {0}")]
    Server(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for calendar-reminder.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading appointments from a calendar source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// Transport or authentication failure talking to the calendar.
    #[error("Calendar unavailable: {0}")]
    Unavailable(String),

    /// The calendar answered but the payload could not be understood.
    #[error("Invalid calendar data: {0}")]
    InvalidData(String),
}

impl CalendarError {
    /// Whether retrying the same read may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CalendarError::Unavailable(_) => true,
            CalendarError::InvalidData(_) => false,
        }
    }
}

/// Errors raised while delivering a reminder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// Transport failure; the same reminder may be retried later.
    #[error("Notification unavailable: {0}")]
    Unavailable(String),

    /// The recipient or content was refused; retrying will not help.
    #[error("Notification rejected: {0}")]
    Rejected(String),
}

impl NotificationError {
    /// Whether retrying the same dispatch may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            NotificationError::Unavailable(_) => true,
            NotificationError::Rejected(_) => false,
        }
    }
}

/// Errors related to Configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid config value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required config: {0}")]
    MissingRequired(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(CalendarError::Unavailable("timeout".into()).is_retryable());
        assert!(!CalendarError::InvalidData("bad json".into()).is_retryable());
        assert!(NotificationError::Unavailable("503".into()).is_retryable());
        assert!(!NotificationError::Rejected("no recipients".into()).is_retryable());
    }

    #[test]
    fn test_error_wrapping() {
        let err: Error = CalendarError::Unavailable("down".into()).into();
        assert_eq!(err.to_string(), "Calendar error: Calendar unavailable: down");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = ConfigError::from(io).into();
        assert!(err.to_string().starts_with("Config error: Config IO error"));
    }
}
