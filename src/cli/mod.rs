//! Helpers for the command-line binary.
//!
//! Path expansion, logging setup, and wiring configured adapters into the
//! engine's ports.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::calendar::{CalendarSource, JsonFileCalendar};
use crate::config::{AppConfig, NotifierConfig};
use crate::error::NotificationError;
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};

/// Default config file location.
pub const DEFAULT_CONFIG_PATH: &str = "~/.calendar-reminder/config.json";

/// Expand tilde (~) in paths.
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins; otherwise `debug` when verbose, else the configured level.
pub fn init_logging(level: &str, verbose: bool) {
    let level = if verbose { "debug" } else { level };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Load the config at `path`, falling back to defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<(AppConfig, bool), crate::error::ConfigError> {
    let expanded = expand_path(path);
    if expanded.exists() {
        Ok((AppConfig::load(&expanded)?, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}

/// Calendar source described by the config.
pub fn build_calendar(config: &AppConfig) -> Arc<dyn CalendarSource> {
    let calendar = JsonFileCalendar::new(expand_path(&config.calendar.path));
    tracing::info!("Reading appointments from {}", calendar.path().display());
    Arc::new(calendar)
}

/// Notifier described by the config.
pub fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>, NotificationError> {
    match &config.notifier {
        NotifierConfig::Log => Ok(Arc::new(LogNotifier::new())),
        NotifierConfig::Webhook {
            url,
            timeout_seconds,
        } => {
            let notifier = WebhookNotifier::new(url, Duration::from_secs(*timeout_seconds))?;
            tracing::info!("Posting reminders to {}", notifier.url());
            Ok(Arc::new(notifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_expand_path() {
        let plain = Path::new("/etc/reminders.json");
        assert_eq!(expand_path(plain), plain.to_path_buf());

        if let Ok(home) = std::env::var("HOME") {
            let expanded = expand_path(Path::new("~/cal.json"));
            assert_eq!(expanded, PathBuf::from(home).join("cal.json"));
        }
    }

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let (config, found) = load_config(&dir.path().join("config.json")).unwrap();
        assert!(!found);
        assert_eq!(config.server.port, 8787);
    }

    #[test]
    fn test_load_existing_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut saved = AppConfig::for_testing();
        saved.server.port = 9100;
        saved.save(&path).unwrap();

        let (config, found) = load_config(&path).unwrap();
        assert!(found);
        assert_eq!(config.server.port, 9100);
    }

    #[tokio::test]
    async fn test_build_adapters() {
        let config = AppConfig::for_testing();
        assert_eq!(build_calendar(&config).name(), "json-file");
        assert_eq!(build_notifier(&config).unwrap().name(), "log");

        let webhook = AppConfig {
            notifier: NotifierConfig::Webhook {
                url: "http://127.0.0.1:9/hook".to_string(),
                timeout_seconds: 2,
            },
            ..AppConfig::for_testing()
        };
        assert_eq!(build_notifier(&webhook).unwrap().name(), "webhook");
    }
}
