//! HTTP status surface.
//!
//! Read-only endpoints over a running [`ReminderService`]: liveness, the
//! engine's reminder records, and event counters.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::automation::{EngineStatus, ReminderService};
use crate::error::{Error, Result};

const ENDPOINTS: [&str; 4] = ["/", "/health", "/reminders", "/stats"];

/// Shared handler state.
pub struct ServerState {
    pub service: Arc<ReminderService>,
    version: String,
    started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(service: Arc<ReminderService>) -> Self {
        Self {
            service,
            version: crate::VERSION.to_string(),
            started_at: Utc::now(),
        }
    }
}

/// Response for `GET /`.
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub service: String,
    pub version: String,
    pub status: String,
    pub endpoints: Vec<String>,
}

/// Response for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Response for `GET /stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Server version
    pub version: String,
    /// When the server came up
    pub started_at: DateTime<Utc>,
    /// Whether the engine is running
    pub running: bool,
    /// Ticks run by the current engine
    pub ticks: u64,
    /// Total events published
    pub events_published: u64,
    /// Events by type
    pub events_by_type: HashMap<String, u64>,
    /// Number of event subscribers
    pub subscriber_count: usize,
}

/// Build the router.
pub fn router(state: Arc<ServerState>, cors_enabled: bool) -> Router {
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/reminders", get(reminders_handler))
        .route("/stats", get(stats_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors_enabled {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    }
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(
    addr: &str,
    state: Arc<ServerState>,
    cors_enabled: bool,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Server(format!("Invalid address '{}': {}", addr, e)))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    tracing::info!("Status server listening on {}", local);

    axum::serve(listener, router(state, cors_enabled))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Server(e.to_string()))
}

async fn index_handler() -> Json<IndexResponse> {
    Json(IndexResponse {
        service: crate::NAME.to_string(),
        version: crate::VERSION.to_string(),
        status: "ok".to_string(),
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
    })
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    })
}

async fn reminders_handler(State(state): State<Arc<ServerState>>) -> Json<EngineStatus> {
    Json(state.service.status().await)
}

async fn stats_handler(State(state): State<Arc<ServerState>>) -> Json<StatsResponse> {
    let status = state.service.status().await;
    let event_stats = state.service.events().stats().await;

    Json(StatsResponse {
        version: state.version.clone(),
        started_at: state.started_at,
        running: status.running,
        ticks: status.ticks,
        events_published: event_stats.events_published,
        events_by_type: event_stats.events_by_type,
        subscriber_count: event_stats.subscriber_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::ManualClock;
    use crate::calendar::InMemoryCalendar;
    use crate::config::ReminderConfig;
    use crate::notify::RecordingNotifier;
    use crate::types::Appointment;
    use chrono::TimeZone;

    fn state() -> (Arc<ServerState>, InMemoryCalendar) {
        let calendar = InMemoryCalendar::new();
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap();
        let service = ReminderService::new(
            ReminderConfig::for_testing(),
            Arc::new(calendar.clone()),
            Arc::new(RecordingNotifier::new()),
        )
        .with_clock(Arc::new(ManualClock::new(now)));
        (Arc::new(ServerState::new(Arc::new(service))), calendar)
    }

    #[tokio::test]
    async fn test_index_lists_endpoints() {
        let Json(body) = index_handler().await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.service, crate::NAME);
        assert!(body.endpoints.contains(&"/reminders".to_string()));
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health_handler().await;
        assert_eq!(body.status, "healthy");
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_reminders_reflect_engine() {
        let (state, calendar) = state();
        let start = Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0).unwrap();
        calendar
            .upsert(Appointment::new("evt", "Review", start).with_recipients(vec!["a@b.c".into()]))
            .await;

        let Json(idle) = reminders_handler(State(state.clone())).await;
        assert!(!idle.running);
        assert!(idle.reminders.is_empty());

        state.service.start_reminder_automation().await.unwrap();
        let Json(running) = reminders_handler(State(state.clone())).await;
        assert!(running.running);
        assert_eq!(running.ticks, 1);
        assert!(!running.reminders.is_empty());

        let json = serde_json::to_value(&running).unwrap();
        assert!(json["last_tick"]["window"]["start"].is_string());

        state.service.cleanup().await;
    }

    #[tokio::test]
    async fn test_stats_count_events() {
        let (state, _calendar) = state();
        state.service.start_reminder_automation().await.unwrap();
        state.service.cleanup().await;

        let Json(stats) = stats_handler(State(state.clone())).await;
        assert!(!stats.running);
        assert_eq!(stats.version, crate::VERSION);
        assert_eq!(stats.events_by_type.get("automation_started"), Some(&1));
        assert_eq!(stats.events_by_type.get("automation_stopped"), Some(&1));
        assert!(stats.events_published >= 3);
    }

    #[tokio::test]
    async fn test_serve_rejects_bad_address() {
        let (state, _calendar) = state();
        let result = serve("not-an-address", state, true, async {}).await;
        assert!(matches!(result, Err(Error::Server(_))));
    }

    #[tokio::test]
    async fn test_serve_reports_bind_failure_as_io() {
        let (state, _calendar) = state();
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let result = serve(&addr, state, true, async {}).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
