//! HTTP server hosting focus sessions for a browser or mobile front end.
//!
//! The front end runs the face-mesh extractor and posts landmark frames;
//! each session owns its own engine and recorder, and ending a session
//! returns its report. Sessions are timed by the client's frame
//! timestamps, and sessions that stop sending requests are evicted.
//!
//! # Architecture
//!
//! ```text
//! Front end ──→ POST /sessions/:id/frames ──→ FocusEngine ──→ FocusSample
//!                                                  ↓
//!                                           SessionRecorder ──→ SessionReport
//! ```

use crate::collector::types::FrameEvent;
use crate::config::{Config, EngineConfig};
use crate::core::{FocusEngine, FocusSample, ReportBuilder, SessionRecorder, SessionReport};
use crate::transparency::{create_shared_log, Counter, SharedTransparencyLog};
use axum::{
    extract::{Path, State},
    http::{request::Parts, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use uuid::Uuid;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Engine tunables for new sessions
    pub engine: EngineConfig,
    /// Recording interval for session details
    pub sample_interval: Duration,
    /// Timezone for report local times
    pub timezone: chrono_tz::Tz,
    /// Sessions that receive no frame for this long are dropped
    pub session_idle_timeout: Duration,
}

impl ServerConfig {
    /// Create a server configuration with default engine settings
    pub fn new(port: u16) -> Self {
        Self {
            port,
            engine: EngineConfig::default(),
            sample_interval: Duration::from_secs(1),
            timezone: chrono_tz::Tz::UTC,
            session_idle_timeout: Duration::from_secs(600),
        }
    }

    /// Derive a server configuration from the agent configuration
    pub fn from_config(config: &Config, port: u16) -> anyhow::Result<Self> {
        Ok(Self {
            engine: config.engine.clone(),
            sample_interval: config.sample_interval,
            timezone: config.tz()?,
            ..Self::new(port)
        })
    }

    /// How often idle sessions are looked for.
    fn sweep_interval(&self) -> Duration {
        (self.session_idle_timeout / 2).clamp(Duration::from_millis(10), Duration::from_secs(30))
    }
}

struct Session {
    id: String,
    engine: FocusEngine,
    /// Started at the first frame so the client's clock sets the timeline
    recorder: Option<SessionRecorder>,
    created_at: DateTime<Utc>,
    last_frame_at: Option<DateTime<Utc>>,
    last_seen: Instant,
}

impl Session {
    fn new(id: String, engine: EngineConfig) -> Self {
        Self {
            id,
            engine: FocusEngine::new(engine),
            recorder: None,
            created_at: Utc::now(),
            last_frame_at: None,
            last_seen: Instant::now(),
        }
    }

    fn is_idle(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() >= timeout
    }

    fn report(&self, builder: &ReportBuilder, interval: Duration) -> SessionReport {
        match (&self.recorder, self.last_frame_at) {
            (Some(recorder), Some(last_frame_at)) => builder.build(recorder, last_frame_at),
            _ => builder.build(
                &SessionRecorder::new(self.id.clone(), self.created_at, interval),
                Utc::now(),
            ),
        }
    }
}

type SharedSession = Arc<Mutex<Session>>;

/// Shared server state
pub struct ServerState {
    sessions: RwLock<HashMap<String, SharedSession>>,
    config: ServerConfig,
    reports: ReportBuilder,
    log: SharedTransparencyLog,
}

impl ServerState {
    /// Create new server state
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config: config.clone(),
            reports: ReportBuilder::new().with_timezone(config.timezone),
            log: create_shared_log(),
        }
    }

    pub fn log(&self) -> &SharedTransparencyLog {
        &self.log
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn session(&self, id: &str) -> Result<SharedSession, ApiError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| session_not_found(id))
    }

    /// Drop sessions idle for longer than the configured timeout.
    ///
    /// Sessions busy scoring a frame are never idle and are skipped.
    pub async fn evict_idle(&self) -> usize {
        let timeout = self.config.session_idle_timeout;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| match session.try_lock() {
            Ok(session) if session.is_idle(timeout) => {
                tracing::info!(session_id = %id, "Evicting idle session");
                false
            }
            _ => true,
        });

        let evicted = before - sessions.len();
        self.log.add(Counter::SessionsEvicted, evicted as u64);
        evicted
    }
}

/// Response of POST /sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_sessions: usize,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn session_not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Unknown session: {id}"),
            code: "SESSION_NOT_FOUND".to_string(),
        }),
    )
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_sessions: state.active_sessions().await,
    })
}

/// POST /sessions
async fn create_session(
    State(state): State<Arc<ServerState>>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = Uuid::new_v4().to_string();
    let session = Session::new(session_id.clone(), state.config.engine.clone());

    state
        .sessions
        .write()
        .await
        .insert(session_id.clone(), Arc::new(Mutex::new(session)));
    tracing::info!(%session_id, "Session started");

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id }),
    )
}

/// POST /sessions/:id/frames
///
/// Scores one landmark frame; `landmarks: null` means no face was found.
async fn push_frame(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(event): Json<FrameEvent>,
) -> Result<Json<FocusSample>, ApiError> {
    let session = state.session(&id).await?;
    let mut guard = session.lock().await;
    let session = &mut *guard;
    session.last_seen = Instant::now();

    let frame = event.frame();
    let rejected_before = session.engine.rejected_frames();
    let sample = session.engine.process(frame.as_ref());

    state.log.record_frame(frame.is_some());
    state.log.add(
        Counter::FramesRejected,
        session.engine.rejected_frames() - rejected_before,
    );

    let recorder = session.recorder.get_or_insert_with(|| {
        SessionRecorder::new(id.clone(), event.timestamp, state.config.sample_interval)
    });
    if recorder.record(event.timestamp, &sample) {
        state.log.increment(Counter::SamplesRecorded);
    }
    session.last_frame_at = Some(event.timestamp);

    Ok(Json(sample))
}

/// POST /sessions/:id/end
async fn end_session(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionReport>, ApiError> {
    let session = state
        .sessions
        .write()
        .await
        .remove(&id)
        .ok_or_else(|| session_not_found(&id))?;

    let report = session
        .lock()
        .await
        .report(&state.reports, state.config.sample_interval);
    state.log.increment(Counter::ReportsExported);
    tracing::info!(
        session_id = %id,
        average_score = report.summary.average_score,
        "Session ended"
    );

    Ok(Json(report))
}

fn is_local_origin(origin: &HeaderValue, _parts: &Parts) -> bool {
    origin.to_str().is_ok_and(|origin| {
        ["http://localhost", "http://127.0.0.1"]
            .iter()
            .any(|host| origin == *host || origin.starts_with(&format!("{host}:")))
    })
}

/// Build the router without binding a socket
pub fn router(config: &ServerConfig) -> Router {
    app(Arc::new(ServerState::new(config)))
}

fn app(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .route("/sessions/:id/frames", post(push_frame))
        .route("/sessions/:id/end", post(end_session))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(is_local_origin))
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Periodically evict idle sessions until the server state is dropped.
fn spawn_idle_sweeper(state: Weak<ServerState>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(state) = state.upgrade() else {
                break;
            };
            let evicted = state.evict_idle().await;
            if evicted > 0 {
                tracing::debug!(evicted, "Idle sweep finished");
            }
        }
    });
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config));
    spawn_idle_sweeper(Arc::downgrade(&state), config.sweep_interval());
    let app = app(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Focus sensor server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(state: &ServerState, id: &str) -> SharedSession {
        let session = Arc::new(Mutex::new(Session::new(
            id.to_string(),
            EngineConfig::default(),
        )));
        state
            .sessions
            .try_write()
            .unwrap()
            .insert(id.to_string(), session.clone());
        session
    }

    #[tokio::test]
    async fn test_evict_idle_skips_busy_sessions() {
        let config = ServerConfig {
            session_idle_timeout: Duration::ZERO,
            ..ServerConfig::new(0)
        };
        let state = ServerState::new(&config);
        insert(&state, "idle");
        let busy = insert(&state, "busy");

        let guard = busy.lock().await;
        assert_eq!(state.evict_idle().await, 1);
        drop(guard);

        assert_eq!(state.active_sessions().await, 1);
        assert!(state.session("busy").await.is_ok());
        assert_eq!(state.log().get(Counter::SessionsEvicted), 1);
    }

    #[tokio::test]
    async fn test_recent_sessions_are_kept() {
        let state = ServerState::new(&ServerConfig::new(0));
        insert(&state, "fresh");
        assert_eq!(state.evict_idle().await, 0);
        assert_eq!(state.active_sessions().await, 1);
    }

    #[test]
    fn test_sweep_interval_bounds() {
        let mut config = ServerConfig::new(0);
        assert_eq!(config.sweep_interval(), Duration::from_secs(30));
        config.session_idle_timeout = Duration::from_millis(300);
        assert_eq!(config.sweep_interval(), Duration::from_millis(150));
        config.session_idle_timeout = Duration::ZERO;
        assert_eq!(config.sweep_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_report_without_frames_uses_creation_time() {
        let session = Session::new("empty".to_string(), EngineConfig::default());
        let report = session.report(&ReportBuilder::new(), Duration::from_secs(1));
        assert_eq!(report.summary.session_id, "empty");
        assert_eq!(report.summary.started_at, session.created_at);
        assert!(report.details.is_empty());
    }
}
