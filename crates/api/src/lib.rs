//! Ride Recorder Control API
//!
//! Wires the capture, calibration and composition services together and
//! exposes them over a small REST API.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use composer::{CompositionEngine, CompositionManager};
use frame_recorder::{CaptureHandle, CaptureService};
use media_io::{FfmpegBackend, MediaBackend, StreamProperties};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use session_events::{ConnectionState, EventBus};
use std::sync::Arc;
use std::time::Instant;
use storage::{Repository, TelemetryStore};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use video_client::{CalibrationConfig, ClientHandle, RemoteVideoClient, SignalledDetector, SystemClock};

pub mod bridge;
pub mod config;
pub mod error;
mod routes;

pub use config::{AppConfig, ServerConfig};
pub use error::ApiError;

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn TelemetryStore>,
    pub events: EventBus,
    pub client: ClientHandle,
    /// Marker source fed by `POST video/marker`
    pub detector: Arc<SignalledDetector>,
    pub capture: CaptureHandle,
    pub compositions: CompositionManager,
    pub calibration: CalibrationConfig,
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: Instant,
}

impl AppState {
    /// Spawn every service on the current runtime
    pub fn start(
        config: &AppConfig,
        backend: Arc<dyn MediaBackend>,
        store: Arc<dyn TelemetryStore>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let events = EventBus::new(config.event_capacity);
        let (preview_tx, preview_rx) = mpsc::channel(config.calibration.frame_buffer.max(1));

        let detector = Arc::new(SignalledDetector::new());
        let client = RemoteVideoClient::new(
            config.calibration.clone(),
            detector.clone(),
            Arc::new(SystemClock),
            events.clone(),
        )
        .spawn(preview_rx);

        let engine = CompositionEngine::new(backend.clone(), store.clone(), events.clone(), config.composer.clone());
        let compositions = CompositionManager::new(engine);
        bridge::spawn_bridge(&events, client.clone(), compositions.clone(), config.auto_compose);

        let capture = CaptureService::spawn(
            backend,
            store.clone(),
            events.clone(),
            config.camera.url(),
            config.recorder.clone(),
            Some(preview_tx),
        );

        Self {
            store,
            events,
            client,
            detector,
            capture,
            compositions,
            calibration: config.calibration.clone(),
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }

    /// Stop capture (persisting an active recording) and cancel compositions
    pub async fn shutdown(&self) {
        self.capture.shutdown().await;
        self.compositions.cancel_all();
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connection_state: ConnectionState,
    pub stream: Option<StreamProperties>,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/metrics", get(routes::metrics))
        .route("/api/v1/video/state", get(routes::video::get_state))
        .route("/api/v1/video/connect", post(routes::video::connect))
        .route("/api/v1/video/disconnect", post(routes::video::disconnect))
        .route("/api/v1/video/consume", post(routes::video::consume))
        .route("/api/v1/video/sync/start", post(routes::video::start_sync))
        .route("/api/v1/video/sync/delay", post(routes::video::use_stored_delay))
        .route("/api/v1/video/marker", post(routes::video::marker))
        .route("/api/v1/video/:session", get(routes::video::get_session))
        .route("/api/v1/video/:session/compose", post(routes::video::compose))
        .route("/api/v1/video/:session/compose/cancel", post(routes::video::cancel_compose))
        .route("/api/v1/session/start", post(routes::session::start))
        .route("/api/v1/session/stop", post(routes::session::stop))
        .route("/api/v1/telemetry/tick", post(routes::telemetry::tick))
        .route("/api/v1/telemetry/location", post(routes::telemetry::location))
        .route("/api/v1/telemetry/inclination", post(routes::telemetry::inclination))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        connection_state: state.client.state(),
        stream: state.capture.stream(),
    })
}

/// Initialize logging
pub fn init_logging(server: &ServerConfig) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = server.log_level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);

    if server.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

/// Install the global Prometheus recorder
pub fn install_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    }
}

/// Run the server until Ctrl-C
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let metrics = if config.server.metrics { install_metrics() } else { None };
    let backend: Arc<dyn MediaBackend> = Arc::new(FfmpegBackend::new(config.ffmpeg.clone()));
    let store: Arc<dyn TelemetryStore> = Arc::new(Repository::new());

    info!("Camera stream at {}", config.camera.url());
    let state = Arc::new(AppState::start(&config, backend, store, metrics));
    let app = create_router(state.clone());

    info!("Starting API server on {}", config.server.bind);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await?;

    state.shutdown().await;
    info!("Ride recorder stopped");
    Ok(())
}
