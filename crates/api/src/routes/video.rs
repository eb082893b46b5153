//! Remote Video Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use media_io::StreamProperties;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::VideoSessionMetadata;
use tracing::debug;
use video_client::{ClientCommand, ConnectionState};

use crate::bridge::spawn_composition;
use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct VideoStateResponse {
    pub state: ConnectionState,
    pub delay_ms: Option<i64>,
    pub stream: Option<StreamProperties>,
    pub tick_ms: i64,
}

#[derive(Debug, Deserialize)]
pub struct StoredDelayRequest {
    pub delay_ms: i64,
}

/// Which calibration marker the external detector saw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    Start,
    Delay,
}

#[derive(Debug, Deserialize)]
pub struct MarkerRequest {
    pub marker: Marker,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct SessionVideoResponse {
    #[serde(flatten)]
    pub metadata: VideoSessionMetadata,
    pub composing: bool,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<VideoStateResponse> {
    Json(VideoStateResponse {
        state: state.client.state(),
        delay_ms: state.client.delay_ms(),
        stream: state.capture.stream(),
        tick_ms: state.capture.last_tick(),
    })
}

async fn send(state: &AppState, command: ClientCommand) -> Result<StatusCode, ApiError> {
    debug!("Client command {:?}", command);
    state.client.send(command).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn connect(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    send(&state, ClientCommand::Connect).await
}

pub async fn disconnect(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    send(&state, ClientCommand::Disconnect).await
}

pub async fn consume(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    send(&state, ClientCommand::ConsumeVideo).await
}

pub async fn start_sync(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    send(&state, ClientCommand::StartSynchronization).await
}

pub async fn use_stored_delay(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StoredDelayRequest>,
) -> Result<StatusCode, ApiError> {
    send(&state, ClientCommand::UseStoredDelay(request.delay_ms)).await
}

/// Report a calibration marker appearing on, or leaving, the camera overlay
pub async fn marker(State(state): State<Arc<AppState>>, Json(request): Json<MarkerRequest>) -> StatusCode {
    let pattern = match request.marker {
        Marker::Start => &state.calibration.control_text,
        Marker::Delay => &state.calibration.delay_text,
    };
    if request.visible {
        state.detector.show(pattern);
    } else {
        state.detector.hide(pattern);
    }
    StatusCode::NO_CONTENT
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionVideoResponse>, ApiError> {
    let metadata = state
        .store
        .get_video_metadata(&session_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Unknown session {}", session_id)))?;
    Ok(Json(SessionVideoResponse {
        composing: state.compositions.is_running(&session_id),
        metadata,
    }))
}

/// Start composing a recorded session
pub async fn compose(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.get_video_metadata(&session_id)?.is_none() {
        return Err(ApiError::NotFound(format!("Unknown session {}", session_id)));
    }
    spawn_composition(&state.compositions, &session_id)?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn cancel_compose(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Json<CancelResponse> {
    Json(CancelResponse {
        cancelled: state.compositions.cancel(&session_id),
    })
}
