//! Recording Session Routes

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use storage::EnabledMetrics;
use tracing::info;

use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartRequest {
    /// Generated when omitted
    pub session_id: Option<String>,
    /// Metrics to draw at composition; all when omitted
    pub metrics: Option<EnabledMetrics>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: String,
    pub raw_path: PathBuf,
    pub delay_ms: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StopRequest {
    /// Delete the recording instead of persisting it
    pub discard: bool,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub session_id: String,
    pub raw_path: PathBuf,
    pub total_frames: u64,
    pub discarded: bool,
    pub end: String,
}

/// Start recording the connected stream
pub async fn start(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartRequest>>,
) -> Result<(StatusCode, Json<StartResponse>), ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let session_id = request
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let delay_ms = state.client.delay_ms().unwrap_or(0);

    if let Some(metrics) = request.metrics {
        state.store.set_enabled_metrics(&session_id, metrics)?;
    }
    let raw_path = state.capture.start_recording(session_id.clone(), delay_ms).await?;
    info!("Session {} recording to {:?}", session_id, raw_path);

    Ok((
        StatusCode::CREATED,
        Json(StartResponse {
            session_id,
            raw_path,
            delay_ms,
        }),
    ))
}

/// Stop the active recording, if any
pub async fn stop(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StopRequest>>,
) -> Result<Json<StopResponse>, ApiError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let summary = state
        .capture
        .stop_recording(request.discard)
        .await?
        .ok_or_else(|| ApiError::NotFound("No recording in progress".to_string()))?;

    Ok(Json(StopResponse {
        session_id: summary.session_id,
        raw_path: summary.raw_path,
        total_frames: summary.total_frames,
        discarded: summary.discarded,
        end: format!("{:?}", summary.end),
    }))
}
