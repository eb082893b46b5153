//! Telemetry Routes

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;
use storage::{InclinationSnapshot, LocationSnapshot};

use crate::{ApiError, AppState};

/// Session clock tick
#[derive(Debug, Deserialize)]
pub struct TickRequest {
    pub timestamp_ms: i64,
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub session_id: String,
    #[serde(flatten)]
    pub sample: LocationSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct InclinationRequest {
    pub session_id: String,
    #[serde(flatten)]
    pub sample: InclinationSnapshot,
}

/// Frames captured from now on map to this timestamp
pub async fn tick(State(state): State<Arc<AppState>>, Json(request): Json<TickRequest>) -> StatusCode {
    state.capture.tick(request.timestamp_ms);
    StatusCode::NO_CONTENT
}

pub async fn location(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LocationRequest>,
) -> Result<StatusCode, ApiError> {
    state.store.insert_location(&request.session_id, request.sample)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn inclination(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InclinationRequest>,
) -> Result<StatusCode, ApiError> {
    state.store.insert_inclination(&request.session_id, request.sample)?;
    Ok(StatusCode::NO_CONTENT)
}
