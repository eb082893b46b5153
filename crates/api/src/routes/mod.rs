//! Route handlers

pub mod session;
pub mod telemetry;
pub mod video;

use axum::extract::State;
use std::sync::Arc;

use crate::{ApiError, AppState};

/// Prometheus text exposition
pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .ok_or(ApiError::MetricsDisabled)
}
