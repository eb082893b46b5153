//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use composer::ComposeError;
use frame_recorder::CaptureError;
use serde::Serialize;
use storage::StorageError;
use thiserror::Error;
use video_client::ClientError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("Metrics exporter is not installed")]
    MetricsDisabled,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::MetricsDisabled => StatusCode::NOT_FOUND,
            ApiError::Capture(CaptureError::NotConnected) => StatusCode::CONFLICT,
            ApiError::Capture(CaptureError::AlreadyRecording(_)) => StatusCode::CONFLICT,
            ApiError::Capture(CaptureError::ServiceStopped) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Compose(ComposeError::UnknownSession(_)) => StatusCode::NOT_FOUND,
            ApiError::Compose(ComposeError::AlreadyRunning(_)) => StatusCode::CONFLICT,
            ApiError::Client(ClientError::Closed) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(StorageError::NotFound) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
