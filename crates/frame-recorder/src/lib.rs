//! Frame Recorder
//!
//! Captures the remote camera stream into a raw container file while
//! recording, for every written frame, the telemetry timestamp current
//! at the moment the frame was pulled.
//!
//! - `SyncMapBuilder` / `SyncMap`: 1-based frame number to telemetry time
//! - `FrameSyncRecorder`: blocking pull/write loop on a dedicated thread
//! - `StreamConnector`: open with retry until cancelled
//! - `CaptureService`: connection supervision and session persistence

pub mod config;
pub mod connector;
pub mod recorder;
pub mod service;
pub mod sync_map;

pub use config::RecorderConfig;
pub use connector::StreamConnector;
pub use recorder::{CaptureEnd, CaptureReport, FrameSyncRecorder, RecorderHandle, RecordingReport};
pub use service::{CaptureHandle, CaptureService, CaptureSummary};
pub use sync_map::{SyncMap, SyncMapBuilder};

use thiserror::Error;

/// Capture error types
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No stream connected")]
    NotConnected,

    #[error("Already recording session {0}")]
    AlreadyRecording(String),

    #[error("Capture loop has exited")]
    LoopExited,

    #[error("Capture service stopped")]
    ServiceStopped,

    #[error("Timed out waiting for the capture loop to stop")]
    StopTimeout,

    #[error("Media error: {0}")]
    Media(#[from] media_io::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
