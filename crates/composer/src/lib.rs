//! Video Composer
//!
//! Turns a finished raw recording into the final ride video:
//! - Replays the raw file frame by frame
//! - Resolves telemetry per frame through the frame sync records,
//!   fetching only when the sync timestamp changes
//! - Draws the enabled overlays and re-encodes with the original timing
//! - Reports throttled progress and a final Finished/Failed state

pub mod config;
pub mod engine;
pub mod manager;
pub mod progress;
pub mod resolver;

pub use config::ComposerConfig;
pub use engine::{CompositionEngine, CompositionOutcome};
pub use manager::CompositionManager;
pub use progress::ProgressThrottle;
pub use resolver::TelemetryResolver;

use thiserror::Error;

/// Composition error types
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("No video metadata for session {0}")]
    UnknownSession(String),

    #[error("Composition of session {0} is already running")]
    AlreadyRunning(String),

    #[error("Composition cancelled")]
    Cancelled,

    #[error("Composition task failed: {0}")]
    TaskFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] media_io::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Overlay error: {0}")]
    Overlay(#[from] overlay::OverlayError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
