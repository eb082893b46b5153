//! Storage Layer
//!
//! Persistence contract for ride sessions:
//! - Video session metadata (written when a recording stops, updated once composed)
//! - Frame sequence number to sync timestamp records
//! - Location and inclination telemetry keyed by sync timestamp
//!
//! `TelemetryStore` is the seam; `Repository` is the in-memory implementation.

mod records;
mod repository;

pub use records::{
    AccelerationDirection, EnabledMetrics, FrameSyncRecord, InclinationSnapshot, LocationSnapshot,
    VideoSessionMetadata, GRAVITY,
};
pub use repository::{Repository, TelemetryStore};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found")]
    NotFound,
}
