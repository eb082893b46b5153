//! Remote Video Client
//!
//! Drives one remote action-camera stream through its lifecycle:
//! - Connection state machine with listener callbacks
//! - Two-marker display delay calibration
//! - Bounded asynchronous marker detection (one request in flight)
//! - Calibration timeout forcing a disconnect

pub mod calibration;
pub mod client;
pub mod config;
pub mod detector;
pub mod state;

pub use calibration::{Clock, DelayCalibrator, ManualClock, SystemClock};
pub use client::{ClientCommand, ClientHandle, RemoteVideoClient};
pub use config::CalibrationConfig;
pub use detector::{DetectionQueue, MarkerDetection, MarkerDetector, SignalledDetector};
pub use session_events::{CalibrationResult, ConnectionState};
pub use state::{ConnectionStateMachine, StateListener, Transition};

use thiserror::Error;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Client task is not running")]
    Closed,

    #[error("Detector failed: {0}")]
    Detector(String),
}
