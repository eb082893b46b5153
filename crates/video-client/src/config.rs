//! Calibration configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay calibration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Text shown by the camera overlay when calibration starts
    pub control_text: String,

    /// Text the camera shows once its own delay readout is visible
    pub delay_text: String,

    /// Give up and disconnect if no marker shows up within this time (ms).
    /// `None` waits forever.
    pub marker_timeout_ms: Option<u64>,

    /// How often the timeout is checked (ms)
    pub timeout_check_interval_ms: u64,

    /// Preview frames buffered for detection before new ones are dropped
    pub frame_buffer: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            control_text: "SYNC-START".to_string(),
            delay_text: "SYNC-DELAY".to_string(),
            marker_timeout_ms: Some(30_000),
            timeout_check_interval_ms: 250,
            frame_buffer: 4,
        }
    }
}

impl CalibrationConfig {
    /// Wait for markers indefinitely
    pub fn without_timeout() -> Self {
        Self {
            marker_timeout_ms: None,
            ..Default::default()
        }
    }

    pub fn timeout_check_interval(&self) -> Duration {
        Duration::from_millis(self.timeout_check_interval_ms.max(1))
    }
}
