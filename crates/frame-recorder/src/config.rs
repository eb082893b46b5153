//! Recorder configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory for `<session>_raw.mkv` files
    pub raw_dir: PathBuf,
    /// Wait between connection attempts (ms)
    pub reconnect_backoff_ms: u64,
    /// Forward every n-th frame to the preview channel while not recording
    pub preview_every: u64,
    /// Upper bound on waiting for the capture loop after a stop (ms)
    pub stop_timeout_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("data/raw"),
            reconnect_backoff_ms: 5_000,
            preview_every: 2,
            stop_timeout_ms: 10_000,
        }
    }
}

impl RecorderConfig {
    /// Short timings for local simulation
    pub fn fast(raw_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            reconnect_backoff_ms: 50,
            preview_every: 1,
            stop_timeout_ms: 2_000,
        }
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Raw file for a session
    pub fn raw_path(&self, session_id: &str) -> PathBuf {
        self.raw_dir.join(format!("{}_raw.mkv", session_id))
    }
}
