//! Composer configuration

use chrono::{DateTime, Local};
use overlay::OverlayStyle;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Directory for composed videos
    pub output_dir: PathBuf,
    /// Activity name used as the output file prefix
    pub activity: String,
    /// Minimum wall-clock time between progress events (ms)
    pub progress_interval_ms: u64,
    pub style: OverlayStyle,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/videos"),
            activity: "ride".to_string(),
            progress_interval_ms: 5_000,
            style: OverlayStyle::default(),
        }
    }
}

impl ComposerConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// `<output_dir>/<activity>.<yyyyMMdd_HHmmss>.<session>.mkv`
    ///
    /// The session id keeps compositions finishing in the same second apart.
    pub fn output_path(&self, session_id: &str, at: DateTime<Local>) -> PathBuf {
        self.output_dir.join(format!(
            "{}.{}.{}.mkv",
            self.activity,
            at.format("%Y%m%d_%H%M%S"),
            session_id
        ))
    }
}
