//! Application configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `RIDECAM__SECTION__KEY` environment variables.

use composer::ComposerConfig;
use frame_recorder::RecorderConfig;
use media_io::{FfmpegConfig, StreamEndpoint};
use serde::{Deserialize, Serialize};
use std::path::Path;
use video_client::CalibrationConfig;

/// HTTP server and logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// trace, debug, info, warn or error
    pub log_level: String,
    /// Emit logs as JSON lines
    pub json_logs: bool,
    /// Install the Prometheus recorder and serve `/metrics`
    pub metrics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            metrics: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub camera: StreamEndpoint,
    pub ffmpeg: FfmpegConfig,
    pub recorder: RecorderConfig,
    pub calibration: CalibrationConfig,
    pub composer: ComposerConfig,
    /// Compose every finished recording without waiting for a request
    pub auto_compose: bool,
    /// Events buffered per slow bus subscriber
    pub event_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            camera: StreamEndpoint::default(),
            ffmpeg: FfmpegConfig::default(),
            recorder: RecorderConfig::default(),
            calibration: CalibrationConfig::default(),
            composer: ComposerConfig::default(),
            auto_compose: true,
            event_capacity: 256,
        }
    }
}

impl AppConfig {
    /// Load from `path` (if it exists) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder
            .add_source(
                config::Environment::with_prefix("RIDECAM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert!(config.auto_compose);
        assert_eq!(config.recorder.reconnect_backoff_ms, 5_000);
        assert_eq!(config.calibration.marker_timeout_ms, Some(30_000));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
auto_compose = false

[camera]
host = "10.0.0.5"
port = 8554

[composer]
activity = "enduro"
progress_interval_ms = 1000
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert!(!config.auto_compose);
        assert_eq!(config.camera.url(), "rtsp://10.0.0.5:8554/live");
        assert_eq!(config.composer.activity, "enduro");
        assert_eq!(config.composer.progress_interval_ms, 1_000);
        assert_eq!(config.server.log_level, "info");
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let config = AppConfig::load(Some(Path::new("/nonexistent/ride-recorder.toml"))).unwrap();
        assert_eq!(config.composer.activity, "ride");
    }
}
