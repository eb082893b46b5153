//! Ride Recorder - Main Entry Point

use api::{init_logging, run_server, AppConfig};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config/ride-recorder.toml"));
    let config = AppConfig::load(Some(&path))?;
    init_logging(&config.server)?;

    info!("=== Ride Recorder v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Configuration from {:?} and RIDECAM__* environment", path);

    run_server(config).await
}
