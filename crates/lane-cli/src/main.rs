//! Lane pipeline - command line entry point
//!
//! Usage: `lane-pipeline [settings.toml]`

use std::path::PathBuf;

use lane_cli::{init_logging, run, Settings, DEFAULT_SETTINGS_PATH};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
    let settings = Settings::load(&path)?;
    init_logging(&settings.log_level)?;

    info!("=== Lane Pipeline v{} ===", env!("CARGO_PKG_VERSION"));
    run(&settings).await?;

    Ok(())
}
