mod app;
mod core;

use crate::app::config::KiteConfig;
use crate::app::{observability, server, startup};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| "kite.yaml".into());

    let config = KiteConfig::load(&config_path)?;
    let _log_guards = observability::init(&config.logging)?;
    info!(config = %config_path.display(), "configuration loaded");

    let ctx = Arc::new(startup::build(config).await?);
    server::run(ctx).await
}
