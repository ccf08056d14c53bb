use shipwatch_backend::config;
use shipwatch_backend::module::pipeline::ShipTracker;
use shipwatch_backend::module::scheduled::{ScheduledTaskConfig, ScheduledTaskManager};
use shipwatch_common::SnapshotStore;

use anyhow::{Context, Result};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::read_config()?;

    // Initialize logging
    let _logging_guard = shipwatch_common::logging::init_logging(
        "logs",
        "shipwatch-backend",
        &config.backend.log_level,
    )?;

    tracing::info!("Shipwatch capture daemon starting...");
    tracing::info!(
        "Tracking MMSI {} ({}), snapshots in {:?}",
        config.ship.mmsi,
        config.ship.nickname,
        config.backend.data_dir
    );

    let tracker = Arc::new(ShipTracker::from_config(&config.ship.mmsi, &config.backend)?);
    let store = SnapshotStore::new(&config.backend.data_dir);

    let task_config = ScheduledTaskConfig::from(&config.backend);
    let mut task_manager = ScheduledTaskManager::new(task_config, tracker, store);
    task_manager.start_all().await?;
    tracing::info!("All scheduled tasks started successfully");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    task_manager.shutdown().await;
    Ok(())
}
