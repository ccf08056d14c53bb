use shipwatch_backend::module::pipeline::ShipTracker;
use shipwatch_common::SnapshotStore;
use shipwatch_frontend::config::{self, SnapshotSource};
use shipwatch_frontend::frontend::discord::{Handler, intents};
use shipwatch_frontend::provider::SnapshotProvider;

use anyhow::{Context, Result};
use serenity::Client;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::read_config()?;
    let _logging_guard = shipwatch_common::logging::init_logging(
        "logs",
        "shipwatch-frontend",
        &config.discord.log_level,
    )?;

    tracing::info!("Shipwatch Discord bot starting...");

    let store = SnapshotStore::new(&config.backend.data_dir);
    let provider = match config.discord.source {
        SnapshotSource::Live => {
            let tracker = ShipTracker::from_config(&config.ship.mmsi, &config.backend)?;
            tracing::info!("Live mode, strategies: {}", tracker.strategy_names().join(", "));
            SnapshotProvider::live(Arc::new(tracker), store, config.discord.max_age_hours)
        }
        SnapshotSource::Cache => {
            tracing::info!("Cache mode, reading snapshots from {:?}", store.dir());
            SnapshotProvider::cache(store, &config.ship.mmsi, config.discord.max_age_hours)
        }
    };

    let handler = Handler::new(
        Arc::new(provider),
        &config.ship.nickname,
        &config.discord.prefix,
        config.discord.channel_id,
        Duration::from_secs(config.discord.update_interval_hours * 3600),
        config.discord.post_on_startup,
    );

    let mut client = Client::builder(&config.discord.token, intents())
        .event_handler(handler)
        .await
        .context("Failed to create Discord client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await.context("Discord client error")?;
    Ok(())
}
