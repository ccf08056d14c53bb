///! Scheduled task manager for the capture daemon
///!
///! - Snapshot capture (every `capture_interval_hours`, aligned)
///! - Snapshot and screenshot cleanup (daily at 03:00 UTC)

use anyhow::Result;
use chrono::{DateTime, NaiveTime, Utc};
use shipwatch_common::SnapshotStore;
use shipwatch_common::store::cleanup_old_files;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::pipeline::ShipTracker;
use crate::config::BackendConfig;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(60);
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(300);
const CLEANUP_HOUR: u32 = 3;

/// Configuration for scheduled tasks
#[derive(Debug, Clone)]
pub struct ScheduledTaskConfig {
    pub capture_interval: Duration,

    /// Capture at startup unless a fresh snapshot is already cached
    pub perform_initial_capture: bool,

    pub keep_snapshots: usize,

    pub retention_days: i64,

    pub screenshot_dir: PathBuf,
}

impl Default for ScheduledTaskConfig {
    fn default() -> Self {
        Self::from(&BackendConfig::default())
    }
}

impl From<&BackendConfig> for ScheduledTaskConfig {
    fn from(config: &BackendConfig) -> Self {
        Self {
            capture_interval: Duration::from_secs(config.capture_interval_hours.max(1) * 3600),
            perform_initial_capture: config.perform_initial_capture,
            keep_snapshots: config.keep_snapshots,
            retention_days: config.retention_days,
            screenshot_dir: config.screenshot_dir.clone(),
        }
    }
}

/// Next multiple of `interval` since the Unix epoch, strictly after `now`
pub fn next_aligned(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let secs = interval.as_secs().max(1) as i64;
    let next = (now.timestamp().div_euclid(secs) + 1) * secs;
    DateTime::from_timestamp(next, 0).unwrap_or(now + chrono::Duration::seconds(secs))
}

/// Next `hour:00:00` UTC strictly after `now`
pub fn next_daily_run(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let target = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(target).and_utc();
    if now < today {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// When the next capture is due given the last one; `now` if overdue.
pub fn next_run_after(
    now: DateTime<Utc>,
    last: Option<DateTime<Utc>>,
    interval: Duration,
) -> DateTime<Utc> {
    let interval = chrono::Duration::from_std(interval).unwrap_or(chrono::Duration::hours(1));
    match last {
        Some(last) if last + interval > now => last + interval,
        _ => now,
    }
}

fn sleep_until(now: DateTime<Utc>, next: DateTime<Utc>, fallback: Duration) -> Duration {
    (next - now).to_std().unwrap_or(fallback)
}

/// Scheduled task manager
pub struct ScheduledTaskManager {
    config: ScheduledTaskConfig,
    tracker: Arc<ShipTracker>,
    store: SnapshotStore,
    task_handles: Vec<JoinHandle<()>>,
}

impl ScheduledTaskManager {
    pub fn new(config: ScheduledTaskConfig, tracker: Arc<ShipTracker>, store: SnapshotStore) -> Self {
        Self {
            config,
            tracker,
            store,
            task_handles: Vec::new(),
        }
    }

    /// Start all scheduled tasks
    pub async fn start_all(&mut self) -> Result<()> {
        tracing::info!("Starting scheduled task manager...");

        self.store.ensure_dir().await?;

        let capture_handle = self.start_capture_task();
        self.task_handles.push(capture_handle);

        let cleanup_handle = self.start_cleanup_task();
        self.task_handles.push(cleanup_handle);

        tracing::info!(
            "Started {} scheduled tasks (capture every {:.1} h, cleanup daily at {:02}:00 UTC)",
            self.task_handles.len(),
            self.config.capture_interval.as_secs_f64() / 3600.0,
            CLEANUP_HOUR
        );

        Ok(())
    }

    fn start_capture_task(&self) -> JoinHandle<()> {
        let tracker = self.tracker.clone();
        let store = self.store.clone();
        let interval = self.config.capture_interval;
        let perform_initial = self.config.perform_initial_capture;

        tracing::info!(
            "Scheduling capture task for MMSI {} (strategies: {})",
            tracker.mmsi(),
            tracker.strategy_names().join(", ")
        );

        tokio::spawn(async move {
            if perform_initial {
                let last = match store.latest_for(tracker.mmsi()).await {
                    Ok(snapshot) => snapshot.map(|s| s.fetched_at),
                    Err(e) => {
                        tracing::warn!("Could not read snapshot cache: {:#}", e);
                        None
                    }
                };
                let now = Utc::now();
                if next_run_after(now, last, interval) <= now {
                    tracing::info!("Performing initial capture...");
                    Self::capture_with_retries(&tracker, &store).await;
                } else {
                    tracing::info!("Cached snapshot is fresh, skipping initial capture");
                }
            }

            Self::capture_loop(tracker, store, interval).await;
        })
    }

    async fn capture_loop(tracker: Arc<ShipTracker>, store: SnapshotStore, interval: Duration) {
        loop {
            let now = Utc::now();
            let next_trigger = next_aligned(now, interval);
            let sleep_duration = sleep_until(now, next_trigger, Duration::from_secs(60));

            tracing::info!(
                "Next capture at: {} (in {:.1} hours)",
                next_trigger.format("%Y-%m-%d %H:%M:%S UTC"),
                sleep_duration.as_secs_f64() / 3600.0
            );

            tokio::time::sleep(sleep_duration).await;
            Self::capture_with_retries(&tracker, &store).await;
        }
    }

    async fn capture_with_retries(tracker: &ShipTracker, store: &SnapshotStore) {
        for attempt in 1..=MAX_RETRIES {
            match Self::run_capture(tracker, store).await {
                Ok(()) => {
                    tracing::info!("Capture completed successfully");
                    break;
                }
                Err(e) => {
                    if attempt < MAX_RETRIES {
                        tracing::warn!(
                            "Capture failed (attempt {}/{}): {:#}. Retrying in {}s...",
                            attempt,
                            MAX_RETRIES,
                            e,
                            RETRY_DELAY.as_secs()
                        );
                        tokio::time::sleep(RETRY_DELAY).await;
                    } else {
                        tracing::error!("Capture failed after {} attempts: {:#}", MAX_RETRIES, e);
                    }
                }
            }
        }
    }

    /// Run a single capture
    pub async fn run_capture(tracker: &ShipTracker, store: &SnapshotStore) -> Result<()> {
        match tokio::time::timeout(CAPTURE_TIMEOUT, tracker.locate_and_store(store)).await {
            Ok(result) => result.map(|snapshot| {
                tracing::info!(
                    "Captured {} at {} (source: {})",
                    snapshot.name,
                    snapshot.position,
                    snapshot.source
                );
            }),
            Err(_) => {
                anyhow::bail!("Capture timed out after {} seconds", CAPTURE_TIMEOUT.as_secs());
            }
        }
    }

    fn start_cleanup_task(&self) -> JoinHandle<()> {
        let store = self.store.clone();
        let config = self.config.clone();

        tracing::info!(
            "Scheduling cleanup task (keep: {} snapshots, retention: {} days)",
            config.keep_snapshots,
            config.retention_days
        );

        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next_trigger = next_daily_run(now, CLEANUP_HOUR);
                let sleep_duration = sleep_until(now, next_trigger, Duration::from_secs(3600));

                tracing::info!(
                    "Next cleanup at: {} (in {:.1} hours)",
                    next_trigger.format("%Y-%m-%d %H:%M:%S UTC"),
                    sleep_duration.as_secs_f64() / 3600.0
                );

                tokio::time::sleep(sleep_duration).await;

                match Self::run_cleanup(&store, &config).await {
                    Ok(0) => tracing::debug!("Cleanup completed: nothing to delete"),
                    Ok(deleted) => tracing::info!("Cleanup completed: deleted {} files", deleted),
                    Err(e) => tracing::error!("Cleanup failed: {:#}", e),
                }
            }
        })
    }

    /// Prune snapshots to the configured count, then drop snapshots and
    /// screenshots past retention. Returns the number of files removed.
    pub async fn run_cleanup(store: &SnapshotStore, config: &ScheduledTaskConfig) -> Result<usize> {
        let mut deleted = store.prune(config.keep_snapshots).await?;
        deleted += store.cleanup_older_than(config.retention_days).await?;
        deleted += cleanup_old_files(&config.screenshot_dir, "png", config.retention_days).await?;
        Ok(deleted)
    }

    /// Gracefully shutdown all tasks
    pub async fn shutdown(self) {
        tracing::info!("Shutting down scheduled task manager...");

        for handle in self.task_handles {
            handle.abort();
        }

        tracing::info!("All scheduled tasks stopped");
    }
}
