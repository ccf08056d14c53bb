///! Periodic ship updates to the configured channel

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shipwatch_backend::module::scheduled::next_aligned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::notifier::{Outgoing, SCHEDULED_FETCH_FAILED, ShipReport};
use crate::provider::SnapshotProvider;

/// Next scheduled post, shared with the `status` command
pub type NextRunHandle = Arc<RwLock<Option<DateTime<Utc>>>>;

/// Somewhere scheduled updates are delivered
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, message: Outgoing) -> Result<()>;
}

pub struct UpdateTask {
    provider: Arc<SnapshotProvider>,
    announcer: Arc<dyn Announcer>,
    nickname: String,
    interval: Duration,
    post_on_startup: bool,
    next_run: NextRunHandle,
}

impl UpdateTask {
    pub fn new(
        provider: Arc<SnapshotProvider>,
        announcer: Arc<dyn Announcer>,
        nickname: &str,
        interval: Duration,
    ) -> Self {
        Self {
            provider,
            announcer,
            nickname: nickname.to_string(),
            interval,
            post_on_startup: true,
            next_run: Arc::new(RwLock::new(None)),
        }
    }

    pub fn post_on_startup(mut self, enabled: bool) -> Self {
        self.post_on_startup = enabled;
        self
    }

    /// Publish next-run times into an existing handle
    pub fn with_next_run(mut self, handle: NextRunHandle) -> Self {
        self.next_run = handle;
        self
    }

    pub fn next_run_handle(&self) -> NextRunHandle {
        self.next_run.clone()
    }

    /// The message for one scheduled post
    pub async fn build_update(provider: &SnapshotProvider, nickname: &str) -> Outgoing {
        match provider.current().await {
            Ok(report) => {
                Outgoing::Embed(ShipReport::from_snapshot(&report, nickname, Utc::now()))
            }
            Err(e) => {
                tracing::error!("Scheduled fetch failed: {:#}", e);
                Outgoing::Text(SCHEDULED_FETCH_FAILED.to_string())
            }
        }
    }

    async fn post_once(&self) {
        tracing::info!("Posting scheduled ship update...");
        let message = Self::build_update(&self.provider, &self.nickname).await;
        match self.announcer.announce(message).await {
            Ok(()) => tracing::info!("Ship update sent successfully"),
            Err(e) => tracing::error!("Failed to send ship update: {:#}", e),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tracing::info!(
            "Scheduling ship updates every {:.1} hours (post on startup: {})",
            self.interval.as_secs_f64() / 3600.0,
            self.post_on_startup
        );
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        if self.post_on_startup {
            self.post_once().await;
        }

        loop {
            let now = Utc::now();
            let next_trigger = next_aligned(now, self.interval);
            let sleep_duration = (next_trigger - now)
                .to_std()
                .unwrap_or(Duration::from_secs(60));
            *self.next_run.write().await = Some(next_trigger);

            tracing::info!(
                "Next ship update at: {} (in {:.1} hours)",
                next_trigger.format("%Y-%m-%d %H:%M:%S UTC"),
                sleep_duration.as_secs_f64() / 3600.0
            );

            tokio::time::sleep(sleep_duration).await;
            self.post_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipwatch_common::SnapshotStore;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Outgoing>>);

    #[async_trait]
    impl Announcer for Recorder {
        async fn announce(&self, message: Outgoing) -> Result<()> {
            self.0.lock().await.push(message);
            Ok(())
        }
    }

    fn empty_cache_provider(dir: &tempfile::TempDir) -> Arc<SnapshotProvider> {
        Arc::new(SnapshotProvider::cache(
            SnapshotStore::new(dir.path()),
            "538010457",
            12,
        ))
    }

    #[tokio::test]
    async fn test_failed_fetch_posts_failure_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let message = UpdateTask::build_update(&empty_cache_provider(&dir), "x").await;
        assert_eq!(message, Outgoing::Text(SCHEDULED_FETCH_FAILED.to_string()));
    }

    #[tokio::test]
    async fn test_posts_on_startup_and_on_schedule() {
        let dir = tempfile::TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let task = UpdateTask::new(
            empty_cache_provider(&dir),
            recorder.clone(),
            "x",
            Duration::from_secs(1),
        );
        let next_run = task.next_run_handle();
        let handle = task.spawn();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while recorder.0.lock().await.len() < 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        handle.abort();

        assert!(recorder.0.lock().await.len() >= 2);
        assert!(next_run.read().await.is_some());
    }

    #[tokio::test]
    async fn test_no_startup_post_when_disabled() {
        let dir = tempfile::TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let task = UpdateTask::new(
            empty_cache_provider(&dir),
            recorder.clone(),
            "x",
            Duration::from_secs(3600),
        )
        .post_on_startup(false);
        let next_run = task.next_run_handle();
        let handle = task.spawn();

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();

        assert!(recorder.0.lock().await.is_empty());
        assert!(next_run.read().await.is_some());
    }
}
