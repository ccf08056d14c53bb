//! Snapshot access for the bot: live extraction or the capture daemon's cache.
use anyhow::{Result, anyhow};
use chrono::Utc;
use shipwatch_backend::module::pipeline::ShipTracker;
use shipwatch_common::{ShipSnapshot, SnapshotStore};
use std::sync::Arc;

/// A snapshot ready for posting
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub snapshot: ShipSnapshot,
    /// Served from cache after a failed fetch, or older than the allowed age
    pub stale: bool,
}

pub enum Mode {
    Live(Arc<ShipTracker>),
    Cache,
}

pub struct SnapshotProvider {
    mode: Mode,
    store: SnapshotStore,
    mmsi: String,
    max_age: chrono::Duration,
}

impl SnapshotProvider {
    pub fn live(tracker: Arc<ShipTracker>, store: SnapshotStore, max_age_hours: i64) -> Self {
        let mmsi = tracker.mmsi().to_string();
        Self {
            mode: Mode::Live(tracker),
            store,
            mmsi,
            max_age: chrono::Duration::hours(max_age_hours),
        }
    }

    pub fn cache(store: SnapshotStore, mmsi: &str, max_age_hours: i64) -> Self {
        Self {
            mode: Mode::Cache,
            store,
            mmsi: mmsi.to_string(),
            max_age: chrono::Duration::hours(max_age_hours),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.mode, Mode::Live(_))
    }

    fn is_stale(&self, snapshot: &ShipSnapshot) -> bool {
        snapshot.age(Utc::now()) > self.max_age
    }

    /// Newest cached snapshot, without fetching
    pub async fn last(&self) -> Result<Option<Report>> {
        Ok(self.store.latest_for(&self.mmsi).await?.map(|snapshot| Report {
            stale: self.is_stale(&snapshot),
            snapshot,
        }))
    }

    /// Current position. A failed live fetch falls back to the cache.
    pub async fn current(&self) -> Result<Report> {
        match &self.mode {
            Mode::Live(tracker) => match tracker.locate_and_store(&self.store).await {
                Ok(snapshot) => Ok(Report {
                    snapshot,
                    stale: false,
                }),
                Err(e) => {
                    tracing::warn!("Live fetch failed, trying cache: {:#}", e);
                    match self.last().await {
                        Ok(Some(report)) => Ok(Report {
                            stale: true,
                            ..report
                        }),
                        Ok(None) => Err(e),
                        Err(cache_err) => {
                            tracing::warn!("Cache read failed: {:#}", cache_err);
                            Err(e)
                        }
                    }
                }
            },
            Mode::Cache => self
                .last()
                .await?
                .ok_or_else(|| anyhow!("No cached snapshot for MMSI {}", self.mmsi)),
        }
    }

    /// Whether the data source answers; describes what answered.
    pub async fn check(&self) -> Result<String> {
        match &self.mode {
            Mode::Live(tracker) => {
                let snapshot = tracker.locate().await?;
                Ok(format!("{} answered for {}", snapshot.source, snapshot.name))
            }
            Mode::Cache => {
                let report = self
                    .last()
                    .await?
                    .ok_or_else(|| anyhow!("No cached snapshot in {:?}", self.store.dir()))?;
                if report.stale {
                    return Err(anyhow!(
                        "Newest snapshot is stale (fetched {})",
                        report.snapshot.fetched_at.format("%Y-%m-%d %H:%M UTC")
                    ));
                }
                Ok(format!("cache is fresh ({})", report.snapshot.source))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shipwatch_backend::module::fetch::Strategy;
    use shipwatch_backend::module::parse::RawFields;
    use shipwatch_common::Position;
    use tempfile::TempDir;

    const MMSI: &str = "538010457";

    struct Fixed(bool);

    #[async_trait]
    impl Strategy for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self, _mmsi: &str) -> Result<RawFields> {
            if !self.0 {
                anyhow::bail!("offline");
            }
            let mut fields = RawFields::new("fixed");
            fields.push("SHIPNAME", "EVER GIVEN");
            fields.push("LAT", "51.95");
            fields.push("LON", "4.05");
            Ok(fields)
        }
    }

    fn snapshot(hours_old: i64) -> ShipSnapshot {
        ShipSnapshot {
            mmsi: MMSI.to_string(),
            name: "CACHED".to_string(),
            position: Position::new(1.0, 2.0),
            speed_knots: None,
            course_deg: None,
            status: None,
            destination: None,
            eta: None,
            reported_at: None,
            source: "browser".to_string(),
            fetched_at: Utc::now() - chrono::Duration::hours(hours_old),
        }
    }

    fn tracker(online: bool) -> Arc<ShipTracker> {
        Arc::new(ShipTracker::new(MMSI, vec![Arc::new(Fixed(online))]))
    }

    #[tokio::test]
    async fn test_live_fetch_is_stored() {
        let dir = TempDir::new().unwrap();
        let provider = SnapshotProvider::live(tracker(true), SnapshotStore::new(dir.path()), 12);

        let report = provider.current().await.unwrap();
        assert!(!report.stale);
        assert_eq!(report.snapshot.name, "EVER GIVEN");
        assert_eq!(provider.last().await.unwrap().unwrap().snapshot, report.snapshot);
    }

    #[tokio::test]
    async fn test_live_failure_falls_back_to_cache() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let provider = SnapshotProvider::live(tracker(false), store.clone(), 12);

        assert!(provider.current().await.is_err());

        store.save(&snapshot(1)).await.unwrap();
        let report = provider.current().await.unwrap();
        assert!(report.stale);
        assert_eq!(report.snapshot.name, "CACHED");
    }

    #[tokio::test]
    async fn test_cache_mode_staleness() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let provider = SnapshotProvider::cache(store.clone(), MMSI, 12);

        assert!(provider.current().await.is_err());
        assert!(provider.check().await.is_err());

        store.save(&snapshot(20)).await.unwrap();
        assert!(provider.current().await.unwrap().stale);
        assert!(provider.check().await.is_err());

        store.save(&snapshot(2)).await.unwrap();
        let report = provider.current().await.unwrap();
        assert!(!report.stale);
        assert!(provider.check().await.is_ok());
    }
}
