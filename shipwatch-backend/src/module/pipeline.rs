//! Strategy fallback: fetch, normalize, validate.
//!
//! Strategies run in configured order and the first record that validates
//! wins. Fields a failed attempt did manage to read (a page that showed the
//! name but no position, say) are kept and used to fill gaps in the winner.

use anyhow::Result;
use chrono::Utc;
use shipwatch_common::{PartialRecord, ShipSnapshot, SnapshotStore, validate};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use super::fetch::{ApiStrategy, BrowserStrategy, HtmlStrategy, Strategy, http_client};
use super::parse::normalize;
use crate::config::{API_STRATEGY, BROWSER_STRATEGY, BackendConfig, ConfigError};

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    pub strategy: String,
    pub reason: String,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("no data strategies configured")]
    NoStrategies,
    #[error("all strategies failed: {}", join_failures(.0))]
    AllFailed(Vec<AttemptFailure>),
}

fn join_failures(failures: &[AttemptFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub struct ShipTracker {
    mmsi: String,
    strategies: Vec<Arc<dyn Strategy>>,
    attempt_timeout: Duration,
}

impl ShipTracker {
    pub fn new(mmsi: &str, strategies: Vec<Arc<dyn Strategy>>) -> Self {
        Self {
            mmsi: mmsi.to_string(),
            strategies,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Build the configured strategies in order.
    pub fn from_config(mmsi: &str, config: &BackendConfig) -> Result<Self> {
        let client = http_client(&config.http)?;
        let sites = config.site_profiles();
        let mut strategies: Vec<Arc<dyn Strategy>> = Vec::new();

        for name in &config.strategies {
            match name.as_str() {
                API_STRATEGY => match config.api_key() {
                    Some(key) => strategies.push(Arc::new(ApiStrategy::new(client.clone(), key))),
                    None => warn!("No MarineTraffic API key configured, skipping {}", name),
                },
                BROWSER_STRATEGY => strategies.push(Arc::new(BrowserStrategy::new(
                    config.browser.clone(),
                    &config.screenshot_dir,
                ))),
                other => {
                    let site = sites
                        .iter()
                        .find(|s| s.name == other)
                        .ok_or_else(|| ConfigError::UnknownStrategy(other.to_string()))?;
                    strategies.push(Arc::new(HtmlStrategy::new(client.clone(), site.clone())));
                }
            }
        }

        Ok(Self::new(mmsi, strategies)
            .with_attempt_timeout(Duration::from_secs(config.attempt_timeout_secs)))
    }

    pub fn mmsi(&self) -> &str {
        &self.mmsi
    }

    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name().to_string()).collect()
    }

    pub async fn locate(&self) -> Result<ShipSnapshot, TrackError> {
        if self.strategies.is_empty() {
            return Err(TrackError::NoStrategies);
        }

        let mut failures = Vec::new();
        let mut leftovers = PartialRecord::default();

        for strategy in &self.strategies {
            let name = strategy.name().to_string();
            info!("Trying strategy: {}", name);

            let raw = match tokio::time::timeout(self.attempt_timeout, strategy.fetch(&self.mmsi))
                .await
            {
                Ok(Ok(raw)) => raw,
                Ok(Err(e)) => {
                    warn!("Strategy {} failed: {:#}", name, e);
                    failures.push(AttemptFailure {
                        strategy: name,
                        reason: format!("{:#}", e),
                    });
                    continue;
                }
                Err(_) => {
                    warn!("Strategy {} timed out", name);
                    failures.push(AttemptFailure {
                        strategy: name,
                        reason: format!("timed out after {:?}", self.attempt_timeout),
                    });
                    continue;
                }
            };

            let mut record = normalize(&raw);
            record.merge_missing(&leftovers);

            match validate(record.clone(), &self.mmsi, &name, Utc::now()) {
                Ok(snapshot) => {
                    info!(
                        "Located {} at {} via {}",
                        snapshot.name, snapshot.position, name
                    );
                    return Ok(snapshot);
                }
                Err(e) => {
                    warn!("Strategy {} returned unusable data: {}", name, e);
                    record.latitude = None;
                    record.longitude = None;
                    leftovers.merge_missing(&record);
                    failures.push(AttemptFailure {
                        strategy: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(TrackError::AllFailed(failures))
    }

    /// Locate the ship and persist the snapshot.
    pub async fn locate_and_store(&self, store: &SnapshotStore) -> Result<ShipSnapshot> {
        let snapshot = self.locate().await?;
        let path = store.save(&snapshot).await?;
        info!("Snapshot saved to {:?}", path);
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::parse::RawFields;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Fail,
        Hang,
        Pairs(Vec<(&'static str, &'static str)>),
    }

    struct MockStrategy {
        name: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl MockStrategy {
        fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name,
                behaviour,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Strategy for MockStrategy {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _mmsi: &str) -> Result<RawFields> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Fail => bail!("HTTP 403"),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    bail!("unreachable")
                }
                Behaviour::Pairs(pairs) => {
                    let mut fields = RawFields::new(self.name);
                    for (k, v) in pairs {
                        fields.push(k, *v);
                    }
                    Ok(fields)
                }
            }
        }
    }

    const MMSI: &str = "538010457";

    #[tokio::test]
    async fn test_first_valid_strategy_wins() {
        let first = MockStrategy::new("first", Behaviour::Fail);
        let second = MockStrategy::new(
            "second",
            Behaviour::Pairs(vec![("SHIPNAME", "EVER GIVEN"), ("LAT", "51.95"), ("LON", "4.05")]),
        );
        let third = MockStrategy::new("third", Behaviour::Fail);
        let tracker = ShipTracker::new(MMSI, vec![first.clone(), second.clone(), third.clone()]);

        let snapshot = tracker.locate().await.unwrap();
        assert_eq!(snapshot.source, "second");
        assert_eq!(snapshot.name, "EVER GIVEN");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_leftover_fields_fill_winner() {
        let partial = MockStrategy::new(
            "partial",
            Behaviour::Pairs(vec![("Vessel Name", "EVER GIVEN"), ("Destination", "ROTTERDAM")]),
        );
        let coords = MockStrategy::new("coords", Behaviour::Pairs(vec![("Position", "51.95, 4.05")]));
        let tracker = ShipTracker::new(MMSI, vec![partial, coords]);

        let snapshot = tracker.locate().await.unwrap();
        assert_eq!(snapshot.source, "coords");
        assert_eq!(snapshot.name, "EVER GIVEN");
        assert_eq!(snapshot.destination.as_deref(), Some("ROTTERDAM"));
    }

    #[tokio::test]
    async fn test_invalid_position_falls_through() {
        let null_island = MockStrategy::new("zero", Behaviour::Pairs(vec![("LAT", "0"), ("LON", "0")]));
        let good = MockStrategy::new("good", Behaviour::Pairs(vec![("LAT", "10.5"), ("LON", "20.5")]));
        let tracker = ShipTracker::new(MMSI, vec![null_island, good]);

        let snapshot = tracker.locate().await.unwrap();
        assert_eq!(snapshot.source, "good");
        assert_eq!(snapshot.position.latitude, 10.5);
    }

    #[tokio::test]
    async fn test_all_failed_lists_every_attempt() {
        let tracker = ShipTracker::new(
            MMSI,
            vec![
                MockStrategy::new("api", Behaviour::Fail),
                MockStrategy::new("slow", Behaviour::Hang),
                MockStrategy::new("empty", Behaviour::Pairs(vec![("Gross Tonnage", "1000")])),
            ],
        )
        .with_attempt_timeout(Duration::from_millis(50));

        match tracker.locate().await {
            Err(TrackError::AllFailed(failures)) => {
                let names: Vec<_> = failures.iter().map(|f| f.strategy.as_str()).collect();
                assert_eq!(names, ["api", "slow", "empty"]);
                assert!(failures[0].reason.contains("403"));
                assert!(failures[1].reason.contains("timed out"));
            }
            other => panic!("expected AllFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_strategies() {
        let tracker = ShipTracker::new(MMSI, Vec::new());
        assert!(matches!(tracker.locate().await, Err(TrackError::NoStrategies)));
    }

    #[tokio::test]
    async fn test_locate_and_store_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let tracker = ShipTracker::new(
            MMSI,
            vec![MockStrategy::new("ok", Behaviour::Pairs(vec![("LAT", "1.5"), ("LON", "2.5")]))],
        );

        let snapshot = tracker.locate_and_store(&store).await.unwrap();
        let cached = store.latest().await.unwrap().unwrap();
        assert_eq!(cached, snapshot);
    }

    #[test]
    fn test_from_config_order_and_api_skip() {
        let mut config = BackendConfig::default();
        let tracker = ShipTracker::from_config(MMSI, &config).unwrap();
        assert_eq!(
            tracker.strategy_names(),
            ["myshiptracking", "vesselfinder", "browser"]
        );

        config.marinetraffic_api_key = Some("key".to_string());
        config.strategies = vec!["browser".to_string(), API_STRATEGY.to_string()];
        let tracker = ShipTracker::from_config(MMSI, &config).unwrap();
        assert_eq!(tracker.strategy_names(), ["browser", API_STRATEGY]);

        config.strategies = vec!["nowhere".to_string()];
        assert!(ShipTracker::from_config(MMSI, &config).is_err());
    }
}
