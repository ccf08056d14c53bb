//! Snapshot cache: one JSON file per successful capture
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::types::ShipSnapshot;

const FILE_PREFIX: &str = "ship_data_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static SNAPSHOT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ship_data_(\w+?)_(\d{8}_\d{6})\.json$").expect("snapshot name regex")
});

/// A snapshot file found in the cache directory
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotFile {
    pub path: PathBuf,
    pub mmsi: String,
    pub taken_at: DateTime<Utc>,
}

/// File-backed cache of captured snapshots
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir)
                .await
                .with_context(|| format!("Failed to create snapshot directory: {:?}", self.dir))?;
            info!("Created snapshot directory: {:?}", self.dir);
        }
        Ok(())
    }

    pub fn file_name(snapshot: &ShipSnapshot) -> String {
        format!(
            "{}{}_{}.json",
            FILE_PREFIX,
            snapshot.mmsi,
            snapshot.fetched_at.format(TIMESTAMP_FORMAT)
        )
    }

    /// Persist a snapshot and return its path.
    ///
    /// The JSON is written to a temporary file first and renamed into place,
    /// so a reader polling the directory never sees a half-written file.
    pub async fn save(&self, snapshot: &ShipSnapshot) -> Result<PathBuf> {
        self.ensure_dir().await?;

        let path = self.dir.join(Self::file_name(snapshot));
        let tmp_path = path.with_extension("json.tmp");
        let content =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;

        fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write snapshot to: {:?}", tmp_path))?;
        fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to move snapshot into place: {:?}", path))?;

        info!("Saved snapshot to: {:?}", path);
        Ok(path)
    }

    /// All snapshot files, newest first. Unrelated files are ignored.
    pub async fn list(&self) -> Result<Vec<SnapshotFile>> {
        let mut files = Vec::new();

        if !self.dir.exists() {
            return Ok(files);
        }

        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some((mmsi, taken_at)) = parse_file_name(name) {
                files.push(SnapshotFile {
                    path,
                    mmsi,
                    taken_at,
                });
            }
        }

        files.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));
        Ok(files)
    }

    pub async fn load(path: &Path) -> Result<ShipSnapshot> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot: {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse snapshot: {:?}", path))
    }

    /// Newest readable snapshot for any vessel
    pub async fn latest(&self) -> Result<Option<ShipSnapshot>> {
        self.latest_matching(|_| true).await
    }

    /// Newest readable snapshot for `mmsi`
    pub async fn latest_for(&self, mmsi: &str) -> Result<Option<ShipSnapshot>> {
        self.latest_matching(|f| f.mmsi == mmsi).await
    }

    async fn latest_matching<F>(&self, filter: F) -> Result<Option<ShipSnapshot>>
    where
        F: Fn(&SnapshotFile) -> bool,
    {
        for file in self.list().await?.into_iter().filter(|f| filter(f)) {
            match Self::load(&file.path).await {
                Ok(snapshot) => return Ok(Some(snapshot)),
                Err(e) => warn!("Skipping unreadable snapshot {:?}: {:#}", file.path, e),
            }
        }
        debug!("No snapshot found in {:?}", self.dir);
        Ok(None)
    }

    /// Delete all but the `keep` newest snapshots. The newest is always kept.
    pub async fn prune(&self, keep: usize) -> Result<usize> {
        let keep = keep.max(1);
        let mut deleted_count = 0;

        for file in self.list().await?.into_iter().skip(keep) {
            if let Err(e) = fs::remove_file(&file.path).await {
                warn!("Failed to delete old snapshot {:?}: {}", file.path, e);
            } else {
                deleted_count += 1;
                debug!("Deleted old snapshot: {:?}", file.path);
            }
        }

        if deleted_count > 0 {
            info!("Pruned {} old snapshots from {:?}", deleted_count, self.dir);
        }
        Ok(deleted_count)
    }

    /// Delete snapshots older than `days_to_keep`, never the newest one.
    pub async fn cleanup_older_than(&self, days_to_keep: i64) -> Result<usize> {
        let cutoff_time = Utc::now() - chrono::Duration::days(days_to_keep);
        let mut deleted_count = 0;

        for file in self.list().await?.into_iter().skip(1) {
            if file.taken_at < cutoff_time {
                if let Err(e) = fs::remove_file(&file.path).await {
                    warn!("Failed to delete old snapshot {:?}: {}", file.path, e);
                } else {
                    deleted_count += 1;
                }
            }
        }

        if deleted_count > 0 {
            info!("Cleaned up {} expired snapshots from {:?}", deleted_count, self.dir);
        }
        Ok(deleted_count)
    }
}

fn parse_file_name(name: &str) -> Option<(String, DateTime<Utc>)> {
    let caps = SNAPSHOT_NAME.captures(name)?;
    let taken_at = NaiveDateTime::parse_from_str(&caps[2], TIMESTAMP_FORMAT)
        .ok()?
        .and_utc();
    Some((caps[1].to_string(), taken_at))
}

/// Delete files with extension `ext` in `dir` last modified more than `days_to_keep` ago.
pub async fn cleanup_old_files(dir: &Path, ext: &str, days_to_keep: i64) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut deleted_count = 0;
    let cutoff_time = Utc::now() - chrono::Duration::days(days_to_keep);

    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();

        if path.is_file() && path.extension().is_some_and(|e| e == ext) {
            if let Ok(metadata) = entry.metadata().await {
                if let Ok(modified) = metadata.modified() {
                    let modified_time: DateTime<Utc> = modified.into();
                    if modified_time < cutoff_time {
                        if let Err(e) = fs::remove_file(&path).await {
                            warn!("Failed to delete old file {:?}: {}", path, e);
                        } else {
                            deleted_count += 1;
                            debug!("Deleted old file: {:?}", path);
                        }
                    }
                }
            }
        }
    }

    if deleted_count > 0 {
        info!("Cleaned up {} old .{} files from {:?}", deleted_count, ext, dir);
    }

    Ok(deleted_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn snapshot(mmsi: &str, hour: u32) -> ShipSnapshot {
        ShipSnapshot {
            mmsi: mmsi.to_string(),
            name: "TEST VESSEL".to_string(),
            position: Position::new(10.0, 20.0 + hour as f64),
            speed_knots: Some(11.2),
            course_deg: Some(90.0),
            status: None,
            destination: None,
            eta: None,
            reported_at: None,
            source: "test".to_string(),
            fetched_at: Utc.with_ymd_and_hms(2025, 6, 1, hour, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_file_name_roundtrip() {
        let snap = snapshot("538010457", 7);
        let name = SnapshotStore::file_name(&snap);
        assert_eq!(name, "ship_data_538010457_20250601_073000.json");
        let (mmsi, at) = parse_file_name(&name).unwrap();
        assert_eq!(mmsi, "538010457");
        assert_eq!(at, snap.fetched_at);
        assert!(parse_file_name("notes.json").is_none());
        assert!(parse_file_name("ship_data_1_20250601_073000.json.tmp").is_none());
    }

    #[tokio::test]
    async fn test_latest_and_prune() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());

        for hour in [3, 9, 5, 1] {
            store.save(&snapshot("538010457", hour)).await.unwrap();
        }
        std::fs::write(temp_dir.path().join("README.txt"), "not a snapshot").unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.fetched_at.format("%H").to_string(), "09");

        let deleted = store.prune(2).await.unwrap();
        assert_eq!(deleted, 2);
        let remaining = store.list().await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[1].taken_at, snapshot("x", 5).fetched_at);
        assert!(temp_dir.path().join("README.txt").exists());
    }

    #[tokio::test]
    async fn test_prune_zero_keeps_latest() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());
        store.save(&snapshot("1", 1)).await.unwrap();
        store.save(&snapshot("1", 2)).await.unwrap();

        assert_eq!(store.prune(0).await.unwrap(), 1);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_latest_skips_corrupt_and_filters_mmsi() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());
        store.save(&snapshot("111", 2)).await.unwrap();
        store.save(&snapshot("222", 4)).await.unwrap();
        std::fs::write(
            temp_dir.path().join("ship_data_111_20250601_233000.json"),
            "{ broken",
        )
        .unwrap();

        let latest = store.latest_for("111").await.unwrap().unwrap();
        assert_eq!(latest.mmsi, "111");
        assert_eq!(latest.fetched_at, snapshot("111", 2).fetched_at);

        let any = store.latest().await.unwrap().unwrap();
        assert_eq!(any.mmsi, "222");
    }

    #[tokio::test]
    async fn test_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("missing"));
        assert!(store.latest().await.unwrap().is_none());
        assert_eq!(store.prune(3).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_older_than_keeps_newest() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path());
        store.save(&snapshot("1", 1)).await.unwrap();
        store.save(&snapshot("1", 2)).await.unwrap();

        // Both are from 2025; only the older one may go.
        assert_eq!(store.cleanup_older_than(1).await.unwrap(), 1);
        assert!(store.latest().await.unwrap().is_some());
    }
}
