// Shared test helpers. Not every binary uses every helper.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use fleetmetrics::config::RetentionConfig;
use fleetmetrics::models::*;
use fleetmetrics::snapshot_repo::SnapshotRepo;
use tempfile::TempDir;

pub async fn temp_repo() -> (TempDir, SnapshotRepo) {
    let (dir, repo, _) = temp_repo_with_path().await;
    (dir, repo)
}

/// As temp_repo, also returning the database path for tests that open a
/// second connection of their own.
pub async fn temp_repo_with_path() -> (TempDir, SnapshotRepo, String) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.db");
    let path_str = path.to_str().unwrap().to_string();
    let repo = SnapshotRepo::connect(&path_str, RetentionConfig::default())
        .await
        .unwrap();
    repo.init().await.unwrap();
    (dir, repo, path_str)
}

pub fn snapshot(timestamp: DateTime<Utc>, tier: Tier) -> MetricsSnapshot {
    MetricsSnapshot::new(timestamp, tier)
}

/// Raw snapshot with the fields the aggregation tests care about.
pub fn raw_snapshot(timestamp: DateTime<Utc>, threads: i64, db_size_bytes: i64) -> MetricsSnapshot {
    let mut s = MetricsSnapshot::new(timestamp, Tier::Raw);
    s.server.threads = threads;
    s.server.db_size_bytes = db_size_bytes;
    s
}

pub fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}
