// SQLite snapshot store. One table holds every tier; aggregated rows carry
// a bucket_start column so a partial unique index makes bucket promotion an
// atomic insert-if-absent.

pub mod aggregation;
pub mod query;

use crate::config::RetentionConfig;
use crate::models::{
    DatabaseStats, FleetCounters, MetricsSnapshot, ServerRuntime, Tier,
};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub struct SnapshotRepo {
    pool: SqlitePool,
    db_path: String,
    retention: RetentionConfig,
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

impl SnapshotRepo {
    pub async fn connect(path: &str, retention: RetentionConfig) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new().connect_with(opts).await?;
        Ok(Self {
            pool,
            db_path: path.to_string(),
            retention,
        })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at INTEGER NOT NULL,
                tier TEXT NOT NULL,
                bucket_start INTEGER,
                fleet_json TEXT NOT NULL,
                server_json TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_snapshot_tier_created_at
             ON snapshot_history(tier, created_at)",
        )
        .execute(&self.pool)
        .await?;

        // Idempotency key for aggregation: at most one aggregate per
        // (tier, bucket). Raw rows have NULL bucket_start and stay exempt.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_snapshot_tier_bucket
             ON snapshot_history(tier, bucket_start) WHERE bucket_start IS NOT NULL",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Appends one raw-path snapshot. Duplicate timestamps within the raw
    /// tier are tolerated; dedup is the collector's responsibility.
    #[instrument(skip(self, snapshot), fields(repo = "snapshot", operation = "insert"))]
    pub async fn insert(&self, snapshot: &MetricsSnapshot) -> anyhow::Result<()> {
        let fleet_json = serde_json::to_string(&snapshot.fleet)?;
        let server_json = serde_json::to_string(&snapshot.server)?;
        sqlx::query(
            "INSERT INTO snapshot_history (created_at, tier, bucket_start, fleet_json, server_json)
             VALUES ($1, $2, NULL, $3, $4)",
        )
        .bind(to_millis(snapshot.timestamp))
        .bind(snapshot.tier.as_str())
        .bind(&fleet_json)
        .bind(&server_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts an aggregate keyed by its bucket. Returns false when the
    /// bucket was already committed (by this run, an earlier run, or a
    /// concurrent one) and the row was ignored.
    #[instrument(
        skip(self, snapshot),
        fields(repo = "snapshot", operation = "insert_aggregate")
    )]
    pub async fn insert_aggregate(
        &self,
        snapshot: &MetricsSnapshot,
        bucket_start_ms: i64,
    ) -> anyhow::Result<bool> {
        let fleet_json = serde_json::to_string(&snapshot.fleet)?;
        let server_json = serde_json::to_string(&snapshot.server)?;
        let r = sqlx::query(
            "INSERT OR IGNORE INTO snapshot_history (created_at, tier, bucket_start, fleet_json, server_json)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(to_millis(snapshot.timestamp))
        .bind(snapshot.tier.as_str())
        .bind(bucket_start_ms)
        .bind(&fleet_json)
        .bind(&server_json)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected() > 0)
    }

    /// True when an aggregate row is already committed for (tier, bucket).
    pub async fn aggregate_exists(&self, tier: Tier, bucket_start_ms: i64) -> anyhow::Result<bool> {
        let row = sqlx::query_scalar::<_, i64>(
            "SELECT 1 FROM snapshot_history
             WHERE tier = $1 AND bucket_start = $2 LIMIT 1",
        )
        .bind(tier.as_str())
        .bind(bucket_start_ms)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    /// Most recent raw snapshot, or None when the store is empty.
    pub async fn get_latest(&self) -> anyhow::Result<Option<MetricsSnapshot>> {
        let row = sqlx::query(
            "SELECT created_at, tier, fleet_json, server_json
             FROM snapshot_history WHERE tier = 'raw'
             ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Self::parse_row(&row, Tier::Raw)?))
    }

    /// Snapshots of one tier in [from_ms, to_ms), ascending. Used by the
    /// aggregator's bucket scans.
    #[instrument(
        skip(self),
        fields(repo = "snapshot", operation = "get_snapshots_in_bucket")
    )]
    pub async fn get_snapshots_in_bucket(
        &self,
        tier: Tier,
        from_ms: i64,
        to_ms: i64,
    ) -> anyhow::Result<Vec<MetricsSnapshot>> {
        let rows = sqlx::query(
            "SELECT created_at, tier, fleet_json, server_json
             FROM snapshot_history
             WHERE tier = $1 AND created_at >= $2 AND created_at < $3
             ORDER BY created_at ASC",
        )
        .bind(tier.as_str())
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Self::parse_row(&row, tier)?);
        }
        Ok(out)
    }

    /// Snapshots of one tier in [from_ms, to_ms], ascending. The query
    /// path uses an inclusive end bound so a point exactly at the range
    /// end is returned.
    #[instrument(
        skip(self),
        fields(repo = "snapshot", operation = "get_snapshots_by_time_range")
    )]
    pub async fn get_snapshots_by_time_range(
        &self,
        tier: Tier,
        from_ms: i64,
        to_ms: i64,
    ) -> anyhow::Result<Vec<MetricsSnapshot>> {
        let rows = sqlx::query(
            "SELECT created_at, tier, fleet_json, server_json
             FROM snapshot_history
             WHERE tier = $1 AND created_at >= $2 AND created_at <= $3
             ORDER BY created_at ASC",
        )
        .bind(tier.as_str())
        .bind(from_ms)
        .bind(to_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(Self::parse_row(&row, tier)?);
        }
        Ok(out)
    }

    /// MIN/MAX created_at of a tier's rows older than cutoff_ms, for
    /// aggregation bounds. None when the tier has no such rows.
    pub async fn get_tier_bounds_before(
        &self,
        tier: Tier,
        cutoff_ms: i64,
    ) -> anyhow::Result<Option<(i64, i64)>> {
        let row = sqlx::query(
            "SELECT MIN(created_at) AS min_ts, MAX(created_at) AS max_ts
             FROM snapshot_history WHERE tier = $1 AND created_at < $2",
        )
        .bind(tier.as_str())
        .bind(cutoff_ms)
        .fetch_one(&self.pool)
        .await?;
        let min_ts: Option<i64> = row.try_get("min_ts")?;
        let max_ts: Option<i64> = row.try_get("max_ts")?;
        Ok(min_ts.zip(max_ts))
    }

    /// Row count of a tier within [from_ms, to_ms], for the raw-overflow
    /// fallback check.
    pub async fn count_in_range(
        &self,
        tier: Tier,
        from_ms: i64,
        to_ms: i64,
    ) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM snapshot_history
             WHERE tier = $1 AND created_at >= $2 AND created_at <= $3",
        )
        .bind(tier.as_str())
        .bind(from_ms)
        .bind(to_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Deletes rows older than each tier's retention horizon, measured
    /// from the current time.
    pub async fn run_retention_prune(&self) -> anyhow::Result<u64> {
        self.run_retention_prune_at(to_millis(Utc::now())).await
    }

    /// Retention prune against an explicit reference time. Rows exactly
    /// at a cutoff are kept (strict <). A failed tier is logged and the
    /// remaining tiers still run. Returns total rows deleted.
    #[instrument(skip(self), fields(repo = "snapshot", operation = "run_retention_prune"))]
    pub async fn run_retention_prune_at(&self, now_ms: i64) -> anyhow::Result<u64> {
        let mut deleted: u64 = 0;
        for tier in [Tier::Raw, Tier::Minute, Tier::Hourly, Tier::Daily] {
            let cutoff = now_ms - self.retention.retention_ms(tier);
            match sqlx::query("DELETE FROM snapshot_history WHERE tier = $1 AND created_at < $2")
                .bind(tier.as_str())
                .bind(cutoff)
                .execute(&self.pool)
                .await
            {
                Ok(r) => deleted += r.rows_affected(),
                Err(e) => {
                    tracing::warn!(tier = tier.as_str(), error = %e, "retention prune failed for tier");
                }
            }
        }
        Ok(deleted)
    }

    /// Reclaim space after deletes (run periodically after pruning).
    #[instrument(skip(self), fields(repo = "snapshot", operation = "vacuum"))]
    pub async fn vacuum(&self) -> anyhow::Result<()> {
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    /// Store row count plus on-disk file size, for dashboard panels.
    pub async fn database_stats(&self) -> anyhow::Result<DatabaseStats> {
        let snapshot_rows =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM snapshot_history")
                .fetch_one(&self.pool)
                .await?;
        let size_bytes = std::fs::metadata(&self.db_path)
            .map(|m| m.len() as i64)
            .unwrap_or(0);
        Ok(DatabaseStats {
            snapshot_rows,
            size_bytes,
        })
    }

    fn parse_row(row: &sqlx::sqlite::SqliteRow, tier: Tier) -> anyhow::Result<MetricsSnapshot> {
        let created_at: i64 = row.try_get("created_at")?;
        let fleet_json: String = row.try_get("fleet_json")?;
        let server_json: String = row.try_get("server_json")?;
        Ok(MetricsSnapshot {
            timestamp: from_millis(created_at),
            tier,
            fleet: decode_fleet_payload(&fleet_json),
            server: decode_server_payload(&server_json),
        })
    }
}

/// Decode the fleet payload; a corrupt row yields defaults instead of
/// failing the whole range scan.
fn decode_fleet_payload(json: &str) -> FleetCounters {
    serde_json::from_str(json).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "decode fleet payload failed, using default");
        FleetCounters::default()
    })
}

fn decode_server_payload(json: &str) -> ServerRuntime {
    serde_json::from_str(json).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "decode server payload failed, using default");
        ServerRuntime::default()
    })
}
