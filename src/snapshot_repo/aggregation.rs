// Tier promotion: raw -> minute -> hourly -> daily, one bucket at a time.
// Pure folding lives in fold_bucket; the driver walks buckets and commits
// each aggregate with an atomic insert-if-absent.

use super::{SnapshotRepo, from_millis};
use crate::models::{FleetCounters, MetricsSnapshot, ServerRuntime, Tier};
use chrono::Utc;
use tracing::{info, instrument, warn};

pub(crate) const MS_PER_MINUTE: i64 = 60_000;
pub(crate) const MS_PER_HOUR: i64 = 3_600_000;
pub(crate) const MS_PER_DAY: i64 = 86_400_000;

/// One rollup step. The lag keeps a bucket open until late-arriving source
/// rows have had time to land.
#[derive(Debug, Clone, Copy)]
pub struct Promotion {
    pub source: Tier,
    pub dest: Tier,
    pub lag_ms: i64,
    pub bucket_ms: i64,
}

/// Promotions run in this order on every aggregation pass.
pub const PROMOTIONS: [Promotion; 3] = [
    Promotion {
        source: Tier::Raw,
        dest: Tier::Minute,
        lag_ms: 2 * MS_PER_MINUTE,
        bucket_ms: MS_PER_MINUTE,
    },
    Promotion {
        source: Tier::Minute,
        dest: Tier::Hourly,
        lag_ms: MS_PER_HOUR,
        bucket_ms: MS_PER_HOUR,
    },
    Promotion {
        source: Tier::Hourly,
        dest: Tier::Daily,
        lag_ms: MS_PER_DAY,
        bucket_ms: MS_PER_DAY,
    },
];

impl SnapshotRepo {
    /// Runs all three promotions. Idempotent: a committed bucket is skipped
    /// by a cheap dest-tier lookup, the (tier, bucket_start) unique index
    /// settles races, and no state is kept between runs. A failed promotion
    /// is logged and later tiers still run.
    #[instrument(skip(self), fields(repo = "snapshot", operation = "run_aggregation"))]
    pub async fn run_aggregation(&self) -> anyhow::Result<()> {
        let now_ms = Utc::now().timestamp_millis();
        for p in &PROMOTIONS {
            if let Err(e) = self.promote_tier(p, now_ms - p.lag_ms).await {
                warn!(
                    source = p.source.as_str(),
                    dest = p.dest.as_str(),
                    error = %e,
                    "tier promotion failed"
                );
            }
        }
        Ok(())
    }

    /// Rolls up every fully elapsed source bucket older than cutoff_ms.
    /// Only buckets whose end lies before the cutoff are processed, so
    /// source rows inside the lag window are never folded early.
    async fn promote_tier(&self, p: &Promotion, cutoff_ms: i64) -> anyhow::Result<u32> {
        let Some((min_ts, max_ts)) = self.get_tier_bounds_before(p.source, cutoff_ms).await? else {
            return Ok(0);
        };

        let max_bucket = max_ts.div_euclid(p.bucket_ms) * p.bucket_ms;
        let mut bucket_start = min_ts.div_euclid(p.bucket_ms) * p.bucket_ms;
        let mut inserted: u32 = 0;

        while bucket_start <= max_bucket && bucket_start + p.bucket_ms <= cutoff_ms {
            match self.promote_bucket(p, bucket_start).await {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        dest = p.dest.as_str(),
                        bucket_start,
                        error = %e,
                        "bucket aggregation failed, continuing"
                    );
                }
            }
            bucket_start += p.bucket_ms;
        }

        if inserted > 0 {
            info!(
                source = p.source.as_str(),
                dest = p.dest.as_str(),
                aggregated_buckets = inserted,
                "tier promotion"
            );
        }
        Ok(inserted)
    }

    /// Folds one bucket and inserts the aggregate at the bucket midpoint.
    /// Returns false for empty buckets and already-committed buckets.
    async fn promote_bucket(&self, p: &Promotion, bucket_start: i64) -> anyhow::Result<bool> {
        // Committed buckets are skipped before the source rows are fetched;
        // source rows outlive their promotion by the full retention window,
        // so without this check every pass would refold the whole tier. The
        // unique index behind insert_aggregate still settles concurrent runs.
        if self.aggregate_exists(p.dest, bucket_start).await? {
            return Ok(false);
        }
        let rows = self
            .get_snapshots_in_bucket(p.source, bucket_start, bucket_start + p.bucket_ms)
            .await?;
        let Some((fleet, server)) = fold_bucket(&rows) else {
            return Ok(false);
        };
        let agg = MetricsSnapshot {
            timestamp: from_millis(bucket_start + p.bucket_ms / 2),
            tier: p.dest,
            fleet,
            server,
        };
        self.insert_aggregate(&agg, bucket_start).await
    }
}

/// Folds a bucket of source snapshots into one aggregate payload pair.
/// Fleet counters and store stats take the max across the bucket (peak in
/// period); runtime gauges take the arithmetic mean. None for empty input.
pub fn fold_bucket(snapshots: &[MetricsSnapshot]) -> Option<(FleetCounters, ServerRuntime)> {
    if snapshots.is_empty() {
        return None;
    }

    let mut fleet = FleetCounters::default();
    let mut server = ServerRuntime::default();

    for s in snapshots {
        let f = &s.fleet;
        fleet.total_agents = fleet.total_agents.max(f.total_agents);
        fleet.total_devices = fleet.total_devices.max(f.total_devices);
        fleet.agents_ws = fleet.agents_ws.max(f.agents_ws);
        fleet.agents_http = fleet.agents_http.max(f.agents_http);
        fleet.agents_offline = fleet.agents_offline.max(f.agents_offline);
        fleet.total_pages = fleet.total_pages.max(f.total_pages);
        fleet.color_pages = fleet.color_pages.max(f.color_pages);
        fleet.mono_pages = fleet.mono_pages.max(f.mono_pages);
        fleet.scan_count = fleet.scan_count.max(f.scan_count);
        fleet.toner_high = fleet.toner_high.max(f.toner_high);
        fleet.toner_medium = fleet.toner_medium.max(f.toner_medium);
        fleet.toner_low = fleet.toner_low.max(f.toner_low);
        fleet.toner_critical = fleet.toner_critical.max(f.toner_critical);
        fleet.toner_unknown = fleet.toner_unknown.max(f.toner_unknown);
        fleet.devices_online = fleet.devices_online.max(f.devices_online);
        fleet.devices_offline = fleet.devices_offline.max(f.devices_offline);
        fleet.devices_error = fleet.devices_error.max(f.devices_error);
        fleet.devices_warning = fleet.devices_warning.max(f.devices_warning);
        fleet.devices_jam = fleet.devices_jam.max(f.devices_jam);

        let v = &s.server;
        server.threads += v.threads;
        server.heap_alloc_mb += v.heap_alloc_mb;
        server.heap_sys_mb += v.heap_sys_mb;
        server.total_alloc_mb += v.total_alloc_mb;
        server.sys_mb += v.sys_mb;
        server.gc_pause_ns += v.gc_pause_ns;
        server.ws_connections += v.ws_connections;
        server.ws_agents += v.ws_agents;
        server.db_size_bytes = server.db_size_bytes.max(v.db_size_bytes);
        server.db_agents = server.db_agents.max(v.db_agents);
        server.db_devices = server.db_devices.max(v.db_devices);
        server.db_metrics_rows = server.db_metrics_rows.max(v.db_metrics_rows);
    }

    let n = snapshots.len() as i64;
    server.threads /= n;
    server.heap_alloc_mb /= n;
    server.heap_sys_mb /= n;
    server.total_alloc_mb /= n;
    server.sys_mb /= n;
    server.gc_pause_ns /= n;
    server.ws_connections /= n;
    server.ws_agents /= n;

    Some((fleet, server))
}
