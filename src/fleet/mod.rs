// Fleet aggregation engine: turns raw per-device counter history plus
// current device/agent state into a dashboard report. Request-time only,
// nothing here is persisted.

pub mod consumables;

use crate::models::{
    AggregatedReport, AgentRecord, DeviceMetricPoint, DeviceRecord, FleetReport, MetricSeriesPoint,
    ServerStats,
};
use crate::snapshot_repo::from_millis;
use chrono::{DateTime, Utc};
use consumables::ConsumableBand;
use std::collections::{BTreeMap, HashMap, HashSet};

const MS_PER_HOUR: i64 = 3_600_000;

/// Read access to the entity CRUD layer and the per-device metric history.
/// Implementations are expected to return `device_metrics_since` rows in
/// ascending timestamp order.
#[allow(async_fn_in_trait)]
pub trait FleetDataSource {
    async fn list_agents(&self) -> anyhow::Result<Vec<AgentRecord>>;
    async fn list_devices(&self) -> anyhow::Result<Vec<DeviceRecord>>;
    async fn device_metrics_since(
        &self,
        since: DateTime<Utc>,
        tenant_ids: &[String],
    ) -> anyhow::Result<Vec<DeviceMetricPoint>>;
    /// Latest known reading for a device, regardless of time window.
    async fn latest_device_metrics(
        &self,
        serial: &str,
    ) -> anyhow::Result<Option<DeviceMetricPoint>>;
}

#[derive(Default)]
struct UsageBucket {
    total: i64,
    mono: i64,
    color: i64,
    scan: i64,
}

/// Computes the dashboard summary for `[since, now]`, optionally filtered
/// to an allow-list of tenants (empty list means all tenants).
pub async fn aggregate<S: FleetDataSource>(
    source: &S,
    since: DateTime<Utc>,
    tenant_ids: &[String],
    server: Option<ServerStats>,
) -> anyhow::Result<AggregatedReport> {
    let now = Utc::now();
    let mut fleet = FleetReport::default();

    let allowed: HashSet<&str> = tenant_ids.iter().map(String::as_str).collect();

    let agents = source.list_agents().await?;
    let mut agent_tenants: HashMap<String, String> = HashMap::with_capacity(agents.len());
    for a in agents {
        if !tenant_ids.is_empty() && !allowed.contains(a.tenant_id.as_str()) {
            continue;
        }
        agent_tenants.insert(a.agent_id, a.tenant_id);
        fleet.totals.agents += 1;
    }

    // Devices are filtered transitively through their owning agent's tenant.
    let devices = source.list_devices().await?;
    let mut filtered: Vec<DeviceRecord> = Vec::with_capacity(devices.len());
    let mut serials: HashSet<String> = HashSet::with_capacity(devices.len());
    for d in devices {
        if !tenant_ids.is_empty() && !agent_tenants.contains_key(&d.agent_id) {
            continue;
        }
        let (has_error, has_warning, has_jam) = classify_status_messages(&d.status_messages);
        if has_jam {
            fleet.statuses.jam += 1;
            fleet.statuses.error += 1;
        } else if has_error {
            fleet.statuses.error += 1;
        } else if has_warning {
            fleet.statuses.warning += 1;
        }
        serials.insert(d.serial.clone());
        filtered.push(d);
    }
    fleet.totals.devices = filtered.len() as i64;

    if filtered.is_empty() {
        return Ok(AggregatedReport {
            generated_at: now,
            range_start: since,
            range_end: now,
            fleet,
            server,
        });
    }

    // Walk the raw counter history once, deriving non-negative deltas per
    // device and folding them into hour buckets. A counter that moved
    // backwards (device replaced, rollover) contributes zero, not a
    // negative delta.
    let points = source.device_metrics_since(since, tenant_ids).await?;
    let mut buckets: BTreeMap<i64, UsageBucket> = BTreeMap::new();
    let mut last_values: HashMap<String, DeviceMetricPoint> = HashMap::new();

    for point in points {
        if !serials.contains(&point.serial) {
            continue;
        }
        let bucket_ms = point.timestamp.timestamp_millis().div_euclid(MS_PER_HOUR) * MS_PER_HOUR;
        let bucket = buckets.entry(bucket_ms).or_default();

        if let Some(last) = last_values.get(&point.serial) {
            bucket.total += non_negative_delta(point.page_count, last.page_count);
            bucket.color += non_negative_delta(point.color_pages, last.color_pages);
            bucket.mono += non_negative_delta(point.mono_pages, last.mono_pages);
            bucket.scan += non_negative_delta(point.scan_count, last.scan_count);
        }
        last_values.insert(point.serial.clone(), point);
    }

    // Devices silent in the window still contribute lifetime totals from
    // their most recent known reading, but never to the history series.
    for d in &filtered {
        if last_values.contains_key(&d.serial) {
            continue;
        }
        match source.latest_device_metrics(&d.serial).await {
            Ok(Some(snapshot)) => {
                last_values.insert(d.serial.clone(), snapshot);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(serial = %d.serial, error = %e, "latest metrics lookup failed");
            }
        }
    }

    for (bucket_ms, bucket) in &buckets {
        let timestamp = from_millis(*bucket_ms);
        fleet.history.total_impressions.push(MetricSeriesPoint {
            timestamp,
            value: bucket.total,
        });
        fleet.history.mono_impressions.push(MetricSeriesPoint {
            timestamp,
            value: bucket.mono,
        });
        fleet.history.color_impressions.push(MetricSeriesPoint {
            timestamp,
            value: bucket.color,
        });
        fleet.history.scan_volume.push(MetricSeriesPoint {
            timestamp,
            value: bucket.scan,
        });
    }

    for d in &filtered {
        let snapshot = last_values.get(&d.serial);
        if let Some(s) = snapshot {
            fleet.totals.page_count += s.page_count;
            fleet.totals.color_pages += s.color_pages;
            fleet.totals.mono_pages += s.mono_pages;
            fleet.totals.scan_count += s.scan_count;
        }
        match consumables::classify_device(snapshot, d) {
            ConsumableBand::Critical => fleet.consumables.critical += 1,
            ConsumableBand::Low => fleet.consumables.low += 1,
            ConsumableBand::Medium => fleet.consumables.medium += 1,
            ConsumableBand::High => fleet.consumables.high += 1,
            ConsumableBand::Unknown => fleet.consumables.unknown += 1,
        }
    }

    Ok(AggregatedReport {
        generated_at: now,
        range_start: since,
        range_end: now,
        fleet,
        server,
    })
}

fn non_negative_delta(current: i64, previous: i64) -> i64 {
    if current >= previous {
        current - previous
    } else {
        0
    }
}

/// Scans a device's free-text status lines for health keywords.
/// Returns (has_error, has_warning, has_jam); a jam always implies error.
pub fn classify_status_messages(messages: &[String]) -> (bool, bool, bool) {
    let mut has_error = false;
    let mut has_warning = false;
    let mut has_jam = false;
    for msg in messages {
        let lower = msg.to_lowercase();
        if lower.contains("jam") {
            has_jam = true;
            has_error = true;
        } else if lower.contains("error") || lower.contains("fail") || lower.contains("offline") {
            has_error = true;
        } else if lower.contains("warn") || lower.contains("low") {
            has_warning = true;
        }
    }
    (has_error, has_warning, has_jam)
}
