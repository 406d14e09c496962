// Tiered snapshot record, payload types, and chart series projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Resolution tier a snapshot is stored at. Raw rows come from the live
/// collector; the other tiers are produced by aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Raw,
    Minute,
    Hourly,
    Daily,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown resolution tier: {0:?}")]
pub struct ParseTierError(pub String);

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Raw => "raw",
            Tier::Minute => "minute",
            Tier::Hourly => "hourly",
            Tier::Daily => "daily",
        }
    }
}

impl FromStr for Tier {
    type Err = ParseTierError;

    /// Strict parse; an unsupported resolution must fail, never silently
    /// fall back to another tier.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Tier::Raw),
            "minute" => Ok(Tier::Minute),
            "hourly" => Ok(Tier::Hourly),
            "daily" => Ok(Tier::Daily),
            other => Err(ParseTierError(other.to_string())),
        }
    }
}

/// Fleet-wide counters captured at one point in time. All fields fold with
/// max across an aggregation bucket (peak-in-period / worst case).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FleetCounters {
    pub total_agents: i64,
    pub total_devices: i64,
    pub agents_ws: i64,
    pub agents_http: i64,
    pub agents_offline: i64,
    pub total_pages: i64,
    pub color_pages: i64,
    pub mono_pages: i64,
    pub scan_count: i64,
    pub toner_high: i64,
    pub toner_medium: i64,
    pub toner_low: i64,
    pub toner_critical: i64,
    pub toner_unknown: i64,
    pub devices_online: i64,
    pub devices_offline: i64,
    pub devices_error: i64,
    pub devices_warning: i64,
    pub devices_jam: i64,
}

/// Server process and store gauges. Runtime fields fold with the mean;
/// db_* fields fold with max.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerRuntime {
    pub threads: i64,
    pub heap_alloc_mb: i64,
    pub heap_sys_mb: i64,
    pub total_alloc_mb: i64,
    pub sys_mb: i64,
    pub gc_pause_ns: i64,
    pub ws_connections: i64,
    pub ws_agents: i64,
    pub db_size_bytes: i64,
    pub db_agents: i64,
    pub db_devices: i64,
    pub db_metrics_rows: i64,
}

/// One time-stamped metric record at a resolution tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub tier: Tier,
    pub fleet: FleetCounters,
    pub server: ServerRuntime,
}

impl MetricsSnapshot {
    pub fn new(timestamp: DateTime<Utc>, tier: Tier) -> Self {
        Self {
            timestamp,
            tier,
            fleet: FleetCounters::default(),
            server: ServerRuntime::default(),
        }
    }

    /// Scalar value of one named chart series. Unknown names yield 0.0.
    pub fn extract_series(&self, name: &str) -> f64 {
        match name {
            "threads" => self.server.threads as f64,
            "heap_alloc" => self.server.heap_alloc_mb as f64,
            "total_alloc" => self.server.total_alloc_mb as f64,
            "db_size" => self.server.db_size_bytes as f64,
            "ws_connections" => self.server.ws_connections as f64,
            "total_pages" => self.fleet.total_pages as f64,
            "color_pages" => self.fleet.color_pages as f64,
            "mono_pages" => self.fleet.mono_pages as f64,
            "scan_count" => self.fleet.scan_count as f64,
            "toner_high" => self.fleet.toner_high as f64,
            "toner_medium" => self.fleet.toner_medium as f64,
            "toner_low" => self.fleet.toner_low as f64,
            "toner_critical" => self.fleet.toner_critical as f64,
            "devices_online" => self.fleet.devices_online as f64,
            "devices_error" => self.fleet.devices_error as f64,
            "agents" => self.fleet.total_agents as f64,
            "devices" => self.fleet.total_devices as f64,
            "agents_ws" => self.fleet.agents_ws as f64,
            "agents_http" => self.fleet.agents_http as f64,
            "agents_offline" => self.fleet.agents_offline as f64,
            _ => 0.0,
        }
    }
}

/// Every chart series name a snapshot can project onto.
pub const ALL_SERIES: &[&str] = &[
    "threads",
    "heap_alloc",
    "total_alloc",
    "db_size",
    "ws_connections",
    "total_pages",
    "color_pages",
    "mono_pages",
    "scan_count",
    "toner_high",
    "toner_medium",
    "toner_low",
    "toner_critical",
    "devices_online",
    "devices_error",
    "agents",
    "devices",
    "agents_ws",
    "agents_http",
    "agents_offline",
];

/// A single chart point; unix milliseconds keep the JSON compact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub t: i64,
    pub v: f64,
}

/// Parameters for a time-series query. Unset fields use defaults:
/// end = now, start = end - 24h, resolution = auto, max_points = 1000.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// "auto", "raw", "minute", "hourly", or "daily". None means auto.
    pub resolution: Option<String>,
    /// Series to include in chart_series; empty means all.
    pub series: Vec<String>,
    pub max_points: Option<usize>,
}

/// Result of a time-series query, after tier selection and decimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesResult {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub resolution: Tier,
    pub point_count: usize,
    pub snapshots: Vec<MetricsSnapshot>,
    pub chart_series: std::collections::BTreeMap<String, Vec<TimeSeriesPoint>>,
}

/// High-level store counts for observability panels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStats {
    pub snapshot_rows: i64,
    pub size_bytes: i64,
}
