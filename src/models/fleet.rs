// Dashboard report produced by the fleet aggregation engine.
// Computed fresh per request; never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::snapshot::{DatabaseStats, ServerRuntime};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: i64,
}

/// Fleet-wide counts: current agent/device totals plus lifetime usage
/// summed over each device's most recent counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetTotals {
    pub agents: i64,
    pub devices: i64,
    pub page_count: i64,
    pub color_pages: i64,
    pub mono_pages: i64,
    pub scan_count: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetStatuses {
    pub error: i64,
    pub warning: i64,
    pub jam: i64,
}

/// Device counts per consumable severity band.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetConsumables {
    pub critical: i64,
    pub low: i64,
    pub medium: i64,
    pub high: i64,
    pub unknown: i64,
}

/// Aligned hourly usage-delta series for charting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetHistory {
    pub total_impressions: Vec<MetricSeriesPoint>,
    pub mono_impressions: Vec<MetricSeriesPoint>,
    pub color_impressions: Vec<MetricSeriesPoint>,
    pub scan_volume: Vec<MetricSeriesPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetReport {
    pub totals: FleetTotals,
    pub statuses: FleetStatuses,
    pub consumables: FleetConsumables,
    pub history: FleetHistory,
}

/// Host process/database stats attached to a report by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub hostname: String,
    pub uptime_seconds: i64,
    pub runtime: ServerRuntime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseStats>,
}

/// The dashboard summary for one time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedReport {
    pub generated_at: DateTime<Utc>,
    pub range_start: DateTime<Utc>,
    pub range_end: DateTime<Utc>,
    pub fleet: FleetReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerStats>,
}
