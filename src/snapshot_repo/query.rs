// Query planning: resolution selection, decimation, chart-series building.

use super::{SnapshotRepo, to_millis};
use crate::models::{
    ALL_SERIES, MetricsSnapshot, Tier, TimeSeriesPoint, TimeSeriesQuery, TimeSeriesResult,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::instrument;

const DEFAULT_MAX_POINTS: usize = 1000;

/// Coarsest tier that still gives adequate chart resolution for the range.
/// Minute is never auto-selected; it is reachable only by explicit request.
pub fn pick_resolution(start: DateTime<Utc>, end: DateTime<Utc>) -> Tier {
    let duration = end - start;
    if duration <= Duration::hours(6) {
        Tier::Raw
    } else if duration <= Duration::days(7) {
        Tier::Hourly
    } else {
        Tier::Daily
    }
}

/// Bounds a result to max_points rows by stride sampling, then force-appends
/// the true last row if sampling skipped it. Output length is at most
/// max_points + 1 and the last element is always exact.
pub fn decimate(snapshots: Vec<MetricsSnapshot>, max_points: usize) -> Vec<MetricsSnapshot> {
    let len = snapshots.len();
    if len <= max_points || max_points == 0 {
        return snapshots;
    }
    let stride = len as f64 / max_points as f64;
    let mut out = Vec::with_capacity(max_points + 1);
    let mut last_sampled = 0usize;
    for i in 0..max_points {
        let idx = ((i as f64 * stride) as usize).min(len - 1);
        out.push(snapshots[idx].clone());
        last_sampled = idx;
    }
    if last_sampled != len - 1 {
        out.push(snapshots[len - 1].clone());
    }
    out
}

/// Projects snapshots onto named scalar series, one parallel point array
/// per series. Empty names means all known series.
pub fn build_chart_series(
    snapshots: &[MetricsSnapshot],
    names: &[String],
) -> BTreeMap<String, Vec<TimeSeriesPoint>> {
    let all: Vec<String>;
    let names: &[String] = if names.is_empty() {
        all = ALL_SERIES.iter().map(|s| s.to_string()).collect();
        &all
    } else {
        names
    };

    let mut result = BTreeMap::new();
    for name in names {
        let points = snapshots
            .iter()
            .map(|snap| TimeSeriesPoint {
                t: snap.timestamp.timestamp_millis(),
                v: snap.extract_series(name),
            })
            .collect();
        result.insert(name.clone(), points);
    }
    result
}

impl SnapshotRepo {
    /// Plans and runs a time-series query: fills defaults, picks a tier,
    /// fetches, decimates, and builds chart series. An unknown resolution
    /// string is an error; an empty range yields an empty result.
    ///
    /// Explicitly requested raw data over a range longer than 24h falls
    /// back to hourly when more than 2x max_points rows would transfer.
    /// The fallback keeps the displayed resolution implicit rather than
    /// re-decimating, matching the long-standing dashboard behavior.
    #[instrument(skip(self, q), fields(repo = "snapshot", operation = "query"))]
    pub async fn query(&self, q: TimeSeriesQuery) -> anyhow::Result<TimeSeriesResult> {
        let end = q.end.unwrap_or_else(Utc::now);
        let start = q.start.unwrap_or(end - Duration::hours(24));
        let max_points = q.max_points.unwrap_or(DEFAULT_MAX_POINTS);

        let (mut tier, explicit) = match q.resolution.as_deref() {
            None | Some("auto") => (pick_resolution(start, end), false),
            Some(s) => (Tier::from_str(s)?, true),
        };

        let from_ms = to_millis(start);
        let to_ms = to_millis(end);

        if explicit && tier == Tier::Raw && end - start > Duration::hours(24) {
            let count = self.count_in_range(Tier::Raw, from_ms, to_ms).await?;
            if count as usize > max_points * 2 {
                tier = Tier::Hourly;
            }
        }

        let mut snapshots = self.get_snapshots_by_time_range(tier, from_ms, to_ms).await?;
        if snapshots.len() > max_points {
            snapshots = decimate(snapshots, max_points);
        }

        let chart_series = build_chart_series(&snapshots, &q.series);

        Ok(TimeSeriesResult {
            start_time: start,
            end_time: end,
            resolution: tier,
            point_count: snapshots.len(),
            snapshots,
            chart_series,
        })
    }
}
