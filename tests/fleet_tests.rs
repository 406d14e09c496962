// Fleet aggregation engine tests: counter deltas across resets, hourly
// bucketing, tenant filtering, status classification, consumable banding.

use chrono::{DateTime, Duration, DurationRound, TimeZone, Utc};
use fleetmetrics::fleet::consumables::{
    ConsumableBand, band_for_percentage, band_from_descriptions, band_from_supply_levels,
};
use fleetmetrics::fleet::{FleetDataSource, aggregate, classify_status_messages};
use fleetmetrics::models::*;
use std::collections::BTreeMap;

#[derive(Default)]
struct FakeSource {
    agents: Vec<AgentRecord>,
    devices: Vec<DeviceRecord>,
    points: Vec<DeviceMetricPoint>,
    latest: Vec<DeviceMetricPoint>,
}

impl FleetDataSource for FakeSource {
    async fn list_agents(&self) -> anyhow::Result<Vec<AgentRecord>> {
        Ok(self.agents.clone())
    }

    async fn list_devices(&self) -> anyhow::Result<Vec<DeviceRecord>> {
        Ok(self.devices.clone())
    }

    async fn device_metrics_since(
        &self,
        since: DateTime<Utc>,
        _tenant_ids: &[String],
    ) -> anyhow::Result<Vec<DeviceMetricPoint>> {
        let mut out: Vec<DeviceMetricPoint> = self
            .points
            .iter()
            .filter(|p| p.timestamp >= since)
            .cloned()
            .collect();
        out.sort_by_key(|p| p.timestamp);
        Ok(out)
    }

    async fn latest_device_metrics(
        &self,
        serial: &str,
    ) -> anyhow::Result<Option<DeviceMetricPoint>> {
        Ok(self.latest.iter().find(|p| p.serial == serial).cloned())
    }
}

fn agent(id: &str, tenant: &str) -> AgentRecord {
    AgentRecord {
        agent_id: id.into(),
        tenant_id: tenant.into(),
    }
}

fn device(serial: &str, agent_id: &str) -> DeviceRecord {
    DeviceRecord {
        serial: serial.into(),
        agent_id: agent_id.into(),
        ..Default::default()
    }
}

fn point(serial: &str, ts: DateTime<Utc>, pages: i64) -> DeviceMetricPoint {
    DeviceMetricPoint {
        serial: serial.into(),
        agent_id: "a1".into(),
        timestamp: ts,
        page_count: pages,
        color_pages: 0,
        mono_pages: 0,
        scan_count: 0,
        supply_levels: BTreeMap::new(),
    }
}

#[tokio::test]
async fn counter_reset_contributes_zero_never_negative() {
    let t0 = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
    let source = FakeSource {
        agents: vec![agent("a1", "t1")],
        devices: vec![device("D1", "a1")],
        points: vec![
            point("D1", t0, 100),
            point("D1", t0 + Duration::hours(1), 150),
            point("D1", t0 + Duration::hours(2), 90), // reset
            point("D1", t0 + Duration::hours(3), 140),
        ],
        latest: vec![],
    };

    let report = aggregate(&source, t0 - Duration::hours(1), &[], None)
        .await
        .unwrap();
    let history = &report.fleet.history.total_impressions;
    let deltas: Vec<i64> = history.iter().map(|p| p.value).collect();
    // First reading has no prior value; the 150->90 reset contributes zero.
    assert_eq!(deltas, vec![0, 50, 0, 50]);
    // Lifetime totals come from the last reading.
    assert_eq!(report.fleet.totals.page_count, 140);
}

#[tokio::test]
async fn deltas_accumulate_into_hour_buckets() {
    let t0 = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
    let source = FakeSource {
        agents: vec![agent("a1", "t1")],
        devices: vec![device("D1", "a1")],
        points: vec![
            point("D1", t0 + Duration::minutes(5), 100),
            point("D1", t0 + Duration::minutes(20), 130),
            point("D1", t0 + Duration::minutes(40), 160),
            point("D1", t0 + Duration::minutes(65), 200),
        ],
        latest: vec![],
    };

    let report = aggregate(&source, t0, &[], None).await.unwrap();
    let history = &report.fleet.history.total_impressions;
    assert_eq!(history.len(), 2);
    assert_eq!(
        history[0].timestamp,
        (t0 + Duration::minutes(5))
            .duration_trunc(Duration::hours(1))
            .unwrap()
    );
    assert_eq!(history[0].value, 60); // 30 + 30 within the first hour
    assert_eq!(history[1].value, 40);
    // All four series stay aligned.
    assert_eq!(report.fleet.history.mono_impressions.len(), 2);
    assert_eq!(report.fleet.history.scan_volume.len(), 2);
}

#[tokio::test]
async fn tenant_allow_list_filters_agents_and_devices() {
    let t0 = Utc::now() - Duration::hours(2);
    let source = FakeSource {
        agents: vec![agent("a1", "t1"), agent("a2", "t2")],
        devices: vec![device("D1", "a1"), device("D2", "a2")],
        points: vec![point("D1", t0, 10), point("D2", t0, 99)],
        latest: vec![],
    };

    let report = aggregate(&source, t0 - Duration::hours(1), &["t1".into()], None)
        .await
        .unwrap();
    assert_eq!(report.fleet.totals.agents, 1);
    assert_eq!(report.fleet.totals.devices, 1);
    // D2's reading is excluded from totals.
    assert_eq!(report.fleet.totals.page_count, 10);

    // Empty allow-list means every tenant.
    let report = aggregate(&source, t0 - Duration::hours(1), &[], None)
        .await
        .unwrap();
    assert_eq!(report.fleet.totals.agents, 2);
    assert_eq!(report.fleet.totals.devices, 2);
    assert_eq!(report.fleet.totals.page_count, 109);
}

#[tokio::test]
async fn silent_device_falls_back_to_latest_for_totals_only() {
    let t0 = Utc::now() - Duration::hours(1);
    let source = FakeSource {
        agents: vec![agent("a1", "t1")],
        devices: vec![device("D1", "a1")],
        points: vec![],
        latest: vec![point("D1", t0 - Duration::days(3), 5000)],
    };

    let report = aggregate(&source, t0, &[], None).await.unwrap();
    assert_eq!(report.fleet.totals.page_count, 5000);
    assert!(report.fleet.history.total_impressions.is_empty());
}

#[tokio::test]
async fn status_messages_tally_with_jam_implying_error() {
    let t0 = Utc::now() - Duration::hours(1);
    let mut jam_device = device("D1", "a1");
    jam_device.status_messages = vec!["Paper Jam in Tray 2".into()];
    let mut err_device = device("D2", "a1");
    err_device.status_messages = vec!["Fuser error".into()];
    let mut warn_device = device("D3", "a1");
    warn_device.status_messages = vec!["Toner low".into()];

    let source = FakeSource {
        agents: vec![agent("a1", "t1")],
        devices: vec![jam_device, err_device, warn_device, device("D4", "a1")],
        ..Default::default()
    };

    let report = aggregate(&source, t0, &[], None).await.unwrap();
    assert_eq!(report.fleet.statuses.jam, 1);
    assert_eq!(report.fleet.statuses.error, 2); // jam counts as error too
    assert_eq!(report.fleet.statuses.warning, 1);
}

#[test]
fn classify_status_messages_priorities() {
    let (err, warn, jam) = classify_status_messages(&["Paper jam".into()]);
    assert!(jam && err && !warn);
    let (err, warn, jam) = classify_status_messages(&["offline".into()]);
    assert!(err && !jam && !warn);
    let (err, warn, jam) = classify_status_messages(&[]);
    assert!(!err && !warn && !jam);
}

#[test]
fn banding_thresholds() {
    assert_eq!(band_for_percentage(3.0), ConsumableBand::Critical);
    assert_eq!(band_for_percentage(5.0), ConsumableBand::Critical);
    assert_eq!(band_for_percentage(10.0), ConsumableBand::Low);
    assert_eq!(band_for_percentage(15.0), ConsumableBand::Low);
    assert_eq!(band_for_percentage(50.0), ConsumableBand::Medium);
    assert_eq!(band_for_percentage(60.0), ConsumableBand::Medium);
    assert_eq!(band_for_percentage(80.0), ConsumableBand::High);
}

#[test]
fn worst_supply_wins() {
    let mut levels = BTreeMap::new();
    levels.insert("black".to_string(), SupplyLevel::Percent(80.0));
    levels.insert("cyan".to_string(), SupplyLevel::Percent(3.0));
    assert_eq!(band_from_supply_levels(&levels), ConsumableBand::Critical);

    let empty: BTreeMap<String, SupplyLevel> = BTreeMap::new();
    assert_eq!(band_from_supply_levels(&empty), ConsumableBand::Unknown);
}

#[test]
fn text_descriptions_classify_heuristically() {
    assert_eq!(
        band_from_descriptions(&["Black Toner Empty - Replace".into()]),
        ConsumableBand::Critical
    );
    assert_eq!(
        band_from_descriptions(&["toner low".into()]),
        ConsumableBand::Low
    );
    assert_eq!(
        band_from_descriptions(&["about half".into()]),
        ConsumableBand::Medium
    );
    assert_eq!(
        band_from_descriptions(&["Ready".into()]),
        ConsumableBand::High
    );
    assert_eq!(
        band_from_descriptions(&["Drum 80%".into()]),
        ConsumableBand::High
    );
    assert_eq!(
        band_from_descriptions(&["mystery".into()]),
        ConsumableBand::Unknown
    );
}

#[test]
fn supply_level_normalization() {
    assert_eq!(SupplyLevel::Percent(42.0).as_percent(), Some(42.0));
    assert_eq!(SupplyLevel::Text("42%".into()).as_percent(), Some(42.0));
    assert_eq!(
        SupplyLevel::Text("approx 12.5 percent".into()).as_percent(),
        Some(12.5)
    );
    assert_eq!(SupplyLevel::Text("unknown".into()).as_percent(), None);
}

#[tokio::test]
async fn consumable_bands_counted_per_device() {
    let t0 = Utc::now() - Duration::hours(1);
    let mut p1 = point("D1", t0, 10);
    p1.supply_levels
        .insert("black".into(), SupplyLevel::Percent(3.0));
    let mut p2 = point("D2", t0, 10);
    p2.supply_levels
        .insert("black".into(), SupplyLevel::Percent(80.0));

    let source = FakeSource {
        agents: vec![agent("a1", "t1")],
        devices: vec![device("D1", "a1"), device("D2", "a1"), device("D3", "a1")],
        points: vec![p1, p2],
        latest: vec![],
    };

    let report = aggregate(&source, t0 - Duration::hours(1), &[], None)
        .await
        .unwrap();
    assert_eq!(report.fleet.consumables.critical, 1);
    assert_eq!(report.fleet.consumables.high, 1);
    assert_eq!(report.fleet.consumables.unknown, 1);
}
