// Agent/device records and the per-device metric stream.
// These come from the CRUD layer through FleetDataSource; only the fields
// the aggregation engine reads are modeled here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub agent_id: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub serial: String,
    pub agent_id: String,
    /// Free-text status lines reported by the device (e.g. "Paper Jam").
    #[serde(default)]
    pub status_messages: Vec<String>,
    /// Free-text consumable descriptions, used when no numeric supply
    /// reading exists (e.g. "Black Toner Low", "Drum 80%").
    #[serde(default)]
    pub consumables: Vec<String>,
}

/// A remaining-supply reading. Devices report either a numeric percentage
/// or a descriptive string; one enum keeps the normalization in one place
/// instead of runtime type inspection at every call site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SupplyLevel {
    Percent(f64),
    Text(String),
}

impl SupplyLevel {
    /// Numeric percentage if one can be derived: direct for Percent,
    /// leading-number parse for Text (e.g. "42%" or "42 pct").
    pub fn as_percent(&self) -> Option<f64> {
        match self {
            SupplyLevel::Percent(p) => Some(*p),
            SupplyLevel::Text(s) => leading_number(s),
        }
    }
}

/// Parses the first run of digits (with optional decimal point) in `s`.
pub fn leading_number(s: &str) -> Option<f64> {
    let mut buf = String::new();
    for c in s.chars() {
        if c.is_ascii_digit() || c == '.' {
            buf.push(c);
        } else if !buf.is_empty() {
            break;
        }
    }
    if buf.is_empty() {
        return None;
    }
    buf.parse().ok()
}

/// One reading from the per-device metric history stream. Counters are
/// cumulative device lifetime totals and may reset when a device is
/// replaced or a counter rolls over.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetricPoint {
    pub serial: String,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub page_count: i64,
    pub color_pages: i64,
    pub mono_pages: i64,
    pub scan_count: i64,
    #[serde(default)]
    pub supply_levels: BTreeMap<String, SupplyLevel>,
}
