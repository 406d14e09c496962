// Consumable severity banding. Numeric supply readings win; free-text
// descriptions are a heuristic fallback. Across multiple supplies the
// worst band wins.

use crate::models::{DeviceMetricPoint, DeviceRecord, SupplyLevel, leading_number};
use std::collections::BTreeMap;

/// Severity bands in ascending order, so the worst band is the max.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConsumableBand {
    Unknown,
    High,
    Medium,
    Low,
    Critical,
}

/// Band for a numeric remaining-capacity percentage:
/// <=5 critical, <=15 low, <=60 medium, else high.
pub fn band_for_percentage(pct: f64) -> ConsumableBand {
    if pct <= 5.0 {
        ConsumableBand::Critical
    } else if pct <= 15.0 {
        ConsumableBand::Low
    } else if pct <= 60.0 {
        ConsumableBand::Medium
    } else {
        ConsumableBand::High
    }
}

/// Worst band over a device's supply-level map. Supplies with no usable
/// percentage are ignored.
pub fn band_from_supply_levels(levels: &BTreeMap<String, SupplyLevel>) -> ConsumableBand {
    let mut worst = ConsumableBand::Unknown;
    for level in levels.values() {
        if let Some(pct) = level.as_percent() {
            worst = worst.max(band_for_percentage(pct));
        }
    }
    worst
}

/// Worst band over free-text consumable descriptions, e.g.
/// "Black Toner Low" or "Drum 80%".
pub fn band_from_descriptions(entries: &[String]) -> ConsumableBand {
    let mut worst = ConsumableBand::Unknown;
    for entry in entries {
        let lower = entry.to_lowercase();
        if lower.contains("empty")
            || lower.contains("replace")
            || lower.contains("exhausted")
            || lower.contains("depleted")
            || lower.contains("very low")
            || lower.contains("near empty")
        {
            worst = worst.max(ConsumableBand::Critical);
        } else if lower.contains("low") {
            worst = worst.max(ConsumableBand::Low);
        } else if lower.contains("medium") || lower.contains("half") {
            worst = worst.max(ConsumableBand::Medium);
        } else if lower.contains("high")
            || lower.contains("full")
            || lower.contains("ok")
            || lower.contains("ready")
        {
            worst = worst.max(ConsumableBand::High);
        }
        if let Some(pct) = leading_number(entry) {
            worst = worst.max(band_for_percentage(pct));
        }
    }
    worst
}

/// Bands one device: numeric supply levels from its latest metric reading
/// first, then the device record's text descriptions, else Unknown.
pub fn classify_device(
    snapshot: Option<&DeviceMetricPoint>,
    device: &DeviceRecord,
) -> ConsumableBand {
    if let Some(s) = snapshot {
        let band = band_from_supply_levels(&s.supply_levels);
        if band != ConsumableBand::Unknown {
            return band;
        }
    }
    band_from_descriptions(&device.consumables)
}
