use serde::Deserialize;

use crate::models::Tier;
use crate::snapshot_repo::aggregation::{MS_PER_DAY, MS_PER_HOUR};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Per-tier retention horizons. Defaults: raw 2h, minute 7d, hourly 90d,
/// daily 365d.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub raw_hours: u32,
    pub minute_days: u32,
    pub hourly_days: u32,
    pub daily_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            raw_hours: 2,
            minute_days: 7,
            hourly_days: 90,
            daily_days: 365,
        }
    }
}

impl RetentionConfig {
    pub fn retention_ms(&self, tier: Tier) -> i64 {
        match tier {
            Tier::Raw => (self.raw_hours as i64) * MS_PER_HOUR,
            Tier::Minute => (self.minute_days as i64) * MS_PER_DAY,
            Tier::Hourly => (self.hourly_days as i64) * MS_PER_DAY,
            Tier::Daily => (self.daily_days as i64) * MS_PER_DAY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// How often the worker runs aggregation + retention pruning.
    pub aggregation_interval_secs: u64,
    /// Optional cron expression for VACUUM (e.g. "0 0 3 * * *" = 03:00 daily). Uses local time.
    pub vacuum_schedule: Option<String>,
    /// Run VACUUM every N seconds when vacuum_schedule is not set.
    pub vacuum_interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            aggregation_interval_secs: 300,
            vacuum_schedule: None,
            vacuum_interval_secs: 86_400,
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.retention.raw_hours > 0,
            "retention.raw_hours must be > 0, got {}",
            self.retention.raw_hours
        );
        anyhow::ensure!(
            self.retention.minute_days > 0,
            "retention.minute_days must be > 0, got {}",
            self.retention.minute_days
        );
        anyhow::ensure!(
            self.retention.hourly_days > 0,
            "retention.hourly_days must be > 0, got {}",
            self.retention.hourly_days
        );
        anyhow::ensure!(
            self.retention.daily_days > 0,
            "retention.daily_days must be > 0, got {}",
            self.retention.daily_days
        );
        anyhow::ensure!(
            self.maintenance.aggregation_interval_secs > 0,
            "maintenance.aggregation_interval_secs must be > 0, got {}",
            self.maintenance.aggregation_interval_secs
        );
        anyhow::ensure!(
            self.maintenance.vacuum_interval_secs > 0,
            "maintenance.vacuum_interval_secs must be > 0, got {}",
            self.maintenance.vacuum_interval_secs
        );
        Ok(())
    }
}
