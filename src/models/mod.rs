// Domain models for the tiered snapshot store and fleet aggregation.

mod device;
mod fleet;
mod snapshot;

pub use device::{AgentRecord, DeviceMetricPoint, DeviceRecord, SupplyLevel, leading_number};
pub use fleet::{
    AggregatedReport, FleetConsumables, FleetHistory, FleetReport, FleetStatuses, FleetTotals,
    MetricSeriesPoint, ServerStats,
};
pub use snapshot::{
    ALL_SERIES, DatabaseStats, FleetCounters, MetricsSnapshot, ParseTierError, ServerRuntime, Tier,
    TimeSeriesPoint, TimeSeriesQuery, TimeSeriesResult,
};
