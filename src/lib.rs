// fleetmetrics: tiered time-series rollup and fleet aggregation for
// printer-fleet dashboards. Consumed as a library by the HTTP layer.

pub mod collector;
pub mod config;
pub mod fleet;
pub mod maintenance_worker;
pub mod models;
pub mod snapshot_repo;
