// Background maintenance loop. Each tick promotes tiers and prunes
// expired rows; VACUUM runs on its own schedule. Every step is
// idempotent, so an ad-hoc run_one_tick alongside the loop is safe.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::MaintenanceConfig;
use crate::snapshot_repo::SnapshotRepo;
use tracing::{info, instrument, warn};

/// Starts the maintenance loop; abort the returned handle to stop it.
pub fn spawn(repo: Arc<SnapshotRepo>, config: MaintenanceConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        run(repo, config).await;
    })
}

#[instrument(skip(repo), fields(interval_secs = config.aggregation_interval_secs))]
async fn run(repo: Arc<SnapshotRepo>, config: MaintenanceConfig) {
    let mut agg_interval =
        tokio::time::interval(Duration::from_secs(config.aggregation_interval_secs));
    agg_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let (vacuum_tx, mut vacuum_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(vacuum_timer(config.clone(), vacuum_tx));

    loop {
        tokio::select! {
            _ = agg_interval.tick() => {
                if let Err(e) = run_one_tick(&repo).await {
                    warn!(error = %e, "maintenance tick failed");
                }
            }
            _ = vacuum_rx.recv() => {
                if let Err(e) = repo.vacuum().await {
                    warn!(error = %e, "vacuum failed");
                } else {
                    info!("vacuum complete");
                }
            }
        }
    }
}

/// Wakes the worker whenever a VACUUM is due. A cron expression is
/// evaluated against local wall-clock time; without one, a plain fixed
/// interval applies.
async fn vacuum_timer(config: MaintenanceConfig, tx: tokio::sync::mpsc::Sender<()>) {
    if let Some(ref cron_str) = config.vacuum_schedule {
        let Ok(schedule) = cron::Schedule::from_str(cron_str) else {
            warn!(cron = %cron_str, "invalid vacuum_schedule; VACUUM will not run");
            return;
        };
        loop {
            let now = chrono::Local::now();
            let next = schedule.after(&now).next();
            if let Some(next) = next {
                let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(delay).await;
                if tx.send(()).await.is_err() {
                    break;
                }
            } else {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    } else {
        let interval = Duration::from_secs(config.vacuum_interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            if tx.send(()).await.is_err() {
                break;
            }
        }
    }
}

/// Runs one maintenance pass (tier promotions, then retention pruning).
/// Used by the worker loop and callable directly on any schedule.
pub async fn run_one_tick(repo: &SnapshotRepo) -> anyhow::Result<()> {
    repo.run_aggregation().await?;
    let deleted = repo.run_retention_prune().await?;
    if deleted > 0 {
        info!(rows_deleted = deleted, "retention prune");
    }
    Ok(())
}
