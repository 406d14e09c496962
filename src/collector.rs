// Server runtime gauge sampling via sysinfo. Builds the ServerRuntime
// payload for raw snapshots; counts the host cannot observe (connections,
// store stats) are injected by the caller.

use crate::models::{FleetCounters, MetricsSnapshot, ServerRuntime, Tier};
use chrono::Utc;
use std::sync::Arc;
use sysinfo::{ProcessesToUpdate, System, get_current_pid};

const BYTES_PER_MB: u64 = 1024 * 1024;

pub struct CollectorRepo {
    sys: Arc<std::sync::Mutex<System>>,
}

impl Default for CollectorRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectorRepo {
    pub fn new() -> Self {
        Self {
            sys: Arc::new(std::sync::Mutex::new(System::new())),
        }
    }

    /// Samples the current process: resident memory, virtual memory, and a
    /// thread estimate. Fields sysinfo cannot provide stay zero for the
    /// caller to fill in.
    pub async fn sample_server_runtime(&self) -> anyhow::Result<ServerRuntime> {
        let sys = self.sys.clone();
        tokio::task::spawn_blocking(move || {
            let mut sys = sys
                .lock()
                .map_err(|e| anyhow::anyhow!("sysinfo lock poisoned: {}", e))?;
            let pid =
                get_current_pid().map_err(|e| anyhow::anyhow!("current pid: {}", e))?;
            sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            let Some(proc_) = sys.process(pid) else {
                return Ok(ServerRuntime::default());
            };

            // Task list is Linux-only in sysinfo; elsewhere report one thread.
            #[cfg(target_os = "linux")]
            let threads = proc_.tasks().map(|t| t.len() as i64).unwrap_or(1);
            #[cfg(not(target_os = "linux"))]
            let threads = 1i64;

            Ok(ServerRuntime {
                threads,
                heap_alloc_mb: (proc_.memory() / BYTES_PER_MB) as i64,
                heap_sys_mb: (proc_.memory() / BYTES_PER_MB) as i64,
                total_alloc_mb: 0,
                sys_mb: (proc_.virtual_memory() / BYTES_PER_MB) as i64,
                gc_pause_ns: 0,
                ws_connections: 0,
                ws_agents: 0,
                db_size_bytes: 0,
                db_agents: 0,
                db_devices: 0,
                db_metrics_rows: 0,
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?
    }
}

/// Stamps a fully assembled raw snapshot at the current time.
pub fn build_snapshot(fleet: FleetCounters, server: ServerRuntime) -> MetricsSnapshot {
    MetricsSnapshot {
        timestamp: Utc::now(),
        tier: Tier::Raw,
        fleet,
        server,
    }
}
