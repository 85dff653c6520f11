// Metrics probe: one instantaneous host snapshot per call, via sysinfo

mod linux;

use async_trait::async_trait;
use chrono::TimeZone;
use std::sync::Arc;
use sysinfo::{Process, ProcessesToUpdate, System};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::models::{
    MemoryDetail, MemoryStat, ProcessStat, Snapshot, percent_of, rank_by_load, truncate_2dp,
};

/// Layout of `ProcessStat::created_at`, e.g. "Jan 02, 2006 15:04:05".
pub const CREATED_AT_FORMAT: &str = "%b %d, %Y %H:%M:%S";

/// Placeholder for per-process text fields the OS would not give us.
const UNREADABLE: &str = "unreadable";

/// Source of host snapshots. Partial failures are absorbed into zero/empty fields;
/// `Err` means nothing could be read at all.
#[async_trait]
pub trait MetricsProbe: Send + Sync {
    async fn sample(&self) -> Result<Snapshot>;
}

struct ProbeState {
    sys: System,
    primed: bool,
}

pub struct SysinfoProbe {
    state: Arc<std::sync::Mutex<ProbeState>>,
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        Self {
            state: Arc::new(std::sync::Mutex::new(ProbeState { sys, primed: false })),
        }
    }
}

#[async_trait]
impl MetricsProbe for SysinfoProbe {
    #[instrument(skip(self), fields(probe = "sysinfo", operation = "sample"))]
    async fn sample(&self) -> Result<Snapshot> {
        let state = self.state.clone();
        tokio::task::spawn_blocking(move || {
            let mut state = state
                .lock()
                .map_err(|e| Error::ProbeUnavailable(format!("sysinfo lock poisoned: {}", e)))?;
            Ok(state.collect())
        })
        .await
        .map_err(|e| Error::ProbeUnavailable(format!("sysinfo task join: {}", e)))?
    }
}

impl ProbeState {
    fn collect(&mut self) -> Snapshot {
        self.sys.refresh_cpu_all();
        self.sys.refresh_memory();
        self.sys.refresh_processes(ProcessesToUpdate::All, true);
        if !self.primed {
            // CPU usage is a delta between two refreshes; the first sample needs a baseline.
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            self.sys.refresh_cpu_all();
            self.sys.refresh_processes(ProcessesToUpdate::All, true);
            self.primed = true;
        }

        let cpu_percent = mean_cpu_percent(self.sys.cpus().iter().map(|c| c.cpu_usage() as f64))
            .unwrap_or_else(|| {
                debug!("no cpu info found");
                0.0
            });
        let total_memory = self.sys.total_memory();
        let virtual_memory = memory_stat(
            total_memory,
            self.sys.used_memory(),
            self.sys.available_memory(),
        );
        let swap_memory = memory_stat(
            self.sys.total_swap(),
            self.sys.used_swap(),
            self.sys.free_swap(),
        );

        let mut processes: Vec<ProcessStat> = self
            .sys
            .processes()
            .values()
            .map(|p| process_stat(p, total_memory))
            .collect();
        rank_by_load(&mut processes);

        debug!(
            cpu_percent,
            memory_percent = virtual_memory.used_percent,
            process_count = processes.len(),
            "host sampled"
        );

        Snapshot {
            cpu_percent,
            virtual_memory,
            swap_memory,
            processes,
        }
    }
}

/// Mean of per-core usage, floored to two decimals. None when no core was reported.
fn mean_cpu_percent(per_core: impl Iterator<Item = f64>) -> Option<f64> {
    let (count, total) = per_core.fold((0u32, 0.0), |(n, sum), v| (n + 1, sum + v));
    if count == 0 {
        return None;
    }
    Some(truncate_2dp((total / count as f64).clamp(0.0, 100.0)))
}

fn memory_stat(total: u64, used: u64, available: u64) -> MemoryStat {
    MemoryStat {
        total,
        used,
        available,
        used_percent: percent_of(used, total),
    }
}

fn process_stat(process: &Process, total_memory: u64) -> ProcessStat {
    let pid = process.pid().as_u32();
    let proc_status = linux::read_proc_status(pid).unwrap_or_default();

    let name = process.name().to_string_lossy().into_owned();
    let name = if name.is_empty() {
        UNREADABLE.to_string()
    } else {
        name
    };
    let working_dir = process
        .cwd()
        .map(|p| p.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNREADABLE.to_string());
    let num_threads = proc_status
        .threads
        .or_else(|| process.tasks().map(|t| t.len().max(1) as u32))
        .unwrap_or(1);

    ProcessStat {
        pid,
        name,
        status: process.status().to_string(),
        working_dir,
        created_at: format_created_at(process.start_time()),
        memory_detail: MemoryDetail {
            rss: process.memory(),
            vms: process.virtual_memory(),
            data: proc_status.vm_data,
            stack: proc_status.vm_stack,
            locked: proc_status.vm_locked,
            swap: proc_status.vm_swap,
        },
        memory_percent: percent_of(process.memory(), total_memory),
        num_threads,
        cpu_percent: truncate_2dp(process.cpu_usage() as f64),
    }
}

/// Seconds since the epoch, local time, [`CREATED_AT_FORMAT`].
pub fn format_created_at(start_secs: u64) -> String {
    i64::try_from(start_secs)
        .ok()
        .and_then(|secs| chrono::Local.timestamp_opt(secs, 0).single())
        .map(|t| t.format(CREATED_AT_FORMAT).to_string())
        .unwrap_or_default()
}
