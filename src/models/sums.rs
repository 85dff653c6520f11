// Running sums for one test: a pure fold over snapshots and the read-time reduction.
// The aggregate sink writes the same deltas to the shared store with atomic increments,
// and the reader rebuilds this value from the store before reducing it.

use std::collections::BTreeMap;

use super::ranking::rank_by_load;
use super::units::{bytes_to_mb, truncate_2dp};
use super::{AggregateReport, MemoryDetail, MemoryReport, MemoryStat, ProcessReport, Snapshot};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySums {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub used_percent: f64,
}

impl MemorySums {
    fn add(self, stat: &MemoryStat) -> Self {
        Self {
            total: self.total.saturating_add(stat.total),
            used: self.used.saturating_add(stat.used),
            available: self.available.saturating_add(stat.available),
            used_percent: self.used_percent + stat.used_percent,
        }
    }

    fn average(&self, steps: u64) -> MemoryReport {
        let steps = steps as f64;
        MemoryReport {
            total_mb: bytes_to_mb(self.total as f64 / steps),
            used_mb: bytes_to_mb(self.used as f64 / steps),
            available_mb: bytes_to_mb(self.available as f64 / steps),
            used_percent: truncate_2dp(self.used_percent / steps),
        }
    }
}

/// Cumulative CPU/memory percent plus the last known descriptive fields of one pid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessSums {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub working_dir: Option<String>,
    pub created_at: Option<String>,
    pub num_threads: Option<u32>,
    pub memory_detail: Option<MemoryDetail>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateSums {
    pub steps: u64,
    pub cpu_percent: f64,
    pub virtual_memory: MemorySums,
    pub swap_memory: MemorySums,
    pub processes: BTreeMap<u32, ProcessSums>,
}

impl AggregateSums {
    /// Folds one tick into the sums. Name, working dir and creation time keep their first
    /// value; status, thread count and memory detail take the latest.
    pub fn fold(self, snapshot: &Snapshot) -> Self {
        let mut processes = self.processes;
        for p in &snapshot.processes {
            let entry = processes.entry(p.pid).or_default();
            entry.cpu_percent += p.cpu_percent;
            entry.memory_percent += p.memory_percent;
            entry.name.get_or_insert_with(|| p.name.clone());
            entry.working_dir.get_or_insert_with(|| p.working_dir.clone());
            entry.created_at.get_or_insert_with(|| p.created_at.clone());
            entry.status = Some(p.status.clone());
            entry.num_threads = Some(p.num_threads);
            entry.memory_detail = Some(p.memory_detail.clone());
        }
        Self {
            steps: self.steps + 1,
            cpu_percent: self.cpu_percent + snapshot.cpu_percent,
            virtual_memory: self.virtual_memory.add(&snapshot.virtual_memory),
            swap_memory: self.swap_memory.add(&snapshot.swap_memory),
            processes,
        }
    }

    /// Averages every sum over `steps`. `None` when no tick was folded.
    ///
    /// Per-pid sums divide by the global step count, so a pid seen in only some ticks
    /// reports a proportionally lower average.
    pub fn report(&self, test_id: &str) -> Option<AggregateReport> {
        if self.steps == 0 {
            return None;
        }
        let steps = self.steps as f64;
        let mut processes: Vec<ProcessReport> = self
            .processes
            .iter()
            .map(|(pid, p)| ProcessReport {
                pid: *pid,
                name: p.name.clone().unwrap_or_default(),
                status: p.status.clone().unwrap_or_default(),
                working_dir: p.working_dir.clone().unwrap_or_default(),
                created_at: p.created_at.clone().unwrap_or_default(),
                memory_detail: p.memory_detail.clone(),
                num_threads: p.num_threads.unwrap_or(0),
                memory_percent: truncate_2dp(p.memory_percent / steps),
                cpu_percent: truncate_2dp(p.cpu_percent / steps),
            })
            .collect();
        rank_by_load(&mut processes);

        Some(AggregateReport {
            test_id: test_id.to_string(),
            steps: self.steps,
            cpu_percent: truncate_2dp(self.cpu_percent / steps),
            virtual_memory: self.virtual_memory.average(self.steps),
            swap_memory: self.swap_memory.average(self.steps),
            processes,
        })
    }
}
