// Instantaneous host snapshot as produced by the metrics probe

use serde::{Deserialize, Serialize};

use super::units::bytes_to_mb;

/// Memory totals in bytes; MB views are floor-converted on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStat {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub used_percent: f64,
}

impl MemoryStat {
    pub fn total_mb(&self) -> f64 {
        bytes_to_mb(self.total as f64)
    }

    pub fn used_mb(&self) -> f64 {
        bytes_to_mb(self.used as f64)
    }

    pub fn available_mb(&self) -> f64 {
        bytes_to_mb(self.available as f64)
    }
}

/// Per-process memory breakdown in bytes. Stored as an opaque JSON blob per pid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryDetail {
    pub rss: u64,
    pub vms: u64,
    pub data: u64,
    pub stack: u64,
    pub locked: u64,
    pub swap: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStat {
    pub pid: u32,
    pub name: String,
    pub status: String,
    pub working_dir: String,
    /// Local time, "Jan 02, 2006 15:04:05" layout.
    pub created_at: String,
    pub memory_detail: MemoryDetail,
    pub memory_percent: f64,
    pub num_threads: u32,
    pub cpu_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub cpu_percent: f64,
    pub virtual_memory: MemoryStat,
    pub swap_memory: MemoryStat,
    pub processes: Vec<ProcessStat>,
}

impl Snapshot {
    /// Zero/empty snapshot used when the probe is unavailable.
    pub fn empty() -> Self {
        Self::default()
    }
}
