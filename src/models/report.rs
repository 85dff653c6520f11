// Averaged per-test report returned by the snapshot reader

use serde::{Deserialize, Serialize};

use super::MemoryDetail;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryReport {
    pub total_mb: f64,
    pub used_mb: f64,
    pub available_mb: f64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessReport {
    pub pid: u32,
    pub name: String,
    pub status: String,
    pub working_dir: String,
    pub created_at: String,
    pub memory_detail: Option<MemoryDetail>,
    pub num_threads: u32,
    pub memory_percent: f64,
    pub cpu_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub test_id: String,
    /// Ticks folded into the averages (the shared denominator).
    pub steps: u64,
    pub cpu_percent: f64,
    pub virtual_memory: MemoryReport,
    pub swap_memory: MemoryReport,
    /// Ranked by average load, heaviest first.
    pub processes: Vec<ProcessReport>,
}
