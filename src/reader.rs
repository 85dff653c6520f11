// Snapshot reader: rebuilds a test's running sums from the store and reduces them to a report.
// Runs on the caller's task; independent of any polling session.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::models::{
    AggregateReport, AggregateSums, MemoryDetail, MemorySums, ProcessReport, ProcessSums,
    Snapshot, truncate_2dp,
};
use crate::sink::keys::{AVAILABLE, PERCENT, PidTable, SessionKeys, TOTAL, USED};
use crate::store::StateStore;

pub struct SnapshotReader {
    store: Arc<dyn StateStore>,
}

impl SnapshotReader {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Averaged, ranked report for `test_id`. `None` while no tick has been committed.
    #[instrument(skip(self), fields(operation = "read"))]
    pub async fn read(&self, test_id: &str) -> Result<Option<AggregateReport>> {
        let sums = self.load_sums(test_id).await?;
        let report = sums.report(test_id);
        if report.is_none() {
            debug!("no committed ticks");
        }
        Ok(report)
    }

    /// Raw sums as stored. Unparseable values read as zero.
    ///
    /// Every tick bumps steps before its sums, so the denominator is re-read after the sums.
    /// A tick landing mid-read can then only skew averages low, never high.
    pub async fn load_sums(&self, test_id: &str) -> Result<AggregateSums> {
        let keys = SessionKeys::new(test_id);
        let steps_key = keys.steps();
        let started: u64 = parse_or_zero(&steps_key, self.store.get(&steps_key).await?.as_deref());
        if started == 0 {
            return Ok(AggregateSums::default());
        }

        let cpu_key = keys.cpu();
        let cpu_percent = parse_or_zero(&cpu_key, self.store.get(&cpu_key).await?.as_deref());
        let virtual_memory = self.load_memory(&keys.vm()).await?;
        let swap_memory = self.load_memory(&keys.swap()).await?;
        let processes = self.load_processes(&keys).await?;
        let steps: u64 = parse_or_zero(&steps_key, self.store.get(&steps_key).await?.as_deref());

        Ok(AggregateSums {
            steps,
            cpu_percent,
            virtual_memory,
            swap_memory,
            processes,
        })
    }

    /// One pid's averaged entry, read field by field. `None` when the pid never appeared.
    pub async fn read_process(&self, test_id: &str, pid: u32) -> Result<Option<ProcessReport>> {
        let keys = SessionKeys::new(test_id);
        let steps_key = keys.steps();
        let steps: u64 = parse_or_zero(&steps_key, self.store.get(&steps_key).await?.as_deref());
        if steps == 0 {
            return Ok(None);
        }

        let field = pid.to_string();
        let mut values: HashMap<PidTable, String> = HashMap::new();
        for table in PidTable::ALL {
            if let Some(v) = self.store.hget(&keys.pids(table), &field).await? {
                values.insert(table, v);
            }
        }
        if values.is_empty() {
            return Ok(None);
        }

        let mut sums = ProcessSums::default();
        for (table, value) in &values {
            apply_field(&mut sums, *table, pid, value);
        }
        let steps = steps as f64;
        Ok(Some(ProcessReport {
            pid,
            name: sums.name.unwrap_or_default(),
            status: sums.status.unwrap_or_default(),
            working_dir: sums.working_dir.unwrap_or_default(),
            created_at: sums.created_at.unwrap_or_default(),
            memory_detail: sums.memory_detail,
            num_threads: sums.num_threads.unwrap_or(0),
            memory_percent: truncate_2dp(sums.memory_percent / steps),
            cpu_percent: truncate_2dp(sums.cpu_percent / steps),
        }))
    }

    /// Snapshot written by the latest-snapshot sink under `key`.
    #[instrument(skip(self), fields(operation = "read_latest"))]
    pub async fn read_latest(&self, key: &str) -> Result<Option<Snapshot>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(error = %e, "latest snapshot is not valid JSON");
                Ok(None)
            }
        }
    }

    async fn load_memory(&self, key: &str) -> Result<MemorySums> {
        let hash = self.store.hget_all(key).await?;
        let field = |name: &str| hash.get(name).map(String::as_str);
        Ok(MemorySums {
            total: parse_or_zero(key, field(TOTAL)),
            used: parse_or_zero(key, field(USED)),
            available: parse_or_zero(key, field(AVAILABLE)),
            used_percent: parse_or_zero(key, field(PERCENT)),
        })
    }

    async fn load_processes(&self, keys: &SessionKeys) -> Result<BTreeMap<u32, ProcessSums>> {
        let mut processes: BTreeMap<u32, ProcessSums> = BTreeMap::new();
        if self.store.hlen(&keys.pids(PidTable::CpuPercent)).await? == 0
            && self.store.hlen(&keys.pids(PidTable::Names)).await? == 0
        {
            return Ok(processes);
        }
        for table in PidTable::ALL {
            let key = keys.pids(table);
            for (field, value) in self.store.hget_all(&key).await? {
                let Ok(pid) = field.parse::<u32>() else {
                    warn!(key = %key, field = %field, "ignoring non-pid field");
                    continue;
                };
                apply_field(processes.entry(pid).or_default(), table, pid, &value);
            }
        }
        Ok(processes)
    }
}

fn apply_field(sums: &mut ProcessSums, table: PidTable, pid: u32, value: &str) {
    match table {
        PidTable::Names => sums.name = Some(value.to_string()),
        PidTable::Status => sums.status = Some(value.to_string()),
        PidTable::Cwd => sums.working_dir = Some(value.to_string()),
        PidTable::CreationTime => sums.created_at = Some(value.to_string()),
        PidTable::NumThreads => sums.num_threads = value.parse().ok(),
        PidTable::MemPercent => sums.memory_percent = parse_or_zero(table.as_str(), Some(value)),
        PidTable::CpuPercent => sums.cpu_percent = parse_or_zero(table.as_str(), Some(value)),
        PidTable::MemoryInfo => match serde_json::from_str::<MemoryDetail>(value) {
            Ok(detail) => sums.memory_detail = Some(detail),
            Err(e) => warn!(pid, error = %e, "unreadable memory detail"),
        },
    }
}

fn parse_or_zero<T: FromStr + Default>(key: &str, value: Option<&str>) -> T {
    match value {
        None => T::default(),
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = v, "non-numeric value read as zero");
            T::default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_zero_is_lenient() {
        assert_eq!(parse_or_zero::<u64>("k", Some("12")), 12);
        assert_eq!(parse_or_zero::<u64>("k", Some("abc")), 0);
        assert_eq!(parse_or_zero::<u64>("k", None), 0);
        assert_eq!(parse_or_zero::<f64>("k", Some("60.5")), 60.5);
    }

    #[test]
    fn apply_field_routes_tables() {
        let mut sums = ProcessSums::default();
        apply_field(&mut sums, PidTable::CpuPercent, 1, "110");
        apply_field(&mut sums, PidTable::NumThreads, 1, "8");
        apply_field(&mut sums, PidTable::MemoryInfo, 1, r#"{"rss":1,"vms":2,"data":0,"stack":0,"locked":0,"swap":0}"#);
        assert_eq!(sums.cpu_percent, 110.0);
        assert_eq!(sums.num_threads, Some(8));
        assert_eq!(sums.memory_detail.map(|d| d.vms), Some(2));
    }
}
