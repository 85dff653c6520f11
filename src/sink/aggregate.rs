// Running-aggregate sink: translates one snapshot into atomic increments and hash writes
// under the test's key namespace. Concurrent writers on other hosts stay correct because
// nothing here reads a value back before writing it.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{instrument, warn};

use super::keys::{AVAILABLE, PERCENT, PidTable, SessionKeys, TOTAL, USED};
use super::{SnapshotSink, WriteReport};
use crate::models::{MemoryStat, ProcessStat, Snapshot};
use crate::store::{StateStore, StoreError, StoreOp};

/// The writes for one tick. `steps` goes first; a tick only counts once it persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    pub steps: StoreOp,
    pub fields: Vec<StoreOp>,
}

impl WritePlan {
    pub fn op_count(&self) -> usize {
        1 + self.fields.len()
    }
}

/// Plans the store writes that fold `snapshot` into the aggregate of `test_id`.
pub fn plan_writes(test_id: &str, snapshot: &Snapshot) -> WritePlan {
    let keys = SessionKeys::new(test_id);
    let mut fields = Vec::with_capacity(9 + snapshot.processes.len() * PidTable::ALL.len());

    fields.push(StoreOp::IncrByFloat {
        key: keys.cpu(),
        delta: snapshot.cpu_percent,
    });
    push_memory(&mut fields, &keys.swap(), &snapshot.swap_memory);
    push_memory(&mut fields, &keys.vm(), &snapshot.virtual_memory);
    for process in &snapshot.processes {
        push_process(&mut fields, &keys, process);
    }

    WritePlan {
        steps: StoreOp::IncrBy {
            key: keys.steps(),
            delta: 1,
        },
        fields,
    }
}

fn byte_delta(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

fn push_memory(ops: &mut Vec<StoreOp>, key: &str, stat: &MemoryStat) {
    for (field, bytes) in [(TOTAL, stat.total), (USED, stat.used), (AVAILABLE, stat.available)] {
        ops.push(StoreOp::HIncrBy {
            key: key.to_string(),
            field: field.to_string(),
            delta: byte_delta(bytes),
        });
    }
    ops.push(StoreOp::HIncrByFloat {
        key: key.to_string(),
        field: PERCENT.to_string(),
        delta: stat.used_percent,
    });
}

fn push_process(ops: &mut Vec<StoreOp>, keys: &SessionKeys, p: &ProcessStat) {
    let pid = p.pid.to_string();
    let incr = |table: PidTable, delta: f64| StoreOp::HIncrByFloat {
        key: keys.pids(table),
        field: pid.clone(),
        delta,
    };
    let set_once = |table: PidTable, value: &str| StoreOp::HSetIfAbsent {
        key: keys.pids(table),
        field: pid.clone(),
        value: value.to_string(),
    };
    let set = |table: PidTable, value: String| StoreOp::HSet {
        key: keys.pids(table),
        field: pid.clone(),
        value,
    };

    ops.push(incr(PidTable::CpuPercent, p.cpu_percent));
    ops.push(incr(PidTable::MemPercent, p.memory_percent));
    ops.push(set_once(PidTable::Names, &p.name));
    ops.push(set_once(PidTable::Cwd, &p.working_dir));
    ops.push(set_once(PidTable::CreationTime, &p.created_at));
    ops.push(set(PidTable::Status, p.status.clone()));
    ops.push(set(PidTable::NumThreads, p.num_threads.to_string()));
    match serde_json::to_string(&p.memory_detail) {
        Ok(json) => ops.push(set(PidTable::MemoryInfo, json)),
        Err(e) => warn!(pid = p.pid, error = %e, "memory detail not serializable; skipped"),
    }
}

pub struct AggregateSink {
    store: Arc<dyn StateStore>,
}

impl AggregateSink {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SnapshotSink for AggregateSink {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    async fn check_liveness(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    #[instrument(
        skip(self, snapshot),
        fields(sink = "aggregate", processes = snapshot.processes.len())
    )]
    async fn write(&self, test_id: &str, snapshot: &Snapshot) -> WriteReport {
        let plan = plan_writes(test_id, snapshot);
        let mut report = WriteReport::new(plan.op_count());

        match plan.steps.apply(self.store.as_ref()).await {
            Ok(()) => report.committed = true,
            Err(e) => report.record(&plan.steps, e),
        }
        for op in &plan.fields {
            if let Err(e) = op.apply(self.store.as_ref()).await {
                report.record(op, e);
            }
        }

        if let Some(first) = report.failures.first() {
            warn!(
                test_id,
                failed = report.failures.len(),
                attempted = report.attempted,
                committed = report.committed,
                first_target = %first.target,
                error = %first.error,
                "aggregate writes failed; affected fields contribute nothing this tick"
            );
        }
        report
    }
}
