// Snapshot sinks: where a polling session puts each tick's snapshot.
// "aggregate" folds it into per-test running sums; "latest" overwrites a single key.

pub mod aggregate;
pub mod keys;
pub mod latest;

pub use aggregate::{AggregateSink, WritePlan, plan_writes};
pub use latest::LatestSink;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::{MonitoringConfig, SinkStrategy};
use crate::error::Error;
use crate::models::Snapshot;
use crate::store::{StateStore, StoreError, StoreOp};

#[async_trait]
pub trait SnapshotSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check_liveness(&self) -> Result<(), StoreError>;

    /// Attempts every write for one tick; failures are collected, never short-circuit.
    async fn write(&self, test_id: &str, snapshot: &Snapshot) -> WriteReport;
}

#[derive(Debug, Clone)]
pub struct FieldFailure {
    /// "key" or "key/field".
    pub target: String,
    pub error: StoreError,
}

/// Outcome of one tick's writes.
#[derive(Debug, Clone, Default)]
pub struct WriteReport {
    pub attempted: usize,
    pub failures: Vec<FieldFailure>,
    /// The tick counts: its step (or the latest snapshot) persisted.
    pub committed: bool,
}

impl WriteReport {
    pub fn new(attempted: usize) -> Self {
        Self {
            attempted,
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> usize {
        self.attempted.saturating_sub(self.failures.len())
    }

    /// Any failure looked like lost connectivity rather than a rejected command.
    pub fn unreachable(&self) -> bool {
        self.failures.iter().any(|f| f.error.is_unreachable())
    }

    pub(crate) fn record(&mut self, op: &StoreOp, error: StoreError) {
        let target = op.target();
        let err = Error::StoreWriteFailed {
            key: target.clone(),
            source: error.clone(),
        };
        debug!(error = %err, "field skipped for this tick");
        self.failures.push(FieldFailure { target, error });
    }
}

/// Builds the sink selected by `monitoring.strategy`.
pub fn build(config: &MonitoringConfig, store: Arc<dyn StateStore>) -> Arc<dyn SnapshotSink> {
    match config.strategy {
        SinkStrategy::Aggregate => Arc::new(AggregateSink::new(store)),
        SinkStrategy::Latest => Arc::new(LatestSink::new(store, &config.latest_key)),
    }
}
