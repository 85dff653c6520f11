// Latest-snapshot sink: the whole snapshot as JSON under one key, overwritten every tick.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::{SnapshotSink, WriteReport};
use crate::models::Snapshot;
use crate::store::{StateStore, StoreError};

pub const DEFAULT_LATEST_KEY: &str = "system:info";

pub struct LatestSink {
    store: Arc<dyn StateStore>,
    key: String,
}

impl LatestSink {
    pub fn new(store: Arc<dyn StateStore>, key: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl SnapshotSink for LatestSink {
    fn name(&self) -> &'static str {
        "latest"
    }

    async fn check_liveness(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    async fn write(&self, test_id: &str, snapshot: &Snapshot) -> WriteReport {
        let mut report = WriteReport::new(1);
        let json = match serde_json::to_string(snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!(test_id, error = %e, "snapshot not serializable; tick dropped");
                report.failures.push(super::FieldFailure {
                    target: self.key.clone(),
                    error: StoreError::Command(e.to_string()),
                });
                return report;
            }
        };
        match self.store.set(&self.key, &json).await {
            Ok(()) => report.committed = true,
            Err(e) => {
                warn!(test_id, key = %self.key, error = %e, "latest snapshot write failed");
                report.failures.push(super::FieldFailure {
                    target: self.key.clone(),
                    error: e,
                });
            }
        }
        report
    }
}
