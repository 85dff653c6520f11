// Shared test helpers
#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stressmon::error::{Error, Result};
use stressmon::models::*;
use stressmon::probe::MetricsProbe;
use stressmon::store::{MemoryStore, StateStore, StoreError, StoreOp};

pub fn process(pid: u32, cpu_percent: f64, memory_percent: f64) -> ProcessStat {
    ProcessStat {
        pid,
        name: format!("proc-{}", pid),
        status: "running".into(),
        working_dir: "/srv".into(),
        created_at: "Jan 02, 2006 15:04:05".into(),
        memory_detail: MemoryDetail {
            rss: 1024,
            vms: 4096,
            ..Default::default()
        },
        memory_percent,
        num_threads: 2,
        cpu_percent,
    }
}

pub fn snapshot(cpu_percent: f64, processes: Vec<ProcessStat>) -> Snapshot {
    Snapshot {
        cpu_percent,
        processes,
        ..Snapshot::empty()
    }
}

pub fn with_swap(mut s: Snapshot, used_bytes: u64) -> Snapshot {
    s.swap_memory = MemoryStat {
        total: 4 * 1024 * 1024,
        used: used_bytes,
        available: 4 * 1024 * 1024 - used_bytes,
        used_percent: percent_of(used_bytes, 4 * 1024 * 1024),
    };
    s
}

/// Returns queued snapshots in order, then repeats the last one. `None` entries fail.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Option<Snapshot>>>,
    last: Mutex<Snapshot>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(script: Vec<Option<Snapshot>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Snapshot::empty()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn constant(s: Snapshot) -> Self {
        Self::new(vec![Some(s)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsProbe for ScriptedProbe {
    async fn sample(&self) -> Result<Snapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Some(s)) => {
                *self.last.lock().unwrap() = s.clone();
                Ok(s)
            }
            Some(None) => Err(Error::ProbeUnavailable("scripted failure".into())),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

/// Polls `cond` every 5ms for up to 2s.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if cond() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    cond()
}

/// Wraps a `MemoryStore` to simulate a store that stops answering, or a writer
/// that lands a tick between two of a reader's reads.
pub struct HookedStore {
    inner: Arc<MemoryStore>,
    stalled: AtomicBool,
    before_get: Mutex<Option<(String, Vec<StoreOp>)>>,
}

impl HookedStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            stalled: AtomicBool::new(false),
            before_get: Mutex::new(None),
        }
    }

    /// While stalled, `ping` and `subscribe` never complete.
    pub fn stall(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Applies `ops` once, right before the first `get` of `key` is served.
    pub fn before_get(&self, key: &str, ops: Vec<StoreOp>) {
        *self.before_get.lock().unwrap() = Some((key.to_string(), ops));
    }

    async fn wait_if_stalled(&self) {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl StateStore for HookedStore {
    async fn ping(&self) -> std::result::Result<(), StoreError> {
        self.wait_if_stalled().await;
        self.inner.ping().await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> std::result::Result<i64, StoreError> {
        self.inner.incr_by(key, delta).await
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> std::result::Result<f64, StoreError> {
        self.inner.incr_by_float(key, delta).await
    }

    async fn hincr_by(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> std::result::Result<i64, StoreError> {
        self.inner.hincr_by(key, field, delta).await
    }

    async fn hincr_by_float(
        &self,
        key: &str,
        field: &str,
        delta: f64,
    ) -> std::result::Result<f64, StoreError> {
        self.inner.hincr_by_float(key, field, delta).await
    }

    async fn set(&self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
        self.inner.set(key, value).await
    }

    async fn hset(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> std::result::Result<(), StoreError> {
        self.inner.hset(key, field, value).await
    }

    async fn hset_if_absent(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> std::result::Result<bool, StoreError> {
        self.inner.hset_if_absent(key, field, value).await
    }

    async fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
        let hook = {
            let mut pending = self.before_get.lock().unwrap();
            if matches!(pending.as_ref(), Some((k, _)) if k == key) {
                pending.take()
            } else {
                None
            }
        };
        if let Some((_, ops)) = hook {
            for op in ops {
                op.apply(self.inner.as_ref()).await?;
            }
        }
        self.inner.get(key).await
    }

    async fn hget(
        &self,
        key: &str,
        field: &str,
    ) -> std::result::Result<Option<String>, StoreError> {
        self.inner.hget(key, field).await
    }

    async fn hget_all(
        &self,
        key: &str,
    ) -> std::result::Result<HashMap<String, String>, StoreError> {
        self.inner.hget_all(key).await
    }

    async fn hlen(&self, key: &str) -> std::result::Result<usize, StoreError> {
        self.inner.hlen(key).await
    }

    async fn publish(
        &self,
        channel: &str,
        payload: &str,
    ) -> std::result::Result<usize, StoreError> {
        self.inner.publish(channel, payload).await
    }

    async fn subscribe(
        &self,
        channel: &str,
    ) -> std::result::Result<BoxStream<'static, String>, StoreError> {
        self.wait_if_stalled().await;
        self.inner.subscribe(channel).await
    }
}
