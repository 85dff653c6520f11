// In-process store with Redis semantics: string values, hash fields, numeric increments
// that initialise missing keys, and broadcast-backed pub/sub.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::broadcast;

use super::{StateStore, StoreError};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct Data {
    values: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    channels: HashMap<String, broadcast::Sender<String>>,
    offline: bool,
    failing_keys: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Data>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails as unreachable and open subscriptions end.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut data) = self.data.lock() {
            data.offline = offline;
            if offline {
                data.channels.clear();
            }
        }
    }

    /// Makes writes to `key` fail with a command error; other keys are unaffected.
    pub fn fail_writes_to(&self, key: &str) {
        if let Ok(mut data) = self.data.lock() {
            data.failing_keys.insert(key.to_string());
        }
    }

    /// Number of live subscriptions on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.data
            .lock()
            .ok()
            .and_then(|data| data.channels.get(channel).map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }

    fn with_data<T>(
        &self,
        f: impl FnOnce(&mut Data) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut data = self
            .data
            .lock()
            .map_err(|e| StoreError::Command(format!("memory store lock poisoned: {}", e)))?;
        if data.offline {
            return Err(StoreError::Unreachable("memory store offline".into()));
        }
        f(&mut data)
    }

    fn with_writable<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut Data) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        self.with_data(|data| {
            if data.failing_keys.contains(key) {
                return Err(StoreError::Command(format!("write to {} rejected", key)));
            }
            f(data)
        })
    }
}

fn parse_int(key: &str, value: Option<&String>) -> Result<i64, StoreError> {
    match value {
        None => Ok(0),
        Some(v) => v.parse().map_err(|_| StoreError::NotNumeric {
            key: key.to_string(),
            value: v.clone(),
        }),
    }
}

fn parse_float(key: &str, value: Option<&String>) -> Result<f64, StoreError> {
    match value {
        None => Ok(0.0),
        Some(v) => v.parse().map_err(|_| StoreError::NotNumeric {
            key: key.to_string(),
            value: v.clone(),
        }),
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.with_data(|_| Ok(()))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.with_writable(key, |data| {
            let next = parse_int(key, data.values.get(key))?
                .checked_add(delta)
                .ok_or_else(|| StoreError::Command(format!("increment on {} overflows", key)))?;
            data.values.insert(key.to_string(), next.to_string());
            Ok(next)
        })
    }

    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, StoreError> {
        self.with_writable(key, |data| {
            let next = parse_float(key, data.values.get(key))? + delta;
            data.values.insert(key.to_string(), next.to_string());
            Ok(next)
        })
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        self.with_writable(key, |data| {
            let hash = data.hashes.entry(key.to_string()).or_default();
            let next = parse_int(key, hash.get(field))?
                .checked_add(delta)
                .ok_or_else(|| StoreError::Command(format!("increment on {} overflows", key)))?;
            hash.insert(field.to_string(), next.to_string());
            Ok(next)
        })
    }

    async fn hincr_by_float(
        &self,
        key: &str,
        field: &str,
        delta: f64,
    ) -> Result<f64, StoreError> {
        self.with_writable(key, |data| {
            let hash = data.hashes.entry(key.to_string()).or_default();
            let next = parse_float(key, hash.get(field))? + delta;
            hash.insert(field.to_string(), next.to_string());
            Ok(next)
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.with_writable(key, |data| {
            data.values.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.with_writable(key, |data| {
            data.hashes
                .entry(key.to_string())
                .or_default()
                .insert(field.to_string(), value.to_string());
            Ok(())
        })
    }

    async fn hset_if_absent(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<bool, StoreError> {
        self.with_writable(key, |data| {
            let hash = data.hashes.entry(key.to_string()).or_default();
            if hash.contains_key(field) {
                return Ok(false);
            }
            hash.insert(field.to_string(), value.to_string());
            Ok(true)
        })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_data(|data| Ok(data.values.get(key).cloned()))
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.with_data(|data| Ok(data.hashes.get(key).and_then(|h| h.get(field)).cloned()))
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.with_data(|data| Ok(data.hashes.get(key).cloned().unwrap_or_default()))
    }

    async fn hlen(&self, key: &str) -> Result<usize, StoreError> {
        self.with_data(|data| Ok(data.hashes.get(key).map(|h| h.len()).unwrap_or(0)))
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<usize, StoreError> {
        self.with_data(|data| {
            Ok(data
                .channels
                .get(channel)
                .and_then(|tx| tx.send(payload.to_string()).ok())
                .unwrap_or(0))
        })
    }

    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>, StoreError> {
        let rx = self.with_data(|data| {
            Ok(data
                .channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe())
        })?;
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(payload) => return Some((payload, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "memory store subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });
        Ok(stream.boxed())
    }
}
