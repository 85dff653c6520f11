// Shared state store: atomic counters, hashes and pub/sub.
// Redis in production; the in-process backend serves tests and single-host runs.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("store command failed: {0}")]
    Command(String),

    #[error("value at {key} is not numeric: {value:?}")]
    NotNumeric { key: String, value: String },
}

impl StoreError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, StoreError::Unreachable(_))
    }
}

/// Operations the monitor needs from the shared store. All mutation of aggregate
/// fields goes through the atomic increment primitives.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError>;
    async fn incr_by_float(&self, key: &str, delta: f64) -> Result<f64, StoreError>;
    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError>;
    async fn hincr_by_float(&self, key: &str, field: &str, delta: f64)
    -> Result<f64, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;
    /// Returns true when the field was written (it did not exist yet).
    async fn hset_if_absent(&self, key: &str, field: &str, value: &str)
    -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;
    async fn hlen(&self, key: &str) -> Result<usize, StoreError>;

    /// Returns the number of subscribers that received the payload.
    async fn publish(&self, channel: &str, payload: &str) -> Result<usize, StoreError>;
    /// Stream of payloads published on `channel` after this call returns.
    /// The stream ends when the underlying connection is lost.
    async fn subscribe(&self, channel: &str) -> Result<BoxStream<'static, String>, StoreError>;
}

/// One write against the store, planned ahead of execution so a tick's writes are plain data.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    IncrBy { key: String, delta: i64 },
    IncrByFloat { key: String, delta: f64 },
    HIncrBy { key: String, field: String, delta: i64 },
    HIncrByFloat { key: String, field: String, delta: f64 },
    HSet { key: String, field: String, value: String },
    HSetIfAbsent { key: String, field: String, value: String },
}

impl StoreOp {
    pub fn key(&self) -> &str {
        match self {
            StoreOp::IncrBy { key, .. }
            | StoreOp::IncrByFloat { key, .. }
            | StoreOp::HIncrBy { key, .. }
            | StoreOp::HIncrByFloat { key, .. }
            | StoreOp::HSet { key, .. }
            | StoreOp::HSetIfAbsent { key, .. } => key,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            StoreOp::IncrBy { .. } | StoreOp::IncrByFloat { .. } => None,
            StoreOp::HIncrBy { field, .. }
            | StoreOp::HIncrByFloat { field, .. }
            | StoreOp::HSet { field, .. }
            | StoreOp::HSetIfAbsent { field, .. } => Some(field),
        }
    }

    /// "key" or "key/field", for logs.
    pub fn target(&self) -> String {
        match self.field() {
            Some(field) => format!("{}/{}", self.key(), field),
            None => self.key().to_string(),
        }
    }

    pub async fn apply(&self, store: &dyn StateStore) -> Result<(), StoreError> {
        match self {
            StoreOp::IncrBy { key, delta } => store.incr_by(key, *delta).await.map(drop),
            StoreOp::IncrByFloat { key, delta } => {
                store.incr_by_float(key, *delta).await.map(drop)
            }
            StoreOp::HIncrBy { key, field, delta } => {
                store.hincr_by(key, field, *delta).await.map(drop)
            }
            StoreOp::HIncrByFloat { key, field, delta } => {
                store.hincr_by_float(key, field, *delta).await.map(drop)
            }
            StoreOp::HSet { key, field, value } => store.hset(key, field, value).await,
            StoreOp::HSetIfAbsent { key, field, value } => {
                store.hset_if_absent(key, field, value).await.map(drop)
            }
        }
    }
}
