// Error taxonomy for the monitor core

use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The metrics probe could not answer; callers substitute an empty snapshot.
    #[error("metrics probe unavailable: {0}")]
    ProbeUnavailable(String),

    /// One aggregate field did not persist; the rest of the tick still runs.
    #[error("store write failed for {key}: {source}")]
    StoreWriteFailed {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Liveness probe or connection failed; ends the owning session or listener.
    #[error("store unreachable: {0}")]
    StoreUnreachable(String),

    #[error("malformed coordination message: {0}")]
    ProtocolDecode(#[from] serde_json::Error),

    /// Start while active, or stop while idle. State is left unchanged.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unreachable(msg) => Error::StoreUnreachable(msg),
            other => Error::Store(other),
        }
    }
}
