//! Commit log error types.

use seriesdb_kv::KvError;
use thiserror::Error;

/// Errors that can occur during commit log operations.
///
/// Flush failures fan out through the shared flush outcome to every writer
/// and rotation waiter of the affected cycle, so the type is `Clone`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommitLogError {
    #[error("commit log cannot be opened more than once")]
    AlreadyOpened,

    #[error("commit log is not open")]
    NotOpen,

    #[error("cannot write an empty payload")]
    EmptyWrite,

    #[error("pending buffer is full: {pending} buffered + {incoming} incoming exceeds {max}")]
    PendingFull {
        pending: usize,
        incoming: usize,
        max: usize,
    },

    #[error("malformed commit log key: {0}")]
    MalformedKey(String),

    #[error("store error: {0}")]
    Store(#[from] KvError),
}

impl CommitLogError {
    /// Returns whether this error signals backpressure rather than failure.
    pub fn is_backpressure(&self) -> bool {
        matches!(self, CommitLogError::PendingFull { .. })
    }
}
