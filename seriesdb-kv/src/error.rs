//! Store error types.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// `Clone` is part of the contract: a single failed transaction may have to
/// be reported to many waiters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("transaction conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl KvError {
    /// Returns whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, KvError::Conflict(_))
    }
}
