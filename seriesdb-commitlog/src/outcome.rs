//! Per-cycle flush synchronization.

use crate::error::CommitLogError;
use bytes::Bytes;
use tokio::sync::watch;

/// What a completed flush cycle left behind.
#[derive(Debug, Clone, Default)]
pub struct FlushResult {
    /// Key of the last committed segment, if any segment has ever committed.
    pub last_key: Option<Bytes>,
    /// Error of the cycle, if its transaction failed.
    pub error: Option<CommitLogError>,
}

/// Single-assignment broadcast latch for one flush cycle.
///
/// The flush loop notifies the outcome exactly once; any number of writers
/// and rotation waiters observe the same stored result, and waits after the
/// notification return immediately.
#[derive(Debug)]
pub struct FlushOutcome {
    tx: watch::Sender<Option<FlushResult>>,
}

impl FlushOutcome {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Records the cycle's result and wakes every waiter. The first
    /// notification wins; later ones are ignored.
    pub fn notify(&self, last_key: Option<Bytes>, error: Option<CommitLogError>) {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(FlushResult { last_key, error });
            true
        });
    }

    /// Blocks until the cycle resolves, then returns its stored result.
    pub async fn wait(&self) -> FlushResult {
        let mut rx = self.tx.subscribe();
        let result = match rx.wait_for(Option::is_some).await {
            Ok(result) => result.clone().unwrap_or_default(),
            // The sender lives inside `self`, so the channel can only have
            // closed after the result was stored.
            Err(_) => self.tx.borrow().clone().unwrap_or_default(),
        };
        result
    }
}

impl Default for FlushOutcome {
    fn default() -> Self {
        Self::new()
    }
}
