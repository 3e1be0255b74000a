//! Main commit log implementation.

use crate::error::CommitLogError;
use crate::keyspace;
use crate::outcome::FlushOutcome;
use crate::recovery;
use crate::{DEFAULT_FLUSH_EVERY, DEFAULT_IDEAL_BATCH_SIZE, DEFAULT_MAX_PENDING_BYTES};
use bytes::Bytes;
use parking_lot::Mutex;
use seriesdb_kv::{KeyRange, KvStore, WriteBatch};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Background loop tick period. The loop wakes at this rate regardless of
/// pending data; `flush_every` only gates how often a genuine flush runs.
const FLUSH_TICK: Duration = Duration::from_millis(1);

/// Commit log configuration.
#[derive(Debug, Clone)]
pub struct CommitLogOptions {
    /// Bytes persisted per segment key; larger batches split across keys.
    pub ideal_batch_size: usize,
    /// Ceiling on buffered un-flushed bytes; writes beyond it are rejected.
    pub max_pending_bytes: usize,
    /// Minimum elapsed time between genuine flushes.
    pub flush_every: Duration,
}

impl Default for CommitLogOptions {
    fn default() -> Self {
        Self {
            ideal_batch_size: DEFAULT_IDEAL_BATCH_SIZE,
            max_pending_bytes: DEFAULT_MAX_PENDING_BYTES,
            flush_every: DEFAULT_FLUSH_EVERY,
        }
    }
}

impl CommitLogOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ideal_batch_size(mut self, bytes: usize) -> Self {
        self.ideal_batch_size = bytes;
        self
    }

    pub fn with_max_pending_bytes(mut self, bytes: usize) -> Self {
        self.max_pending_bytes = bytes;
        self
    }

    pub fn with_flush_every(mut self, interval: Duration) -> Self {
        self.flush_every = interval;
        self
    }
}

/// Opaque bound on durable data.
///
/// Produced by [`CommitLog::wait_for_rotation`]; everything strictly below
/// the bound may be handed back to [`CommitLog::truncate`]. A token from a
/// never-flushed log carries no bound and truncates nothing.
#[derive(Debug, Clone)]
pub struct TruncationToken {
    up_to: Option<Bytes>,
}

impl TruncationToken {
    /// Returns whether the token carries no bound.
    pub fn is_empty(&self) -> bool {
        self.up_to.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Unopened,
    Open,
    Closed,
}

/// State shared between writers and the flush loop, guarded by one lock.
/// Critical sections stay short: the store transaction and all outcome
/// waits run outside it.
struct Inner {
    status: Status,
    /// Pending writes for the cycle currently accumulating.
    curr_batch: Vec<u8>,
    /// Drained allocation kept around for reuse across cycles.
    prev_batch: Vec<u8>,
    last_flush: Instant,
    /// Highest committed segment index; -1 until the first commit.
    last_index: i64,
    /// Outcome of the cycle the current batch belongs to.
    outcome: Arc<FlushOutcome>,
}

/// Commit log over a transactional ordered key-value store.
///
/// Lifecycle is `open` → (`write` | `wait_for_rotation`)* → `close`, each
/// transition succeeding exactly once. While open, a background task flushes
/// the pending buffer into the store as page-sized segments under
/// monotonically increasing keys; every writer blocks until the cycle
/// covering its bytes commits or fails.
pub struct CommitLog {
    store: Arc<dyn KvStore>,
    opts: CommitLogOptions,
    inner: Mutex<Inner>,
    shutdown_tx: watch::Sender<bool>,
    close_done: Mutex<Option<oneshot::Receiver<Result<(), CommitLogError>>>>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl CommitLog {
    /// Creates an unopened commit log over the given store.
    pub fn new(store: Arc<dyn KvStore>, opts: CommitLogOptions) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            store,
            opts,
            inner: Mutex::new(Inner {
                status: Status::Unopened,
                curr_batch: Vec::new(),
                prev_batch: Vec::new(),
                last_flush: Instant::now(),
                last_index: -1,
                outcome: Arc::new(FlushOutcome::new()),
            }),
            shutdown_tx,
            close_done: Mutex::new(None),
            flush_task: Mutex::new(None),
        }
    }

    /// Opens the log: recovers the segment index from the store and starts
    /// the background flush loop. Fails if the log was ever opened before.
    pub async fn open(self: &Arc<Self>) -> Result<(), CommitLogError> {
        if self.inner.lock().status != Status::Unopened {
            return Err(CommitLogError::AlreadyOpened);
        }

        let last_index = recovery::recover_last_index(self.store.as_ref()).await?;

        let (done_tx, done_rx) = oneshot::channel();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        {
            let mut inner = self.inner.lock();
            if inner.status != Status::Unopened {
                return Err(CommitLogError::AlreadyOpened);
            }
            inner.last_index = last_index;
            inner.status = Status::Open;
            *self.close_done.lock() = Some(done_rx);
        }

        tracing::info!(last_index, "commit log opened");

        let log = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(FLUSH_TICK);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        let _ = done_tx.send(log.flush(true).await);
                        return;
                    }
                    _ = tick.tick() => {
                        if let Err(e) = log.flush(false).await {
                            tracing::warn!(error = %e, "commit log flush failed");
                        }
                    }
                }
            }
        });
        *self.flush_task.lock() = Some(handle);

        Ok(())
    }

    /// Closes the log: rejects further writes, forces one final flush and
    /// waits for it, propagating its error. Fails if the log is not open.
    pub async fn close(&self) -> Result<(), CommitLogError> {
        {
            let mut inner = self.inner.lock();
            if inner.status != Status::Open {
                return Err(CommitLogError::NotOpen);
            }
            inner.status = Status::Closed;
        }

        let done_rx = self.close_done.lock().take();
        self.shutdown_tx.send_replace(true);

        let result = match done_rx {
            Some(rx) => match rx.await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("flush loop exited without reporting its final flush");
                    Ok(())
                }
            },
            None => Ok(()),
        };

        let handle = self.flush_task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        tracing::info!("commit log closed");
        result
    }

    /// Appends the payload to the pending buffer and blocks until the flush
    /// cycle covering it commits or fails.
    ///
    /// Rejects empty payloads, writes to a log that is not open, and writes
    /// that would push the pending buffer past `max_pending_bytes`; the
    /// overflow rejection is backpressure, the caller owns retry policy.
    pub async fn write(&self, payload: &[u8]) -> Result<(), CommitLogError> {
        if payload.is_empty() {
            return Err(CommitLogError::EmptyWrite);
        }

        // Capture the outcome under the same lock as the append: it pins
        // this writer to the cycle that will carry its bytes even as the
        // flush loop swaps buffers concurrently.
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.status != Status::Open {
                return Err(CommitLogError::NotOpen);
            }
            if inner.curr_batch.len() + payload.len() > self.opts.max_pending_bytes {
                return Err(CommitLogError::PendingFull {
                    pending: inner.curr_batch.len(),
                    incoming: payload.len(),
                    max: self.opts.max_pending_bytes,
                });
            }
            inner.curr_batch.extend_from_slice(payload);
            Arc::clone(&inner.outcome)
        };

        match outcome.wait().await.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Blocks until the flush cycle current at call time resolves, then
    /// returns a token bounding the most recently committed segment.
    ///
    /// On an idle log the token may carry no bound; it never deadlocks.
    pub async fn wait_for_rotation(&self) -> Result<TruncationToken, CommitLogError> {
        let outcome = {
            let inner = self.inner.lock();
            if inner.status != Status::Open {
                return Err(CommitLogError::NotOpen);
            }
            Arc::clone(&inner.outcome)
        };

        let result = outcome.wait().await;
        if let Some(e) = result.error {
            return Err(e);
        }
        Ok(TruncationToken {
            up_to: result.last_key,
        })
    }

    /// Clears every segment strictly below the token's bound.
    ///
    /// Idempotent and monotonic: re-truncating with the same or an older
    /// token is safe, and a bound-less token is a no-op.
    pub async fn truncate(&self, token: &TruncationToken) -> Result<(), CommitLogError> {
        let Some(up_to) = token.up_to.clone() else {
            return Ok(());
        };

        self.store
            .clear_range(KeyRange::new(keyspace::namespace_start(), up_to))
            .await?;
        Ok(())
    }

    /// One flush cycle. Runs on every tick of the background loop and once,
    /// forced, during close.
    ///
    /// An idle cycle (nothing pending) still resolves its outcome with the
    /// last committed key so rotation waiters make progress. A cycle whose
    /// data is not yet due keeps the outcome in place: writers stay pinned
    /// until a genuine flush covers their bytes, so no write is acknowledged
    /// before it is durable.
    async fn flush(&self, force: bool) -> Result<(), CommitLogError> {
        let (outcome, batch, base_index) = {
            let mut inner = self.inner.lock();

            if inner.curr_batch.is_empty() {
                let outcome =
                    std::mem::replace(&mut inner.outcome, Arc::new(FlushOutcome::new()));
                let last_key =
                    (inner.last_index >= 0).then(|| keyspace::key_from_index(inner.last_index));
                drop(inner);
                outcome.notify(last_key, None);
                return Ok(());
            }

            if !force && inner.last_flush.elapsed() < self.opts.flush_every {
                return Ok(());
            }

            let outcome = std::mem::replace(&mut inner.outcome, Arc::new(FlushOutcome::new()));
            let recycled = std::mem::take(&mut inner.prev_batch);
            let batch = std::mem::replace(&mut inner.curr_batch, recycled);
            (outcome, batch, inner.last_index)
        };

        let flushed = batch.len();
        let result = self.commit_batch(&batch, base_index).await;

        let mut batch = batch;
        batch.clear();
        {
            let mut inner = self.inner.lock();
            inner.prev_batch = batch;
            if let Ok((_, new_last_index)) = &result {
                inner.last_index = *new_last_index;
                inner.last_flush = Instant::now();
            }
        }

        match result {
            Ok((last_key, new_last_index)) => {
                tracing::debug!(
                    bytes = flushed,
                    last_index = new_last_index,
                    "flushed commit log batch"
                );
                outcome.notify(Some(last_key), None);
                Ok(())
            }
            Err(e) => {
                // The drained bytes are dropped, not re-queued: the log is
                // append-once with best-effort flush, and resubmission is
                // the caller's policy.
                outcome.notify(None, Some(e.clone()));
                Err(e)
            }
        }
    }

    /// Commits the drained batch in one transaction, split into chunks of at
    /// most `ideal_batch_size` bytes at strictly increasing keys. Returns
    /// the last key written and the new highest index.
    ///
    /// Only ever invoked with a non-empty batch, and only from the single
    /// flush role, which is what makes the index advance safe.
    async fn commit_batch(
        &self,
        batch: &[u8],
        base_index: i64,
    ) -> Result<(Bytes, i64), CommitLogError> {
        let chunk_size = self.opts.ideal_batch_size.max(1);
        let mut tx = WriteBatch::new();
        let mut next_index = base_index;

        let mut start = 0;
        while start < batch.len() {
            next_index += 1;
            let end = (start + chunk_size).min(batch.len());
            tx.set(
                keyspace::key_from_index(next_index),
                batch[start..end].to_vec(),
            );
            start = end;
        }

        self.store.commit(tx).await?;
        Ok((keyspace::key_from_index(next_index), next_index))
    }
}
