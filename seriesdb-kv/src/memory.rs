//! In-memory reference store.

use crate::error::KvError;
use crate::store::{KeyRange, KeyValue, KvStore, WriteBatch};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Ordered in-process [`KvStore`] backed by a `BTreeMap`.
///
/// Used by tests and benchmarks in place of a real distributed store. The
/// `fail_commits` switch makes the next commits fail, so callers can
/// exercise their transaction-failure paths.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Bytes, Bytes>>,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every subsequent `commit` fails until cleared.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of keys currently stored.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns a full copy of the store contents, ascending by key.
    pub fn dump(&self) -> Vec<KeyValue> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn commit(&self, batch: WriteBatch) -> Result<(), KvError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(KvError::TransactionFailed(
                "injected commit failure".to_string(),
            ));
        }

        let mut data = self.data.write();
        for (key, value) in batch.into_sets() {
            data.insert(key, value);
        }
        Ok(())
    }

    async fn scan(&self, range: KeyRange) -> Result<Vec<KeyValue>, KvError> {
        let data = self.data.read();
        Ok(data
            .range(range.begin.clone()..range.end.clone())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn clear_range(&self, range: KeyRange) -> Result<(), KvError> {
        let mut data = self.data.write();
        let doomed: Vec<Bytes> = data
            .range(range.begin.clone()..range.end.clone())
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            data.remove(&key);
        }
        Ok(())
    }
}
