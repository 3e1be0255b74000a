//! The store trait and transaction building blocks.

use crate::error::KvError;
use async_trait::async_trait;
use bytes::Bytes;

/// A key-value pair returned by a scan.
pub type KeyValue = (Bytes, Bytes);

/// A byte range over keys. `begin` is inclusive, `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub begin: Bytes,
    pub end: Bytes,
}

impl KeyRange {
    pub fn new(begin: impl Into<Bytes>, end: impl Into<Bytes>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
        }
    }

    /// Returns whether the key falls inside the range.
    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.begin.as_ref() && key < self.end.as_ref()
    }
}

/// An ordered set of writes applied atomically by [`KvStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    sets: Vec<KeyValue>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a key to be set to the given value.
    pub fn set(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.sets.push((key.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Consumes the batch, yielding its writes in insertion order.
    pub fn into_sets(self) -> Vec<KeyValue> {
        self.sets
    }
}

/// A transactional, byte-ordered key-value store.
///
/// Implementations must guarantee that `commit` applies all writes in a
/// batch atomically, and that `scan` yields keys in ascending byte order.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Atomically applies every write in the batch.
    async fn commit(&self, batch: WriteBatch) -> Result<(), KvError>;

    /// Returns all key-value pairs inside the range, ascending by key.
    async fn scan(&self, range: KeyRange) -> Result<Vec<KeyValue>, KvError>;

    /// Atomically removes every key inside the range.
    async fn clear_range(&self, range: KeyRange) -> Result<(), KvError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_batch_accumulates_in_order() {
        let mut batch = WriteBatch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);

        batch.set(&b"z"[..], &b"1"[..]);
        batch.set(&b"a"[..], &b"2"[..]);
        assert!(!batch.is_empty());
        assert_eq!(batch.len(), 2);

        // Insertion order is preserved; ordering is the store's job.
        let sets = batch.into_sets();
        assert_eq!(sets[0].0.as_ref(), b"z");
        assert_eq!(sets[1].0.as_ref(), b"a");
    }

    #[test]
    fn test_key_range_contains_is_end_exclusive() {
        let range = KeyRange::new(&b"b"[..], &b"d"[..]);
        assert!(range.contains(b"b"));
        assert!(range.contains(b"c"));
        assert!(!range.contains(b"d"));
        assert!(!range.contains(b"a"));
    }
}
