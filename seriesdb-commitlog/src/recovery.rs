//! Open-time recovery of the segment index.

use crate::error::CommitLogError;
use crate::keyspace;
use seriesdb_kv::KvStore;

/// Scans the log's namespace and returns the highest segment index already
/// persisted, or -1 for an empty store, so the next commit continues the
/// monotonic sequence without collision.
///
/// A key that does not decode is a corruption signal and fails the open.
pub async fn recover_last_index(store: &dyn KvStore) -> Result<i64, CommitLogError> {
    let kvs = store.scan(keyspace::scan_range()).await?;

    match kvs.last() {
        Some((key, _)) => keyspace::index_from_key(key),
        None => Ok(-1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seriesdb_kv::{MemoryStore, WriteBatch};

    #[tokio::test]
    async fn test_empty_store_recovers_minus_one() {
        let store = MemoryStore::new();
        assert_eq!(recover_last_index(&store).await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_recovers_highest_index() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        for idx in [0i64, 1, 2, 7] {
            batch.set(keyspace::key_from_index(idx), &b"segment"[..]);
        }
        store.commit(batch).await.unwrap();

        assert_eq!(recover_last_index(&store).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_keys_outside_namespace_ignored() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.set(&b"series/cpu.load"[..], &b"points"[..]);
        batch.set(keyspace::key_from_index(3), &b"segment"[..]);
        store.commit(batch).await.unwrap();

        assert_eq!(recover_last_index(&store).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_malformed_key_is_fatal() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        // Inside the namespace but not a valid 8-byte index.
        let mut raw = keyspace::KEY_PREFIX.to_vec();
        raw.extend_from_slice(&1u64.to_be_bytes());
        raw.push(0xFF);
        batch.set(raw, &b"junk"[..]);
        store.commit(batch).await.unwrap();

        assert!(matches!(
            recover_last_index(&store).await,
            Err(CommitLogError::MalformedKey(_))
        ));
    }
}
