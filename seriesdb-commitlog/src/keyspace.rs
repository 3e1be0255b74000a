//! Segment key space.
//!
//! Every committed segment lives under a reserved namespace prefix, keyed by
//! its segment index:
//!
//! ```text
//! +--------------+---------------------------+
//! | "commitlog-" | big-endian u64(index + 1) |
//! | 10 bytes     | 8 bytes                   |
//! +--------------+---------------------------+
//! ```
//!
//! The stored value is `index + 1` so that a never-flushed log (recovered
//! index -1) and a log whose first segment is index 0 stay distinguishable.
//! Big-endian encoding makes byte order equal index order, which is what
//! recovery and truncation rely on.

use crate::error::CommitLogError;
use bytes::{BufMut, Bytes, BytesMut};
use seriesdb_kv::KeyRange;

/// Namespace prefix reserved for commit log keys.
pub const KEY_PREFIX: &[u8] = b"commitlog-";

/// Encoded key length: prefix plus the 8-byte index.
pub const KEY_LEN: usize = KEY_PREFIX.len() + 8;

/// Encodes a segment index into its ordered key.
///
/// Only valid for indices that name a committed segment (>= 0).
pub fn key_from_index(index: i64) -> Bytes {
    debug_assert!(index >= 0, "segment keys exist only for committed indices");
    let mut buf = BytesMut::with_capacity(KEY_LEN);
    buf.put_slice(KEY_PREFIX);
    buf.put_u64(index as u64 + 1);
    buf.freeze()
}

/// Decodes a persisted key back into its segment index.
pub fn index_from_key(key: &[u8]) -> Result<i64, CommitLogError> {
    let stored = key
        .strip_prefix(KEY_PREFIX)
        .ok_or_else(|| malformed("missing namespace prefix", key))?;

    let stored: [u8; 8] = stored
        .try_into()
        .map_err(|_| malformed("index must be exactly 8 bytes", key))?;

    let stored = u64::from_be_bytes(stored);
    if stored == 0 || stored - 1 > i64::MAX as u64 {
        return Err(malformed("stored index out of range", key));
    }
    Ok((stored - 1) as i64)
}

/// Returns the scan range covering every possible segment key.
pub fn scan_range() -> KeyRange {
    let mut begin = BytesMut::with_capacity(KEY_LEN);
    begin.put_slice(KEY_PREFIX);
    begin.put_u64(0);

    let mut end = BytesMut::with_capacity(KEY_LEN);
    end.put_slice(KEY_PREFIX);
    end.put_u64(u64::MAX);

    KeyRange::new(begin.freeze(), end.freeze())
}

/// Returns the lowest key in the namespace, used as the truncation floor.
pub fn namespace_start() -> Bytes {
    Bytes::from_static(KEY_PREFIX)
}

fn malformed(reason: &str, key: &[u8]) -> CommitLogError {
    CommitLogError::MalformedKey(format!("{reason} (raw: {key:02x?})"))
}
