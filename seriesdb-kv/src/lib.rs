//! # seriesdb-kv
//!
//! Transactional ordered key-value store abstraction for seriesdb.
//!
//! The commit log (and everything above it) talks to its backing store
//! through the [`KvStore`] trait:
//! - atomic multi-key write batches
//! - ordered range scans with begin/end bounds
//! - range clears
//!
//! Production deployments bind this to a distributed transactional store;
//! [`MemoryStore`] is the ordered in-process reference implementation used
//! by tests and benchmarks.

pub mod error;
pub mod memory;
pub mod store;

pub use error::KvError;
pub use memory::MemoryStore;
pub use store::{KeyRange, KeyValue, KvStore, WriteBatch};
