//! # seriesdb-commitlog
//!
//! Commit log for seriesdb.
//!
//! This crate provides the durability layer beneath the time-series engine:
//! - In-memory buffering of writes with bounded pending bytes
//! - Periodic batched flushes into a transactional ordered key-value store
//! - Shared flush outcomes so many writers await a single transaction
//! - Monotonic segment indexing recovered across restarts
//! - Token-based truncation of already-durable data
//!
//! Payloads are opaque: a flush may split one write across several persisted
//! segments or pack several writes into one, so consumers that need record
//! boundaries must self-delimit.

pub mod error;
pub mod keyspace;
pub mod log;
pub mod outcome;
pub mod recovery;

pub use error::CommitLogError;
pub use log::{CommitLog, CommitLogOptions, TruncationToken};
pub use outcome::{FlushOutcome, FlushResult};

use std::time::Duration;

/// Default page size: bytes persisted per segment key.
pub const DEFAULT_IDEAL_BATCH_SIZE: usize = 4096;

/// Default ceiling on buffered, un-flushed bytes.
pub const DEFAULT_MAX_PENDING_BYTES: usize = 10_000_000;

/// Default minimum interval between genuine flushes.
pub const DEFAULT_FLUSH_EVERY: Duration = Duration::from_millis(1);
