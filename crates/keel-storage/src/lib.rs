//! # keel-storage
//!
//! Buffer pool subsystem for KeelDB.
//!
//! This crate mediates between a persistent paged file store and in-memory
//! readers/writers. It guarantees that any logical page is represented by at
//! most one cached copy, that dirty edits reach disk before a frame is
//! reused, and that a bounded amount of memory is reclaimed fairly under
//! contention.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Buffer pool manager, page table, and frame replacer
pub mod buffer;

/// Disk manager trait and backends
pub mod disk;

/// Write-ahead log hook
pub mod wal;
