//! Write-ahead log hook.
//!
//! The buffer pool never writes a dirty page back to disk before the log
//! records covering that page are durable. It enforces the ordering through
//! this hook; the log itself (records, segments, recovery) lives elsewhere.

use keel_common::types::Lsn;

use crate::disk::IoResult;

/// Write-ahead log collaborator.
///
/// [`flush_until`](LogManager::flush_until) is invoked with the frame's last
/// modification LSN before every dirty-page write-back, both on eviction and
/// on explicit flush. Implementations block until every record up to and
/// including that LSN is durable.
pub trait LogManager: Send + Sync {
    /// Makes the log durable up to and including `lsn`.
    fn flush_until(&self, lsn: Lsn) -> IoResult<()>;
}

/// Log manager that performs no logging.
///
/// Used when the pool runs without a write-ahead log, and by tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogManager;

impl LogManager for NoopLogManager {
    fn flush_until(&self, _lsn: Lsn) -> IoResult<()> {
        Ok(())
    }
}
