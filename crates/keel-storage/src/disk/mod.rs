//! Paged disk I/O for the buffer pool.
//!
//! The buffer pool talks to persistent storage through the [`DiskManager`]
//! trait: positioned, blocking reads and writes of whole pages. Two backends
//! are provided:
//!
//! - [`FileDiskManager`] — a single data file on the local filesystem
//! - [`MemoryDiskManager`] — an in-memory page store for tests

mod error;
mod file;
mod memory;

pub use error::{IoError, IoResult};
pub use file::FileDiskManager;
pub use memory::MemoryDiskManager;

use keel_common::constants::PAGE_SIZE;
use keel_common::types::PageId;

/// Blocking page I/O collaborator for the buffer pool.
///
/// Implementations move exactly [`PAGE_SIZE`] bytes per call and block until
/// the operation completes. Failures surface as [`IoError`] and are
/// propagated to buffer pool callers unchanged.
pub trait DiskManager: Send + Sync {
    /// Reads the page with the given id into `buf`.
    ///
    /// `buf` must be exactly [`PAGE_SIZE`] bytes long.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> IoResult<()>;

    /// Writes the page with the given id from `buf`.
    ///
    /// `buf` must be exactly [`PAGE_SIZE`] bytes long.
    fn write_page(&self, page_id: PageId, buf: &[u8]) -> IoResult<()>;
}

/// Validates a page-sized buffer and a usable page id.
fn check_page_args(page_id: PageId, buf_len: usize) -> IoResult<()> {
    if !page_id.is_valid() {
        return Err(IoError::InvalidPageId { page_id });
    }
    if buf_len != PAGE_SIZE {
        return Err(IoError::BadBufferLength {
            expected: PAGE_SIZE,
            actual: buf_len,
        });
    }
    Ok(())
}
