//! In-memory disk manager for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use keel_common::types::PageId;
use parking_lot::RwLock;

use super::{check_page_args, DiskManager, IoResult};

/// Disk manager that keeps pages in a hash map.
///
/// Used by tests to observe exactly which pages the buffer pool writes back
/// and when, without touching the filesystem. Pages never written read back
/// as zeroes, matching [`super::FileDiskManager`].
#[derive(Default)]
pub struct MemoryDiskManager {
    pages: RwLock<HashMap<PageId, Box<[u8]>>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryDiskManager {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of `read_page` calls observed.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of `write_page` calls observed.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns a copy of the stored bytes for a page, if it was ever written.
    pub fn page(&self, page_id: PageId) -> Option<Vec<u8>> {
        self.pages.read().get(&page_id).map(|p| p.to_vec())
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> IoResult<()> {
        check_page_args(page_id, buf.len())?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        match self.pages.read().get(&page_id) {
            Some(page) => buf.copy_from_slice(page),
            None => buf.fill(0),
        }
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> IoResult<()> {
        check_page_args(page_id, buf.len())?;
        self.writes.fetch_add(1, Ordering::Relaxed);

        self.pages
            .write()
            .insert(page_id, buf.to_vec().into_boxed_slice());
        Ok(())
    }
}

impl std::fmt::Debug for MemoryDiskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDiskManager")
            .field("pages", &self.pages.read().len())
            .field("reads", &self.read_count())
            .field("writes", &self.write_count())
            .finish()
    }
}
