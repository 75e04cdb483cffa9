//! RAII page guards.
//!
//! Guards pair a pinned frame with the pool that pinned it and release the
//! pin on drop, so callers cannot forget the matching unpin. The write
//! guard remembers whether the data was touched and carries that dirty flag
//! into the unpin.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use keel_common::types::{Lsn, PageId};

use super::frame::{FrameId, PageFrame};
use super::pool::BufferPoolManager;

/// Read access to a pinned page.
///
/// Unpins the page (clean) when dropped.
pub struct PageReadGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Arc<PageFrame>,
    page_id: PageId,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPoolManager, frame: Arc<PageFrame>) -> Self {
        let page_id = frame.page_id();
        Self {
            pool,
            frame,
            page_id,
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Returns a reference to the page data.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, false);
    }
}

impl std::fmt::Debug for PageReadGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageReadGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame.frame_id())
            .finish()
    }
}

/// Helper struct to provide Deref for page data.
struct PageDataRef<'a> {
    guard: parking_lot::RwLockReadGuard<'a, Vec<u8>>,
}

impl Deref for PageDataRef<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

/// Write access to a pinned page.
///
/// Unpins the page when dropped, marking it dirty if the data was touched
/// through the guard.
pub struct PageWriteGuard<'a> {
    pool: &'a BufferPoolManager,
    frame: Arc<PageFrame>,
    page_id: PageId,
    /// Whether the page was modified through this guard.
    modified: bool,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(pool: &'a BufferPoolManager, frame: Arc<PageFrame>) -> Self {
        let page_id = frame.page_id();
        Self {
            pool,
            frame,
            page_id,
            modified: false,
        }
    }

    /// Returns the page ID.
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame.frame_id()
    }

    /// Returns a reference to the page data.
    #[inline]
    pub fn data(&self) -> impl Deref<Target = [u8]> + '_ {
        PageDataRef {
            guard: self.frame.read_data(),
        }
    }

    /// Returns a mutable reference to the page data, marking the page
    /// dirty.
    #[inline]
    pub fn data_mut(&mut self) -> impl DerefMut<Target = [u8]> + '_ {
        self.modified = true;
        PageDataMut {
            guard: self.frame.write_data(),
        }
    }

    /// Marks the page dirty without touching the data.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.modified = true;
    }

    /// Returns true if the page was modified through this guard.
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Records the LSN of the modification for write-ahead ordering.
    #[inline]
    pub fn set_lsn(&mut self, lsn: Lsn) {
        self.frame.set_lsn(lsn);
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page(self.page_id, self.modified);
    }
}

impl std::fmt::Debug for PageWriteGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageWriteGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame.frame_id())
            .field("modified", &self.modified)
            .finish()
    }
}

/// Helper struct to provide DerefMut for page data.
struct PageDataMut<'a> {
    guard: parking_lot::RwLockWriteGuard<'a, Vec<u8>>,
}

impl Deref for PageDataMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for PageDataMut<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl BufferPoolManager {
    /// Fetches a page for reading, unpinning automatically on drop.
    pub fn fetch_page_read(&self, page_id: PageId) -> super::error::BufferResult<PageReadGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageReadGuard::new(self, frame))
    }

    /// Fetches a page for writing, unpinning automatically on drop.
    pub fn fetch_page_write(
        &self,
        page_id: PageId,
    ) -> super::error::BufferResult<PageWriteGuard<'_>> {
        let frame = self.fetch_page(page_id)?;
        Ok(PageWriteGuard::new(self, frame))
    }

    /// Allocates a new page for writing, unpinning automatically on drop.
    pub fn new_page_write(&self) -> super::error::BufferResult<PageWriteGuard<'_>> {
        let (_page_id, frame) = self.new_page()?;
        Ok(PageWriteGuard::new(self, frame))
    }
}
