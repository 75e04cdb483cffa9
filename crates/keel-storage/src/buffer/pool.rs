//! Buffer pool manager.
//!
//! The manager owns a fixed array of page frames and composes the page
//! table, the LRU-K replacer, and the disk manager into the page cache:
//! page allocation, fetch, pin/unpin, flush, and delete.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use keel_common::types::{Lsn, PageId};
use parking_lot::Mutex;

use super::config::BufferPoolConfig;
use super::error::{BufferError, BufferResult};
use super::frame::{FrameId, PageFrame};
use super::page_table::ExtendibleHashTable;
use super::replacer::LruKReplacer;
use super::BufferPoolStats;
use crate::disk::DiskManager;
use crate::wal::LogManager;

/// State mutated by every structural pool operation.
///
/// Held for the full duration of each public operation, so the compound
/// updates across the page table, the replacer, and the frames are atomic
/// with respect to other callers.
struct PoolState {
    /// Frames currently hosting no page. Always consumed before the
    /// replacer is consulted.
    free_list: VecDeque<FrameId>,
    /// Next page id to hand out from `new_page`.
    next_page_id: u64,
}

/// The buffer pool manager.
///
/// Guarantees that a logical page has at most one cached copy, that dirty
/// frames reach disk before reuse, and that eviction never touches a pinned
/// frame. Frame handles returned from [`new_page`](Self::new_page) and
/// [`fetch_page`](Self::fetch_page) are borrowed until the matching
/// [`unpin_page`](Self::unpin_page); the RAII layer in
/// [`guard`](super::guard) automates the unpin.
pub struct BufferPoolManager {
    /// Array of buffer frames, created once and reused forever.
    frames: Vec<Arc<PageFrame>>,
    /// Page table: maps PageId -> FrameId.
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// Replacer tracking eviction candidates.
    replacer: LruKReplacer,
    /// Disk collaborator.
    disk: Arc<dyn DiskManager>,
    /// Write-ahead log hook, consulted before dirty write-back.
    log: Option<Arc<dyn LogManager>>,
    /// Free list and page id allocator, serializing all operations.
    state: Mutex<PoolState>,
    /// Fetch counter for statistics.
    fetch_count: AtomicU64,
    /// Hit counter for statistics.
    hit_count: AtomicU64,
    /// Miss counter for statistics.
    miss_count: AtomicU64,
    /// Eviction counter for statistics.
    eviction_count: AtomicU64,
    /// Flush counter for statistics.
    flush_count: AtomicU64,
}

impl BufferPoolManager {
    /// Creates a buffer pool over `disk` with the given configuration.
    pub fn new(
        config: BufferPoolConfig,
        disk: Arc<dyn DiskManager>,
        log: Option<Arc<dyn LogManager>>,
    ) -> BufferResult<Self> {
        config
            .validate()
            .map_err(|e| BufferError::Config { message: e.to_string() })?;

        let frames: Vec<Arc<PageFrame>> = (0..config.pool_size)
            .map(|i| Arc::new(PageFrame::new(FrameId::new(i))))
            .collect();
        let free_list: VecDeque<FrameId> =
            (0..config.pool_size).map(FrameId::new).collect();

        Ok(Self {
            frames,
            page_table: ExtendibleHashTable::new(config.bucket_size),
            replacer: LruKReplacer::new(config.pool_size, config.replacer_k),
            disk,
            log,
            state: Mutex::new(PoolState {
                free_list,
                next_page_id: 0,
            }),
            fetch_count: AtomicU64::new(0),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count: AtomicU64::new(0),
            flush_count: AtomicU64::new(0),
        })
    }

    /// Allocates a fresh page pinned into a frame.
    ///
    /// The frame comes from the free list, or from evicting the replacer's
    /// victim (whose dirty content is written back first). Returns
    /// [`BufferError::NoFreeFrames`] when every frame is pinned.
    pub fn new_page(&self) -> BufferResult<(PageId, Arc<PageFrame>)> {
        let mut state = self.state.lock();

        let frame_id = self.obtain_frame(&mut state)?;
        let frame = &self.frames[frame_id.index()];

        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += 1;

        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();

        self.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        tracing::trace!(page_id = %page_id, frame_id = %frame_id, "allocated page");
        Ok((page_id, Arc::clone(frame)))
    }

    /// Fetches a page, pinning its frame.
    ///
    /// On a hit the cached frame is pinned and returned. On a miss a frame
    /// is obtained as in [`new_page`](Self::new_page) and the page bytes
    /// are read from disk. Returns [`BufferError::NoFreeFrames`] when every
    /// frame is pinned; disk errors propagate unchanged.
    pub fn fetch_page(&self, page_id: PageId) -> BufferResult<Arc<PageFrame>> {
        let mut state = self.state.lock();
        self.fetch_count.fetch_add(1, Ordering::Relaxed);

        if let Some(frame_id) = self.page_table.find(&page_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            let frame = &self.frames[frame_id.index()];
            frame.pin();
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);
            return Ok(Arc::clone(frame));
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.obtain_frame(&mut state)?;
        let frame = &self.frames[frame_id.index()];

        frame.set_page_id(page_id);
        {
            let mut data = frame.write_data();
            if let Err(e) = self.disk.read_page(page_id, &mut data) {
                drop(data);
                // The frame was already unmapped; return it to the free
                // list instead of leaking it.
                frame.reset();
                state.free_list.push_back(frame_id);
                return Err(e.into());
            }
        }
        frame.set_dirty(false);
        frame.set_lsn(Lsn::INVALID);
        frame.pin();

        self.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        tracing::trace!(page_id = %page_id, frame_id = %frame_id, "fetched page from disk");
        Ok(Arc::clone(frame))
    }

    /// Drops one pin on a page.
    ///
    /// Returns false when the page is not cached or not pinned. The
    /// caller's dirty flag is ORed into the frame's; the frame becomes
    /// evictable when the last pin is released.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let _state = self.state.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.index()];
        let Some(remaining) = frame.try_unpin() else {
            return false;
        };
        if is_dirty {
            frame.set_dirty(true);
        }
        if remaining == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes a page through to disk and clears its dirty flag.
    ///
    /// The write is unconditional: a clean page is written again. Returns
    /// `Ok(false)` for the invalid sentinel or an uncached page; disk
    /// errors propagate unchanged.
    pub fn flush_page(&self, page_id: PageId) -> BufferResult<bool> {
        let _state = self.state.lock();
        self.flush_page_locked(page_id)
    }

    /// Flushes every page currently cached in the pool.
    ///
    /// Operates on a snapshot of the mapped page ids taken under the pool
    /// lock. Returns the number of pages written.
    pub fn flush_all_pages(&self) -> BufferResult<usize> {
        let _state = self.state.lock();

        let mapped = self.page_table.keys();
        let flushed = mapped.len();
        for page_id in mapped {
            self.flush_page_locked(page_id)?;
        }
        Ok(flushed)
    }

    /// Removes a page from the pool, returning its frame to the free list.
    ///
    /// Returns true when the page is not cached (nothing to do) or was
    /// deleted; false when the page is pinned. The frame's content is
    /// discarded without write-back.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        let mut state = self.state.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return true;
        };
        let frame = &self.frames[frame_id.index()];
        if frame.is_pinned() {
            return false;
        }

        self.page_table.remove(&page_id);
        self.replacer.remove(frame_id);
        frame.reset();
        state.free_list.push_back(frame_id);
        tracing::trace!(page_id = %page_id, frame_id = %frame_id, "deleted page");
        true
    }

    /// Returns true if a page is currently cached.
    pub fn contains(&self, page_id: PageId) -> bool {
        let _state = self.state.lock();
        self.page_table.find(&page_id).is_some()
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Returns the number of frames on the free list.
    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned = 0;
        let mut dirty = 0;
        for frame in &self.frames {
            if frame.is_pinned() {
                pinned += 1;
            }
            if frame.is_dirty() {
                dirty += 1;
            }
        }

        BufferPoolStats {
            fetches: self.fetch_count.load(Ordering::Relaxed),
            hits: self.hit_count.load(Ordering::Relaxed),
            misses: self.miss_count.load(Ordering::Relaxed),
            evictions: self.eviction_count.load(Ordering::Relaxed),
            flushes: self.flush_count.load(Ordering::Relaxed),
            pinned_frames: pinned,
            dirty_frames: dirty,
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    /// Obtains an unmapped frame: from the free list if non-empty, else by
    /// evicting the replacer's victim (writing it back when dirty).
    fn obtain_frame(&self, state: &mut PoolState) -> BufferResult<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.replacer.evict() else {
            return Err(BufferError::NoFreeFrames);
        };
        let frame = &self.frames[frame_id.index()];
        debug_assert!(!frame.is_pinned(), "replacer returned a pinned frame");

        let old_page_id = frame.page_id();
        if frame.is_dirty() {
            tracing::debug!(page_id = %old_page_id, frame_id = %frame_id, "writing back victim");
            if let Err(e) = self.write_back(frame) {
                // Leave the victim cached and evictable rather than leak
                // the frame; the access record perturbs its recency.
                self.replacer.record_access(frame_id);
                self.replacer.set_evictable(frame_id, true);
                return Err(e);
            }
        }
        self.page_table.remove(&old_page_id);
        self.eviction_count.fetch_add(1, Ordering::Relaxed);
        Ok(frame_id)
    }

    /// Writes a frame's page to disk, flushing the log first.
    fn write_back(&self, frame: &PageFrame) -> BufferResult<()> {
        if let Some(log) = &self.log {
            log.flush_until(frame.lsn())?;
        }
        let data = frame.read_data();
        self.disk.write_page(frame.page_id(), &data)?;
        self.flush_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Flush body shared by `flush_page` and `flush_all_pages`; the pool
    /// lock must be held.
    fn flush_page_locked(&self, page_id: PageId) -> BufferResult<bool> {
        if !page_id.is_valid() {
            return Ok(false);
        }
        let Some(frame_id) = self.page_table.find(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.index()];
        self.write_back(frame)?;
        frame.set_dirty(false);
        Ok(true)
    }
}

impl std::fmt::Debug for BufferPoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPoolManager")
            .field("pool_size", &self.frames.len())
            .field("free_frames", &self.free_frame_count())
            .field("stats", &self.stats())
            .finish()
    }
}
