//! LRU-K frame replacer.
//!
//! LRU-K evicts the frame with the greatest *backward k-distance*: the time
//! elapsed since its k-th most recent access. A frame with fewer than k
//! recorded accesses has infinite backward k-distance and is preferred as a
//! victim; ties inside that set fall to the earliest recorded access, and
//! ties among fully-tracked frames fall to the earliest k-th-back access.
//!
//! Compared to plain LRU (the `k = 1` special case), this keeps pages with a
//! stable re-reference pattern resident through a one-off scan of cold pages.

use std::collections::{BTreeSet, HashMap, VecDeque};

use parking_lot::Mutex;

use super::frame::FrameId;

/// Per-frame access bookkeeping.
struct LruKNode {
    /// Last k access timestamps, oldest at the front.
    history: VecDeque<u64>,
    /// Whether the pool currently allows this frame to be evicted.
    evictable: bool,
}

impl LruKNode {
    fn new(now: u64, k: usize) -> Self {
        let mut history = VecDeque::with_capacity(k);
        history.push_back(now);
        Self {
            history,
            evictable: false,
        }
    }

    /// The timestamp this node sorts on: the k-th most recent access once
    /// the history is full, otherwise the earliest recorded access.
    #[inline]
    fn oldest(&self) -> u64 {
        *self.history.front().expect("history is never empty")
    }
}

/// Victim-priority key: partial-history nodes (infinite k-distance) order
/// before full-history nodes, earliest timestamp first within each class.
type OrderKey = (bool, u64, FrameId);

struct ReplacerInner {
    /// Tracked frames.
    nodes: HashMap<FrameId, LruKNode>,
    /// Nodes in victim-priority order; the first evictable entry is the
    /// next victim.
    order: BTreeSet<OrderKey>,
    /// Count of nodes with the evictable flag set.
    evictable: usize,
    /// Logical clock, advanced once per recorded access.
    clock: u64,
}

/// Tracker and victim selector for buffer pool frames.
///
/// The replacer is internally synchronized; all methods take `&self`. It
/// tracks at most `num_frames` frames and holds no reference to frame
/// memory, only [`FrameId`] indices.
pub struct LruKReplacer {
    /// Upper bound on tracked frames.
    num_frames: usize,
    /// History window.
    k: usize,
    inner: Mutex<ReplacerInner>,
}

impl LruKReplacer {
    /// Creates a replacer tracking up to `num_frames` frames with a history
    /// window of `k` accesses.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k >= 1, "LRU-K requires k >= 1");
        Self {
            num_frames,
            k,
            inner: Mutex::new(ReplacerInner {
                nodes: HashMap::with_capacity(num_frames),
                order: BTreeSet::new(),
                evictable: 0,
                clock: 0,
            }),
        }
    }

    /// Returns the history window.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Records an access to `frame_id`.
    ///
    /// A frame seen for the first time is tracked with a single history
    /// entry and starts out non-evictable; accesses to untracked frames
    /// beyond the `num_frames` bound are dropped. For a tracked frame the
    /// access is appended and history beyond the last k entries discarded.
    pub fn record_access(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        inner.clock += 1;
        let now = inner.clock;

        if let Some(node) = inner.nodes.get_mut(&frame_id) {
            let old_key = (node.history.len() >= self.k, node.oldest(), frame_id);
            if node.history.len() == self.k {
                node.history.pop_front();
            }
            node.history.push_back(now);
            let new_key = (node.history.len() >= self.k, node.oldest(), frame_id);
            inner.order.remove(&old_key);
            inner.order.insert(new_key);
            return;
        }

        if inner.nodes.len() >= self.num_frames {
            tracing::debug!(frame_id = %frame_id, "replacer at capacity, access dropped");
            return;
        }

        let node = LruKNode::new(now, self.k);
        let key = (self.k == 1, node.oldest(), frame_id);
        inner.order.insert(key);
        inner.nodes.insert(frame_id, node);
    }

    /// Sets whether `frame_id` may be chosen as a victim.
    ///
    /// No-op for untracked frames.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut inner = self.inner.lock();
        let Some(node) = inner.nodes.get_mut(&frame_id) else {
            return;
        };
        if node.evictable != evictable {
            node.evictable = evictable;
            if evictable {
                inner.evictable += 1;
            } else {
                inner.evictable -= 1;
            }
        }
    }

    /// Stops tracking `frame_id`.
    ///
    /// No-op for untracked frames. Removing a non-evictable frame is a
    /// caller bug: the state is left unchanged.
    pub fn remove(&self, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        let Some(node) = inner.nodes.get(&frame_id) else {
            return;
        };
        if !node.evictable {
            tracing::warn!(frame_id = %frame_id, "remove on non-evictable frame ignored");
            return;
        }
        let key = (node.history.len() >= self.k, node.oldest(), frame_id);
        inner.order.remove(&key);
        inner.nodes.remove(&frame_id);
        inner.evictable -= 1;
    }

    /// Selects and removes the victim frame, if any frame is evictable.
    ///
    /// The scan walks nodes in victim-priority order and returns the first
    /// evictable one.
    pub fn evict(&self) -> Option<FrameId> {
        let mut inner = self.inner.lock();
        if inner.evictable == 0 {
            return None;
        }

        let victim = inner
            .order
            .iter()
            .find(|&&(_, _, frame_id)| inner.nodes[&frame_id].evictable)
            .copied();

        let (full, oldest, frame_id) = victim?;
        inner.order.remove(&(full, oldest, frame_id));
        inner.nodes.remove(&frame_id);
        inner.evictable -= 1;
        tracing::trace!(frame_id = %frame_id, "evicted frame");
        Some(frame_id)
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.inner.lock().evictable
    }

    /// Returns the number of tracked frames.
    pub fn tracked(&self) -> usize {
        self.inner.lock().nodes.len()
    }
}

impl std::fmt::Debug for LruKReplacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LruKReplacer")
            .field("num_frames", &self.num_frames)
            .field("k", &self.k)
            .field("tracked", &inner.nodes.len())
            .field("evictable", &inner.evictable)
            .finish()
    }
}
