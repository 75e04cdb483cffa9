//! Extendible hash table.
//!
//! The buffer pool's page table: a concurrent associative map from logical
//! page ids to frame indices. The directory holds `2^global_depth` slots,
//! each pointing at a bucket; buckets carry a `local_depth` and may be
//! shared by several slots. A full bucket splits locally, doubling the
//! directory only when the splitting bucket already uses every addressing
//! bit (`local_depth == global_depth`).
//!
//! Buckets live in an arena and directory slots store arena indices, so a
//! split allocates one arena entry and rewrites only the aliased slots.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use parking_lot::RwLock;

/// A bounded sequence of key-value pairs addressed by a hash prefix.
struct Bucket<K, V> {
    /// Number of low-order hash bits this bucket is responsible for.
    local_depth: usize,
    items: Vec<(K, V)>,
}

impl<K: Eq, V> Bucket<K, V> {
    fn new(local_depth: usize, capacity: usize) -> Self {
        Self {
            local_depth,
            items: Vec::with_capacity(capacity),
        }
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.items.iter().position(|(k, _)| k == key) {
            Some(pos) => {
                self.items.swap_remove(pos);
                true
            }
            None => false,
        }
    }
}

struct TableInner<K, V> {
    /// Addressing width: the directory has `2^global_depth` slots.
    global_depth: usize,
    /// Directory slots, each an index into `buckets`.
    directory: Vec<usize>,
    /// Bucket arena; never shrinks.
    buckets: Vec<Bucket<K, V>>,
}

/// Concurrent extendible hash map.
///
/// Internally synchronized with a single reader-writer lock; lookups share
/// a read lock while inserts, removals, and structural changes (bucket
/// splits, directory doubling) run under the write lock.
///
/// The hasher is a type parameter so callers with known key distributions
/// (or tests needing determinism) can supply their own [`BuildHasher`].
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    inner: RwLock<TableInner<K, V>>,
    hash_builder: S,
    /// Bucket capacity B.
    bucket_size: usize,
}

impl<K, V> ExtendibleHashTable<K, V, RandomState>
where
    K: Hash + Eq,
{
    /// Creates a table with the given bucket capacity and the default
    /// hasher.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Creates a table with the given bucket capacity and hasher.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_size` is zero.
    pub fn with_hasher(bucket_size: usize, hash_builder: S) -> Self {
        assert!(bucket_size >= 1, "bucket size must be at least 1");
        Self {
            inner: RwLock::new(TableInner {
                global_depth: 0,
                directory: vec![0],
                buckets: vec![Bucket::new(0, bucket_size)],
            }),
            hash_builder,
            bucket_size,
        }
    }

    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.hash_builder.hash_one(key)
    }

    #[inline]
    fn slot_of(global_depth: usize, hash: u64) -> usize {
        (hash & ((1u64 << global_depth) - 1)) as usize
    }

    /// Inserts a key-value pair, overwriting the value in place when the
    /// key is already present.
    ///
    /// A full bucket is split, doubling the directory when the bucket
    /// already uses every addressing bit; pathological collisions on the
    /// low bits may force several splits for one insert, but each split
    /// widens the distinguishing prefix so the loop always terminates.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash(&key);
        let mut inner = self.inner.write();

        loop {
            let slot = Self::slot_of(inner.global_depth, hash);
            let bucket_idx = inner.directory[slot];
            let bucket = &mut inner.buckets[bucket_idx];

            if let Some(pos) = bucket.items.iter().position(|(k, _)| *k == key) {
                bucket.items[pos].1 = value;
                return;
            }
            if bucket.items.len() < self.bucket_size {
                bucket.items.push((key, value));
                return;
            }

            self.split(&mut inner, bucket_idx);
        }
    }

    /// Splits the full bucket at `bucket_idx`, doubling the directory
    /// first when the bucket's depth has caught up with the directory's.
    fn split(&self, inner: &mut TableInner<K, V>, bucket_idx: usize) {
        debug_assert!(inner.buckets[bucket_idx].local_depth <= inner.global_depth);

        if inner.buckets[bucket_idx].local_depth == inner.global_depth {
            // Every slot i gains a twin at i | (1 << global_depth) aliasing
            // the same bucket.
            let slots = inner.directory.len();
            for i in 0..slots {
                let twin = inner.directory[i];
                inner.directory.push(twin);
            }
            inner.global_depth += 1;
            tracing::trace!(global_depth = inner.global_depth, "directory doubled");
        }

        inner.buckets[bucket_idx].local_depth += 1;
        let new_depth = inner.buckets[bucket_idx].local_depth;
        let distinguishing_bit = 1u64 << (new_depth - 1);

        let sibling_idx = inner.buckets.len();
        inner
            .buckets
            .push(Bucket::new(new_depth, self.bucket_size));

        // Redirect the aliased slots whose newly significant bit is set.
        for slot in 0..inner.directory.len() {
            if inner.directory[slot] == bucket_idx
                && (slot as u64) & distinguishing_bit != 0
            {
                inner.directory[slot] = sibling_idx;
            }
        }

        // Redistribute by the newly significant hash bit.
        let items = std::mem::take(&mut inner.buckets[bucket_idx].items);
        let (moved, kept): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|(k, _)| self.hash(k) & distinguishing_bit != 0);
        inner.buckets[bucket_idx].items = kept;
        inner.buckets[sibling_idx].items = moved;
    }

    /// Removes a key, returning whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        let hash = self.hash(key);
        let mut inner = self.inner.write();
        let slot = Self::slot_of(inner.global_depth, hash);
        let bucket_idx = inner.directory[slot];
        inner.buckets[bucket_idx].remove(key)
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        let inner = self.inner.read();
        inner.buckets.iter().map(|b| b.items.len()).sum()
    }

    /// Returns true if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the directory's addressing width.
    pub fn global_depth(&self) -> usize {
        self.inner.read().global_depth
    }

    /// Returns the local depth of the bucket behind directory slot `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is outside the directory.
    pub fn local_depth(&self, slot: usize) -> usize {
        let inner = self.inner.read();
        inner.buckets[inner.directory[slot]].local_depth
    }

    /// Returns the number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        self.inner.read().buckets.len()
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    /// Returns the value associated with `key`, if present.
    pub fn find(&self, key: &K) -> Option<V> {
        let hash = self.hash(key);
        let inner = self.inner.read();
        let slot = Self::slot_of(inner.global_depth, hash);
        inner.buckets[inner.directory[slot]].get(key).cloned()
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    /// Returns a snapshot of every stored key.
    ///
    /// The order is unspecified. Callers iterating a live table (for
    /// example to flush every cached page) should treat the snapshot as the
    /// membership at the time of the call.
    pub fn keys(&self) -> Vec<K> {
        let inner = self.inner.read();
        inner
            .buckets
            .iter()
            .flat_map(|b| b.items.iter().map(|(k, _)| k.clone()))
            .collect()
    }
}

impl<K, V, S> std::fmt::Debug for ExtendibleHashTable<K, V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ExtendibleHashTable")
            .field("global_depth", &inner.global_depth)
            .field("num_buckets", &inner.buckets.len())
            .field("directory_slots", &inner.directory.len())
            .finish()
    }
}
