//! System-wide constants for KeelDB.

// =============================================================================
// Page Geometry
// =============================================================================

/// Page size in bytes (4 KB).
///
/// This is a build-time constant: the disk manager and every buffer frame
/// move exactly this many bytes per page. It matches the typical SSD block
/// size and OS page size.
pub const PAGE_SIZE: usize = 4 * 1024;

// =============================================================================
// Buffer Pool Defaults
// =============================================================================

/// Default number of frames in the buffer pool.
pub const DEFAULT_POOL_SIZE: usize = 1024;

/// Minimum number of frames a pool configuration accepts.
pub const MIN_POOL_SIZE: usize = 1;

/// Default history window for the LRU-K replacer.
///
/// K = 2 distinguishes pages with a stable re-reference pattern from pages
/// touched once by a scan, at minimal bookkeeping cost.
pub const DEFAULT_REPLACER_K: usize = 2;

/// Default capacity of an extendible-hash bucket.
pub const DEFAULT_BUCKET_SIZE: usize = 4;
