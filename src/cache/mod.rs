// src/cache/mod.rs

//! Hash Cache (§4.2): a persistent mapping `(task_id, absolute_path) ->
//! (digest, mtime, last_check)`, shared across every Sync Handler in the
//! process.

pub mod memory;
pub mod sqlite;

use std::path::Path;
use std::time::SystemTime;

pub use memory::MemoryHashCache;
pub use sqlite::SqliteHashCache;

/// A cached digest and the source mtime it was computed against.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub digest: String,
    pub mtime: f64,
}

/// Public contract for the shared content-hash cache.
///
/// Per §9's "dynamic singleton cache" design note, implementations MUST NOT
/// store `task_id` as instance state: the cache is constructed once by the
/// supervisor and `task_id` is passed as an explicit argument to every call,
/// so that independent tasks never contaminate each other's entries even
/// when they race to initialize the same process-wide cache.
///
/// A failed read returns `None` rather than propagating (§7 "cache
/// failure"); a failed write is logged and swallowed by the implementation.
pub trait HashCache: Send + Sync {
    /// Look up the cached entry for `(task_id, path)`, refreshing
    /// `last_check`. Returns `None` on a miss or on any storage error.
    fn get(&self, task_id: &str, path: &Path) -> Option<CacheEntry>;

    /// Upsert the entry for `(task_id, path)`. Failures are logged and
    /// swallowed; callers never see them.
    fn put(&self, task_id: &str, path: &Path, digest: &str, mtime: f64);

    /// Delete entries whose `last_check` predates `older_than` (background
    /// hygiene; §4.2).
    fn sweep(&self, older_than: SystemTime);
}

pub(crate) fn unix_seconds(t: SystemTime) -> f64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
