// src/cache/memory.rs

//! In-memory [`HashCache`] used for the standalone `mirrorsync` CLI (no
//! supervisor) and for tests, grounded in the teacher's `MemoryHashStore`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use super::{unix_seconds, CacheEntry, HashCache};

#[derive(Debug, Clone, PartialEq)]
struct StoredEntry {
    digest: String,
    mtime: f64,
    last_check: f64,
}

#[derive(Default)]
pub struct MemoryHashCache {
    map: Mutex<HashMap<(String, PathBuf), StoredEntry>>,
}

impl MemoryHashCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashCache for MemoryHashCache {
    fn get(&self, task_id: &str, path: &Path) -> Option<CacheEntry> {
        let mut map = self.map.lock().unwrap();
        let key = (task_id.to_string(), path.to_path_buf());
        let now = unix_seconds(SystemTime::now());

        let entry = map.get_mut(&key)?;
        entry.last_check = now;
        Some(CacheEntry {
            digest: entry.digest.clone(),
            mtime: entry.mtime,
        })
    }

    fn put(&self, task_id: &str, path: &Path, digest: &str, mtime: f64) {
        let mut map = self.map.lock().unwrap();
        let now = unix_seconds(SystemTime::now());
        map.insert(
            (task_id.to_string(), path.to_path_buf()),
            StoredEntry {
                digest: digest.to_string(),
                mtime,
                last_check: now,
            },
        );
    }

    fn sweep(&self, older_than: SystemTime) {
        let cutoff = unix_seconds(older_than);
        let mut map = self.map.lock().unwrap();
        map.retain(|_, entry| entry.last_check >= cutoff);
    }
}
