// src/digest.rs

//! Content digest procedure (§4.5.5): cache-checked MD5 with an mmap
//! fast-path for large files.
//!
//! MD5 is used purely as a change-detection digest, never as a security
//! primitive (spec non-goal: cryptographic integrity).

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;

use md5::{Digest, Md5};

use crate::cache::HashCache;
use crate::errors::{Result, SyncError};

/// Files at or above this size are hashed via a read-only memory map instead
/// of chunked reads (§4.5.5, §9 "unprincipled defaults... make configurable").
pub const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;

const CHUNK_SIZE: usize = 8 * 1024;

/// Compute the MD5 digest of `path` directly, bypassing the cache entirely.
///
/// Used for the temp-file verification step of the copy procedure (§4.5.2),
/// which must never consult or pollute the cache with an unrenamed file.
pub fn compute_digest(path: &Path) -> Result<String> {
    let metadata = std::fs::metadata(path)?;
    let size = metadata.len();

    if size == 0 {
        return Ok(hex::encode(Md5::new().finalize()));
    }

    if size >= LARGE_FILE_THRESHOLD {
        return compute_digest_mmap(path);
    }

    compute_digest_chunked(path)
}

fn compute_digest_chunked(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = [0u8; CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

fn compute_digest_mmap(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    // SAFETY: the file is not concurrently truncated by another writer for
    // the duration of this call in our single-task-owns-the-path model
    // (Processing set, §3); a shrinking race is still possible in principle
    // and surfaces as an `Io` error from the OS rather than a panic.
    let mmap = unsafe { memmap2::Mmap::map(&file) }
        .map_err(|e| SyncError::Verification {
            path: path.display().to_string(),
            reason: format!("mmap failed: {e}"),
        })?;

    let mut hasher = Md5::new();
    hasher.update(&mmap[..]);
    Ok(hex::encode(hasher.finalize()))
}

/// mtime of `path` in fractional seconds since the epoch, matching the
/// cache's `mtime` column (§3).
pub fn mtime_seconds(path: &Path) -> Result<f64> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata.modified()?;
    let secs = modified
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Ok(secs)
}

/// Full digest procedure (§4.5.5): check the cache by mtime, else recompute
/// and write back.
pub fn digest_with_cache(cache: &dyn HashCache, task_id: &str, path: &Path) -> Result<String> {
    let mtime = mtime_seconds(path)?;

    if let Some(entry) = cache.get(task_id, path) {
        if entry.mtime == mtime {
            return Ok(entry.digest);
        }
    }

    let digest = compute_digest(path)?;
    cache.put(task_id, path, &digest, mtime);
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryHashCache;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn empty_file_hashes_to_md5_of_empty_string() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty");
        File::create(&path).unwrap();

        let digest = compute_digest(&path).unwrap();
        assert_eq!(digest, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn small_file_digest_is_stable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        File::create(&path).unwrap().write_all(b"hello world").unwrap();

        let d1 = compute_digest(&path).unwrap();
        let d2 = compute_digest(&path).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(d1, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn cache_hit_requires_matching_mtime() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        File::create(&path).unwrap().write_all(b"v1").unwrap();

        let cache = MemoryHashCache::new();
        let d1 = digest_with_cache(&cache, "task-1", &path).unwrap();

        // Stale entry with a different mtime must not be trusted.
        cache.put("task-1", &path, "stale-digest", mtime_seconds(&path).unwrap() - 100.0);
        let d2 = digest_with_cache(&cache, "task-1", &path).unwrap();
        assert_eq!(d1, d2);
        assert_ne!(d2, "stale-digest");
    }
}
