// src/cache/sqlite.rs

//! SQLite-backed [`HashCache`] (§6: `<root>/.db/file_cache.db`).

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use super::{unix_seconds, CacheEntry, HashCache};

/// Single on-disk key-value file shared across every Sync Handler in the
/// process (§4.2). Concurrent callers are serialized through an internal
/// mutex around one long-lived connection, which gives the "serializable
/// per-key upsert" guarantee the contract requires without each handler
/// needing its own pool.
pub struct SqliteHashCache {
    conn: Mutex<Connection>,
}

impl SqliteHashCache {
    /// Open (creating if necessary) the cache database at `db_path`,
    /// typically `<root>/.db/file_cache.db`.
    pub fn open(db_path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        let db_path: PathBuf = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }

        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS file_cache (
                file_path   TEXT NOT NULL,
                task_id     TEXT NOT NULL,
                md5_hash    TEXT NOT NULL,
                mtime       REAL NOT NULL,
                last_check  TIMESTAMP NOT NULL,
                PRIMARY KEY (file_path, task_id)
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl HashCache for SqliteHashCache {
    fn get(&self, task_id: &str, path: &Path) -> Option<CacheEntry> {
        let path_str = path.to_string_lossy();
        let now = unix_seconds(SystemTime::now());

        let conn = match self.conn.lock() {
            Ok(g) => g,
            Err(_) => {
                warn!("hash cache mutex poisoned; treating as a miss");
                return None;
            }
        };

        let row: Option<(String, f64)> = conn
            .query_row(
                "SELECT md5_hash, mtime FROM file_cache WHERE file_path = ?1 AND task_id = ?2",
                params![path_str, task_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .unwrap_or_else(|err| {
                warn!(error = %err, "hash cache read failed; treating as a miss");
                None
            });

        let (digest, mtime) = row?;

        if let Err(err) = conn.execute(
            "UPDATE file_cache SET last_check = ?1 WHERE file_path = ?2 AND task_id = ?3",
            params![now, path_str, task_id],
        ) {
            warn!(error = %err, "failed to bump last_check on cache hit");
        }

        Some(CacheEntry { digest, mtime })
    }

    fn put(&self, task_id: &str, path: &Path, digest: &str, mtime: f64) {
        let path_str = path.to_string_lossy();
        let now = unix_seconds(SystemTime::now());

        let conn = match self.conn.lock() {
            Ok(g) => g,
            Err(_) => {
                warn!("hash cache mutex poisoned; dropping write");
                return;
            }
        };

        let result = conn.execute(
            "INSERT INTO file_cache (file_path, task_id, md5_hash, mtime, last_check)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(file_path, task_id)
             DO UPDATE SET md5_hash = excluded.md5_hash, mtime = excluded.mtime, last_check = excluded.last_check",
            params![path_str, task_id, digest, mtime, now],
        );

        if let Err(err) = result {
            warn!(error = %err, path = %path_str, "hash cache write failed; next read will recompute");
        }
    }

    fn sweep(&self, older_than: SystemTime) {
        let cutoff = unix_seconds(older_than);

        let conn = match self.conn.lock() {
            Ok(g) => g,
            Err(_) => {
                warn!("hash cache mutex poisoned; skipping sweep");
                return;
            }
        };

        match conn.execute("DELETE FROM file_cache WHERE last_check < ?1", params![cutoff]) {
            Ok(removed) if removed > 0 => {
                tracing::info!(removed, "swept stale hash cache entries");
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "hash cache sweep failed"),
        }
    }
}
