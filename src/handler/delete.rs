// src/handler/delete.rs

//! Deletion reconciliation (§4.5.4): remove a mirror counterpart and sweep
//! any ancestor directories that are left empty inside `output_dir`.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::Result;

/// Remove `output_path` (tolerating a broken symlink as "present") and walk
/// up the mirror tree removing newly-empty ancestor directories, stopping
/// at the first non-empty ancestor or `output_root`.
pub async fn remove_mirror_counterpart(output_path: &Path, output_root: &Path) -> Result<()> {
    if exists_tolerating_broken_symlink(output_path).await {
        match tokio::fs::remove_file(output_path).await {
            Ok(()) => info!(path = %output_path.display(), "[delete]"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }

    cleanup_empty_ancestors(output_path, output_root).await
}

/// "Exists" here tolerates a link whose target has vanished — the spec
/// requires this so an orphaned symlink still gets cleaned up (§4.5.4).
async fn exists_tolerating_broken_symlink(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path).await.is_ok()
}

/// Walk up from `removed_path`'s parent directory, removing directories
/// that are now empty, until hitting a non-empty ancestor or `output_root`
/// itself.
pub async fn cleanup_empty_ancestors(removed_path: &Path, output_root: &Path) -> Result<()> {
    let mut dir: PathBuf = match removed_path.parent() {
        Some(p) => p.to_path_buf(),
        None => return Ok(()),
    };

    loop {
        if dir == *output_root || !dir.starts_with(output_root) {
            break;
        }

        if !is_empty_dir(&dir).await {
            break;
        }

        if tokio::fs::remove_dir(&dir).await.is_err() {
            break;
        }
        info!(path = %dir.display(), "[cleanup] removed empty mirror directory");

        dir = match dir.parent() {
            Some(p) => p.to_path_buf(),
            None => break,
        };
    }

    Ok(())
}

async fn is_empty_dir(dir: &Path) -> bool {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn removes_file_and_now_empty_parent() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("out");
        let nested = root.join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        let file = nested.join("x.png");
        std::fs::File::create(&file).unwrap();

        remove_mirror_counterpart(&file, &root).await.unwrap();

        assert!(!file.exists());
        assert!(!nested.exists());
        assert!(!root.join("a").exists());
        assert!(root.exists());
    }

    #[tokio::test]
    async fn stops_at_first_non_empty_ancestor() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("out");
        let nested = root.join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::File::create(root.join("a/sibling.png")).unwrap();
        let file = nested.join("x.png");
        std::fs::File::create(&file).unwrap();

        remove_mirror_counterpart(&file, &root).await.unwrap();

        assert!(!nested.exists());
        assert!(root.join("a").exists());
    }

    #[tokio::test]
    async fn removing_broken_symlink_counts_as_present() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("out");
        std::fs::create_dir_all(&root).unwrap();
        let link = root.join("broken.mkv");
        #[cfg(unix)]
        std::os::unix::fs::symlink("/does/not/exist", &link).unwrap();

        #[cfg(unix)]
        {
            remove_mirror_counterpart(&link, &root).await.unwrap();
            assert!(std::fs::symlink_metadata(&link).is_err());
        }
    }

    #[tokio::test]
    async fn missing_path_is_a_noop() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("out");
        std::fs::create_dir_all(&root).unwrap();
        let file = root.join("gone.png");
        remove_mirror_counterpart(&file, &root).await.unwrap();
    }
}
