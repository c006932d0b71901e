// src/handler/symlink.rs

//! Symlink-path `sync_one` (§4.5.3): files outside the copy set are
//! materialized in the mirror as a symbolic link back to the source.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::Result;
use crate::types::SyncOutcome;

/// Ensure `output_path` is a symlink to `src_path`. Skips if it already is
/// one (by target-path equality, tolerating a broken link on the source
/// side — §4.5.3 step 1a).
pub async fn sync_one_symlink(src_path: &Path, output_path: &Path) -> Result<SyncOutcome> {
    if tokio::fs::symlink_metadata(src_path).await.is_err() {
        // §4.5.2 step 1 applies symmetrically here: vanished before we got
        // to it.
        return Ok(SyncOutcome::Skipped);
    }

    ensure_symlink(src_path, output_path).await
}

/// Create (or repair) the symlink at `output_path` pointing at the absolute
/// path of `src_path`, used both by `sync_one_symlink` and by the immediate
/// `EnsureSymlinkNow` dispatch command (§4.5.1 step 5).
pub async fn ensure_symlink(src_path: &Path, output_path: &Path) -> Result<SyncOutcome> {
    let target = absolute_path(src_path)?;

    match tokio::fs::symlink_metadata(output_path).await {
        Ok(meta) if meta.file_type().is_symlink() => {
            if let Ok(existing) = tokio::fs::read_link(output_path).await {
                if existing == target {
                    return Ok(SyncOutcome::Skipped);
                }
            }
            tokio::fs::remove_file(output_path).await?;
        }
        Ok(_) => {
            // A regular file or directory occupies the mirror slot.
            tokio::fs::remove_file(output_path).await?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    create_symlink(&target, output_path).await?;
    info!(path = %output_path.display(), target = %target.display(), "[link]");
    Ok(SyncOutcome::Linked)
}

/// Resolve `path` to an absolute path without requiring it to already
/// exist in full (only its parent needs to, in the common case). Symlinks
/// in the mirror must point at *absolute* source paths (§6).
fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

#[cfg(unix)]
async fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    let target = target.to_path_buf();
    let link = link.to_path_buf();
    tokio::task::spawn_blocking(move || std::os::unix::fs::symlink(&target, &link))
        .await
        .map_err(|e| crate::errors::SyncError::Other(e.into()))??;
    Ok(())
}

#[cfg(windows)]
async fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    let target = target.to_path_buf();
    let link = link.to_path_buf();
    tokio::task::spawn_blocking(move || std::os::windows::fs::symlink_file(&target, &link))
        .await
        .map_err(|e| crate::errors::SyncError::Other(e.into()))??;
    Ok(())
}
