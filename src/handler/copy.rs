// src/handler/copy.rs

//! Copy-with-verify procedure (§4.5.2).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::cache::HashCache;
use crate::digest::{compute_digest, digest_with_cache, mtime_seconds};
use crate::errors::{Result, SyncError};
use crate::types::{SyncKind, SyncOutcome};

/// Copy `src_path` into its mirror counterpart at `output_path`, verifying
/// the result before it replaces any existing file.
///
/// Callers are responsible for Processing-set reentry suppression (§3); this
/// function assumes exclusive ownership of `output_path` for its duration.
/// The cache is `Arc`-shared (§3 "the Hash Cache is shared across handlers")
/// so hashing can be moved onto a blocking thread without borrowing across
/// the `.await`.
pub async fn sync_one_copy(
    cache: &Arc<dyn HashCache>,
    task_id: &str,
    src_path: &Path,
    output_path: &Path,
    kind: SyncKind,
) -> Result<SyncOutcome> {
    if !src_path.exists() {
        // §4.5.2 step 1: vanished before we got to it; nothing to do.
        return Ok(SyncOutcome::Skipped);
    }

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let src_metadata = tokio::fs::metadata(src_path).await?;
    let src_size = src_metadata.len();

    // Fast-path for the initial reconciliation pass: size equality alone is
    // enough to skip, trading correctness at the margins for throughput
    // across a large first-pass tree (§4.5.2 step 3).
    if kind == SyncKind::Initial {
        if let Ok(out_meta) = tokio::fs::metadata(output_path).await {
            if out_meta.len() == src_size {
                return Ok(SyncOutcome::Skipped);
            }
        }
    }

    let src_path_owned = src_path.to_path_buf();
    let task_id_owned = task_id.to_string();
    let cache_owned = Arc::clone(cache);
    let source_md5 = tokio::task::spawn_blocking(move || {
        digest_with_cache(cache_owned.as_ref(), &task_id_owned, &src_path_owned)
    })
    .await
    .map_err(|e| SyncError::Other(e.into()))??;

    if let Ok(out_meta) = tokio::fs::metadata(output_path).await {
        if out_meta.len() == src_size {
            let out_path_owned = output_path.to_path_buf();
            let target_md5 = tokio::task::spawn_blocking(move || compute_digest(&out_path_owned))
                .await
                .map_err(|e| SyncError::Other(e.into()))??;
            if target_md5 == source_md5 {
                return Ok(SyncOutcome::Skipped);
            }
        }
    }

    stage_and_verify(src_path, output_path, &source_md5, src_size).await?;
    let out_mtime = mtime_seconds(output_path)?;
    cache.put(task_id, output_path, &source_md5, out_mtime);

    let label = match kind {
        SyncKind::WriteComplete => "complete",
        _ => "copy",
    };
    info!(path = %src_path.display(), label, "synced file into mirror");

    Ok(SyncOutcome::Copied)
}

async fn stage_and_verify(
    src_path: &Path,
    output_path: &Path,
    source_md5: &str,
    source_size: u64,
) -> Result<()> {
    let tmp_path = tmp_path_for(output_path);

    let copy_result = tokio::fs::copy(src_path, &tmp_path).await;
    if let Err(err) = copy_result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }

    let verify = async {
        let tmp_metadata = tokio::fs::metadata(&tmp_path).await?;
        if tmp_metadata.len() != source_size {
            return Err(SyncError::Verification {
                path: output_path.display().to_string(),
                reason: format!(
                    "size mismatch: tmp={} source={}",
                    tmp_metadata.len(),
                    source_size
                ),
            });
        }

        let tmp_path_owned = tmp_path.clone();
        let tmp_md5 = tokio::task::spawn_blocking(move || compute_digest(&tmp_path_owned))
            .await
            .map_err(|e| SyncError::Other(e.into()))??;

        if tmp_md5 != source_md5 {
            return Err(SyncError::Verification {
                path: output_path.display().to_string(),
                reason: "md5 mismatch between staged copy and source".to_string(),
            });
        }

        Ok(())
    }
    .await;

    if let Err(err) = verify {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        error!(path = %output_path.display(), error = %err, "copy verification failed");
        return Err(err);
    }

    if tokio::fs::metadata(output_path).await.is_ok() {
        tokio::fs::remove_file(output_path).await?;
    }
    tokio::fs::rename(&tmp_path, output_path).await?;

    Ok(())
}

fn tmp_path_for(output_path: &Path) -> PathBuf {
    let mut s = output_path.as_os_str().to_os_string();
    s.push(".tmp");
    PathBuf::from(s)
}
