// src/reconciler.rs

//! Full-Tree Reconciler (§4.6): the initial walk that brings the mirror
//! into equality with the source, and the standalone `sync` admin action.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;
use walkdir::WalkDir;

use crate::errors::Result;
use crate::handler::SyncHandler;
use crate::types::SyncKind;

/// Bounded parallelism for the reconciler's own fan-out (§4.6 "bounded
/// parallelism to exploit I/O overlap"); independent of the live handler's
/// Batch Queue, which the reconciler bypasses entirely.
const RECONCILE_CONCURRENCY: usize = 16;

/// Tally of what a reconciliation pass did, surfacing the idempotence law
/// of §8 ("running the reconciler twice with no source changes results in
/// zero writes on the second run").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub total_files: usize,
    pub copied: usize,
    pub linked: usize,
    pub skipped: usize,
}

/// Run the Full-Tree Reconciler for `handler`'s task: walk `input_dir`,
/// invoke `sync_one(path, initial)` for every file, then sweep empty
/// directories out of `output_dir` (§4.6 steps 2-4).
pub async fn reconcile(handler: &Arc<SyncHandler>) -> Result<ReconcileStats> {
    tokio::fs::create_dir_all(handler.output_dir()).await?;

    let input_dir = handler.input_dir().to_path_buf();
    let files = tokio::task::spawn_blocking(move || collect_files(&input_dir))
        .await
        .map_err(|e| crate::errors::SyncError::Other(e.into()))??;

    let total = files.len();
    info!(task_id = %handler.task_id(), total, "reconciliation starting");

    let semaphore = Arc::new(Semaphore::new(RECONCILE_CONCURRENCY));
    let mut handles = Vec::with_capacity(total);
    let progress_step = (total / 20).max(1); // ~5%

    for (index, path) in files.into_iter().enumerate() {
        let handler = Arc::clone(handler);
        let permit = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = permit.acquire_owned().await;
            handler.sync_one(path, SyncKind::Initial).await
        }));

        if (index + 1) % progress_step == 0 || index + 1 == total {
            info!(
                task_id = %handler.task_id(),
                processed = index + 1,
                total,
                "reconciliation progress"
            );
        }
    }

    let mut stats = ReconcileStats {
        total_files: total,
        ..Default::default()
    };
    for handle in handles {
        use crate::types::SyncOutcome::*;
        match handle.await {
            Ok(Copied) => stats.copied += 1,
            Ok(Linked) => stats.linked += 1,
            Ok(Skipped) => stats.skipped += 1,
            Err(err) => tracing::error!(error = %err, "reconciler task panicked"),
        }
    }

    cleanup_empty_dirs(handler.output_dir()).await?;

    info!(task_id = %handler.task_id(), ?stats, "reconciliation complete");
    Ok(stats)
}

/// Enumerate every regular file under `root`, synchronously (called from
/// `spawn_blocking`).
fn collect_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .collect()
}

/// Bottom-up sweep of `output_dir` removing every directory left empty
/// (§4.6 step 4, §8 scenario 1 "cleanup_empty_dirs is a no-op" on an empty
/// tree). Unlike [`crate::handler::delete::cleanup_empty_ancestors`], which
/// only walks the ancestor chain of one removed path, this walks the whole
/// tree — used after a full reconciliation where many files may have
/// disappeared while the process was down.
pub async fn cleanup_empty_dirs(output_dir: &Path) -> Result<()> {
    if tokio::fs::metadata(output_dir).await.is_err() {
        return Ok(());
    }

    let output_dir = output_dir.to_path_buf();
    tokio::task::spawn_blocking(move || cleanup_empty_dirs_sync(&output_dir))
        .await
        .map_err(|e| crate::errors::SyncError::Other(e.into()))?
}

fn cleanup_empty_dirs_sync(root: &Path) -> Result<()> {
    // `contents_first` gives a post-order walk, so children are visited
    // (and potentially removed) before their parent is checked.
    for entry in WalkDir::new(root).contents_first(true).min_depth(1) {
        let entry = entry.map_err(|e| crate::errors::SyncError::Config(e.to_string()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        if std::fs::read_dir(path)?.next().is_none() {
            std::fs::remove_dir(path)?;
            tracing::info!(path = %path.display(), "[cleanup] removed empty mirror directory");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch_queue::BatchQueueConfig;
    use crate::cache::MemoryHashCache;
    use crate::config::TaskConfig;
    use crate::handler::log_writer::TaskLogWriter;
    use crate::write_monitor::WriteMonitorConfig;
    use std::io::Write;
    use tempfile::tempdir;

    fn build_handler(input: &Path, output: &Path, extensions: &[&str]) -> Arc<SyncHandler> {
        let cache: Arc<dyn crate::cache::HashCache> = Arc::new(MemoryHashCache::new());
        let log_writer = Arc::new(TaskLogWriter::new(output.parent().unwrap()));
        let task = TaskConfig::new(
            "t1".into(),
            "name".into(),
            input.to_string_lossy().to_string(),
            output.to_string_lossy().to_string(),
            extensions.iter().map(|s| s.to_string()).collect(),
        );
        let (handler, _rx) = SyncHandler::new(
            task,
            cache,
            log_writer,
            WriteMonitorConfig::default(),
            BatchQueueConfig::default(),
        );
        handler
    }

    #[tokio::test]
    async fn empty_tree_reconciles_to_nothing() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();

        let handler = build_handler(&input, &output, &["png"]);
        let stats = reconcile(&handler).await.unwrap();
        assert_eq!(stats.total_files, 0);
        assert!(output.exists());
    }

    #[tokio::test]
    async fn mixed_tree_copies_and_links_by_extension() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(input.join("a")).unwrap();
        std::fs::File::create(input.join("a/b.png")).unwrap().write_all(b"x").unwrap();
        std::fs::File::create(input.join("a/c.mkv")).unwrap().write_all(&vec![0u8; 100]).unwrap();

        let handler = build_handler(&input, &output, &["png"]);
        let stats = reconcile(&handler).await.unwrap();

        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.copied, 1);
        assert_eq!(stats.linked, 1);

        assert_eq!(std::fs::read(output.join("a/b.png")).unwrap(), b"x");
        let meta = std::fs::symlink_metadata(output.join("a/c.mkv")).unwrap();
        assert!(meta.file_type().is_symlink());
    }

    #[tokio::test]
    async fn second_pass_with_no_changes_skips_everything() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::File::create(input.join("b.png")).unwrap().write_all(b"x").unwrap();

        let handler = build_handler(&input, &output, &["png"]);
        reconcile(&handler).await.unwrap();
        let stats = reconcile(&handler).await.unwrap();

        assert_eq!(stats.copied, 0);
        assert_eq!(stats.skipped, 1);
    }
}
