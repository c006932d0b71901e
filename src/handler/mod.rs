// src/handler/mod.rs

//! Sync Handler (§4.5): the per-task engine tying together event dispatch,
//! the Write-Completion Monitor, the Batch Queue, and the copy/symlink
//! `sync_one` procedures.
//!
//! Split the same way the teacher splits its DAG engine: [`dispatch`] is a
//! pure, synchronous decision function (no IO, no Tokio) that is easy to
//! unit test exhaustively; [`SyncHandler`] is the async IO shell that owns
//! the handler's exclusive state (§3 "ownership") and carries out the
//! commands [`dispatch`] returns.

pub mod copy;
pub mod delete;
pub mod dispatch;
pub mod log_writer;
pub mod symlink;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::batch_queue::{BatchQueue, BatchQueueConfig};
use crate::cache::HashCache;
use crate::config::TaskConfig;
use crate::errors::Result;
use crate::types::{EventKind, SyncKind, SyncOutcome};
use crate::watch::path_utils::{is_within, mirror_path};
use crate::watch::{FsEvent, WatchSource};
use crate::write_monitor::{MonitorOutcome, MonitorResult, WriteMonitorConfig, WriteMonitorSet};

pub use dispatch::{dispatch, DispatchState, HandlerCommand};

/// Interval at which the handler's live loop checks whether the Batch Queue
/// is ready to drain; independent of the queue's own `interval` threshold
/// (§4.4), this just bounds dispatch latency.
const DRAIN_TICK: Duration = Duration::from_millis(200);

/// Per-task engine state (§3 "ownership": each Sync Handler exclusively
/// owns its WriteMonitor map, Processing set, Symlink-processed set, and
/// Batch Queue). The Hash Cache is the one piece of state shared across
/// handlers, held here as an `Arc`.
pub struct SyncHandler {
    task: TaskConfig,
    cache: Arc<dyn HashCache>,
    log_writer: Arc<log_writer::TaskLogWriter>,
    queue: BatchQueue,
    monitors: Mutex<WriteMonitorSet>,
    dispatch_state: Mutex<DispatchState>,
    processing: Mutex<HashSet<PathBuf>>,
}

impl SyncHandler {
    /// Build a handler and the channel its Write-Completion Monitors report
    /// outcomes on. The caller drives `monitor_rx` into [`run_live`] (or
    /// polls it manually in tests).
    pub fn new(
        task: TaskConfig,
        cache: Arc<dyn HashCache>,
        log_writer: Arc<log_writer::TaskLogWriter>,
        monitor_config: WriteMonitorConfig,
        batch_config: BatchQueueConfig,
    ) -> (Arc<Self>, mpsc::Receiver<MonitorResult>) {
        let (monitor_tx, monitor_rx) = mpsc::channel(256);
        let handler = Arc::new(Self {
            task,
            cache,
            log_writer,
            queue: BatchQueue::new(batch_config),
            monitors: Mutex::new(WriteMonitorSet::new(monitor_config, monitor_tx)),
            dispatch_state: Mutex::new(DispatchState::new()),
            processing: Mutex::new(HashSet::new()),
        });
        (handler, monitor_rx)
    }

    pub fn task_id(&self) -> &str {
        &self.task.task_id
    }

    pub fn task(&self) -> &TaskConfig {
        &self.task
    }

    pub fn input_dir(&self) -> &Path {
        Path::new(&self.task.input_dir)
    }

    pub fn output_dir(&self) -> &Path {
        Path::new(&self.task.output_dir)
    }

    /// `output_dir + relative(input_dir, path)` (§4.5.2 step 2).
    pub fn mirror_path(&self, src_path: &Path) -> PathBuf {
        mirror_path(self.input_dir(), self.output_dir(), src_path)
    }

    /// Drive a single normalized filesystem event through the pure
    /// dispatcher and carry out the resulting commands (§4.5.1 step 1
    /// restricts to paths rooted in `input_dir` and drops directory
    /// events; both are also enforced inside `dispatch`, but we check the
    /// root here since `dispatch` doesn't have `input_dir` baked in).
    pub async fn handle_event(&self, event: FsEvent, supports_closed: bool) {
        if event.is_directory {
            return;
        }
        if !is_within(self.input_dir(), &event.src_path) {
            return;
        }

        let commands = {
            let mut state = self.dispatch_state.lock().await;
            dispatch(&mut state, &self.task, &event, supports_closed)
        };

        for command in commands {
            self.execute_command(command).await;
        }
    }

    async fn execute_command(&self, command: HandlerCommand) {
        match command {
            HandlerCommand::StartWriteMonitor(path) => {
                self.monitors.lock().await.start_or_restart(path);
            }
            HandlerCommand::CancelWriteMonitor(path) => {
                self.monitors.lock().await.cancel(&path);
            }
            HandlerCommand::Enqueue(path, kind) => {
                self.queue.enqueue(path, kind).await;
            }
            HandlerCommand::EnsureSymlinkNow(path) => {
                let output_path = self.mirror_path(&path);
                if let Err(err) = symlink::ensure_symlink(&path, &output_path).await {
                    self.log_error(&path, &err);
                }
            }
            HandlerCommand::DeleteMirror(path) => {
                let output_path = self.mirror_path(&path);
                if let Err(err) = delete::remove_mirror_counterpart(&output_path, self.output_dir()).await {
                    self.log_error(&path, &err);
                }
            }
        }
    }

    /// Consume one Write-Completion Monitor outcome (§4.3, §4.5.1 step 4).
    pub async fn handle_monitor_result(&self, result: MonitorResult) {
        match result.outcome {
            MonitorOutcome::Ready => {
                self.queue.enqueue(result.path, SyncKind::WriteComplete).await;
            }
            MonitorOutcome::Timeout => {
                warn!(path = %result.path.display(), "write-completion monitor timed out");
            }
            MonitorOutcome::Vanished => {
                let output_path = self.mirror_path(&result.path);
                let _ = delete::remove_mirror_counterpart(&output_path, self.output_dir()).await;
            }
        }
    }

    /// `sync_one(path, kind)` (§4.5.2 / §4.5.3), dispatching to the copy or
    /// symlink procedure by extension class, with Processing-set reentry
    /// suppression (§3, §5 "Ordering guarantees").
    pub async fn sync_one(&self, path: PathBuf, kind: SyncKind) -> SyncOutcome {
        {
            let mut processing = self.processing.lock().await;
            if processing.contains(&path) {
                drop(processing);
                // Not lost: re-enqueued to run after the in-flight op.
                self.queue.enqueue(path, kind).await;
                return SyncOutcome::Skipped;
            }
            processing.insert(path.clone());
        }

        let outcome = self.sync_one_inner(&path, kind).await;

        self.processing.lock().await.remove(&path);
        outcome
    }

    async fn sync_one_inner(&self, path: &Path, kind: SyncKind) -> SyncOutcome {
        let output_path = self.mirror_path(path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let result = if self.task.is_in_copy_set(&file_name) {
            copy::sync_one_copy(&self.cache, &self.task.task_id, path, &output_path, kind).await
        } else {
            symlink::sync_one_symlink(path, &output_path).await
        };

        match result {
            Ok(outcome) => {
                if outcome != SyncOutcome::Skipped {
                    self.log_outcome(path, kind, outcome);
                }
                outcome
            }
            Err(err) => {
                self.log_error(path, &err);
                SyncOutcome::Skipped
            }
        }
    }

    fn log_outcome(&self, path: &Path, kind: SyncKind, outcome: SyncOutcome) {
        let label = match (kind, outcome) {
            (_, SyncOutcome::Linked) => "link",
            (SyncKind::WriteComplete, SyncOutcome::Copied) => "complete",
            (_, SyncOutcome::Copied) => "copy",
            (_, SyncOutcome::Skipped) => return,
        };
        let message = format!("[{label}] {}", path.display());
        info!(path = %path.display(), label, "sync_one outcome");
        self.log_writer.log(&self.task.task_id, "INFO", "sync_handler", &message);
    }

    fn log_error(&self, path: &Path, err: &crate::errors::SyncError) {
        error!(path = %path.display(), error = %err, "sync_one failed");
        let message = format!("error syncing {}: {err}", path.display());
        self.log_writer.log(&self.task.task_id, "ERROR", "sync_handler", &message);
    }

    /// Pop whatever the Batch Queue is ready to release and process the
    /// batch concurrently (§4.4: "within a drain, items execute
    /// concurrently and may complete out of order").
    pub async fn drain_and_process(self: &Arc<Self>) {
        let batch = self.queue.drain_ready().await;
        if batch.is_empty() {
            return;
        }

        let mut handles = Vec::with_capacity(batch.len());
        for item in batch {
            let this = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                this.sync_one(item.path, item.kind).await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Live reaction loop (§4.5, §5): pumps watch-source events, monitor
    /// outcomes, and periodic batch drains until `stop_rx` fires or the
    /// watch source is exhausted.
    pub async fn run_live(
        self: Arc<Self>,
        mut watch: Box<dyn WatchSource>,
        mut monitor_rx: mpsc::Receiver<MonitorResult>,
        mut stop_rx: oneshot::Receiver<()>,
    ) {
        let supports_closed = watch.supports_closed_events();
        let mut ticker = tokio::time::interval(DRAIN_TICK);

        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    info!(task_id = %self.task.task_id, "sync handler stop requested");
                    break;
                }
                event = watch.next_event() => {
                    match event {
                        Some(ev) => self.handle_event(ev, supports_closed).await,
                        None => {
                            warn!(task_id = %self.task.task_id, "watch source exhausted");
                            break;
                        }
                    }
                }
                Some(result) = monitor_rx.recv() => {
                    self.handle_monitor_result(result).await;
                }
                _ = ticker.tick() => {
                    self.drain_and_process().await;
                }
            }
        }

        // One last drain so events enqueued just before shutdown aren't
        // silently dropped from a `stopped` task's perspective; in-flight
        // `sync_one` calls are still allowed to finish (§5 cancellation
        // step d) by the Supervisor's bounded join.
        self.drain_and_process().await;
        self.monitors.lock().await.cancel_all();
        debug!(task_id = %self.task.task_id, "sync handler live loop exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryHashCache;
    use std::io::Write;
    use tempfile::tempdir;

    fn task(extensions: &[&str], input: &Path, output: &Path) -> TaskConfig {
        TaskConfig::new(
            "t1".into(),
            "name".into(),
            input.to_string_lossy().to_string(),
            output.to_string_lossy().to_string(),
            extensions.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn run_live_drains_a_mocked_closed_event_before_exiting() {
        use crate::watch::MockWatchSource;

        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        let src = input.join("a.png");
        std::fs::File::create(&src).unwrap().write_all(b"mocked").unwrap();

        let cache: Arc<dyn HashCache> = Arc::new(MemoryHashCache::new());
        let log_writer = Arc::new(log_writer::TaskLogWriter::new(dir.path()));
        let (handler, monitor_rx) = SyncHandler::new(
            task(&["png"], &input, &output),
            cache,
            log_writer,
            WriteMonitorConfig::default(),
            BatchQueueConfig { batch_size: 1, interval: Duration::from_secs(3600) },
        );

        let mut watch = MockWatchSource::new().with_closed_event_support();
        watch.push(FsEvent {
            src_path: src.clone(),
            dest_path: None,
            kind: EventKind::Closed,
            is_directory: false,
        });

        let (_stop_tx, stop_rx) = oneshot::channel();
        handler.run_live(Box::new(watch), monitor_rx, stop_rx).await;

        assert_eq!(std::fs::read(output.join("a.png")).unwrap(), b"mocked");
    }

    #[tokio::test]
    async fn event_for_copy_set_file_ends_up_copied_after_drain() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        let src = input.join("a.png");
        std::fs::File::create(&src).unwrap().write_all(b"hello").unwrap();

        let cache: Arc<dyn HashCache> = Arc::new(MemoryHashCache::new());
        let log_writer = Arc::new(log_writer::TaskLogWriter::new(dir.path()));
        let (handler, _monitor_rx) = SyncHandler::new(
            task(&["png"], &input, &output),
            cache,
            log_writer,
            WriteMonitorConfig::default(),
            BatchQueueConfig { batch_size: 1, interval: Duration::from_secs(3600) },
        );

        handler
            .handle_event(
                FsEvent {
                    src_path: src.clone(),
                    dest_path: None,
                    kind: EventKind::Closed,
                    is_directory: false,
                },
                true,
            )
            .await;

        handler.drain_and_process().await;

        assert_eq!(std::fs::read(output.join("a.png")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn event_for_non_copy_set_file_links_immediately() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        let src = input.join("a.mkv");
        std::fs::File::create(&src).unwrap();

        let cache: Arc<dyn HashCache> = Arc::new(MemoryHashCache::new());
        let log_writer = Arc::new(log_writer::TaskLogWriter::new(dir.path()));
        let (handler, _monitor_rx) = SyncHandler::new(
            task(&["png"], &input, &output),
            cache,
            log_writer,
            WriteMonitorConfig::default(),
            BatchQueueConfig::default(),
        );

        handler
            .handle_event(
                FsEvent {
                    src_path: src.clone(),
                    dest_path: None,
                    kind: EventKind::Created,
                    is_directory: false,
                },
                false,
            )
            .await;

        let meta = std::fs::symlink_metadata(output.join("a.mkv")).unwrap();
        assert!(meta.file_type().is_symlink());
    }

    #[tokio::test]
    async fn reentrant_sync_one_is_requeued_not_dropped() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        let src = input.join("a.png");
        std::fs::File::create(&src).unwrap().write_all(b"v1").unwrap();

        let cache: Arc<dyn HashCache> = Arc::new(MemoryHashCache::new());
        let log_writer = Arc::new(log_writer::TaskLogWriter::new(dir.path()));
        let (handler, _monitor_rx) = SyncHandler::new(
            task(&["png"], &input, &output),
            cache,
            log_writer,
            WriteMonitorConfig::default(),
            BatchQueueConfig::default(),
        );

        handler.processing.lock().await.insert(src.clone());
        let outcome = handler.sync_one(src.clone(), SyncKind::WriteComplete).await;
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert_eq!(handler.queue.len().await, 1);
    }
}
