// src/supervisor.rs

//! Task Supervisor (§4.7): owns each Sync Handler's lifecycle (start, stop,
//! update) and persists the task registry.
//!
//! Grounded in the teacher's executor loop (`spawn_executor` /
//! `ActiveTask`): one map from id to a cancel handle plus a `JoinHandle`,
//! with cooperative cancellation via a oneshot channel (§5 "Cancellation").

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::batch_queue::BatchQueueConfig;
use crate::cache::{HashCache, SqliteHashCache};
use crate::config::{TaskConfig, TaskPatch, TaskRegistry};
use crate::errors::{Result, SyncError};
use crate::handler::log_writer::TaskLogWriter;
use crate::handler::SyncHandler;
use crate::reconciler;
use crate::types::{ActionOutcome, TaskStatus};
use crate::watch::{NotifyWatchSource, WatchSource};
use crate::write_monitor::WriteMonitorConfig;

/// Bound on how long `stop` waits for a task's worker to join (§4.7, §5).
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

struct ActiveTask {
    stop_tx: oneshot::Sender<()>,
    join: tokio::task::JoinHandle<()>,
}

/// Owns the process-wide set of configured tasks and the (at most one per
/// `task_id`) live worker for each running one.
pub struct Supervisor {
    state_dir: PathBuf,
    registry: TaskRegistry,
    cache: Arc<dyn HashCache>,
    log_writer: Arc<TaskLogWriter>,
    tasks: Mutex<HashMap<String, TaskConfig>>,
    active: Mutex<HashMap<String, ActiveTask>>,
}

impl Supervisor {
    /// Open (or create) the durable state rooted at `state_dir`: the task
    /// registry (`tasks.json`) and the shared Hash Cache
    /// (`.db/file_cache.db`, §6).
    pub fn new(state_dir: impl Into<PathBuf>) -> Result<Self> {
        let state_dir = state_dir.into();
        let cache = SqliteHashCache::open(state_dir.join(".db").join("file_cache.db"))
            .map_err(|e| SyncError::Cache(e.to_string()))?;

        Ok(Self {
            registry: TaskRegistry::new(state_dir.clone()),
            cache: Arc::new(cache),
            log_writer: Arc::new(TaskLogWriter::new(state_dir.clone())),
            tasks: Mutex::new(HashMap::new()),
            active: Mutex::new(HashMap::new()),
            state_dir,
        })
    }

    /// Load the registry from disk and, for every task whose last-known
    /// status was `running`, attempt to restart it; on failure it is left
    /// `stopped` (§4.7 "On process start").
    pub async fn bootstrap(self: &Arc<Self>) -> Result<()> {
        let loaded = self.registry.load()?;
        let to_restart: Vec<String> = loaded
            .iter()
            .filter(|t| t.status == TaskStatus::Running)
            .map(|t| t.task_id.clone())
            .collect();

        {
            let mut tasks = self.tasks.lock().await;
            for mut task in loaded {
                task.status = TaskStatus::Stopped;
                tasks.insert(task.task_id.clone(), task);
            }
        }

        for task_id in to_restart {
            if let Err(err) = self.start(&task_id).await {
                warn!(task_id, error = %err, "failed to restart task on bootstrap");
            }
        }

        Ok(())
    }

    pub async fn add(
        &self,
        name: String,
        input_dir: String,
        output_dir: String,
        extensions: std::collections::HashSet<String>,
    ) -> Result<TaskConfig> {
        let task = TaskConfig::new(Uuid::new_v4().to_string(), name, input_dir, output_dir, extensions);

        let mut tasks = self.tasks.lock().await;
        tasks.insert(task.task_id.clone(), task.clone());
        self.persist(&tasks);
        Ok(task)
    }

    pub async fn get(&self, task_id: &str) -> Option<TaskConfig> {
        self.tasks.lock().await.get(task_id).cloned()
    }

    pub async fn get_all(&self) -> Vec<TaskConfig> {
        self.tasks.lock().await.values().cloned().collect()
    }

    /// `update` (§4.7): rejected while the task is running.
    pub async fn update(&self, task_id: &str, patch: TaskPatch) -> Result<TaskConfig> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| SyncError::TaskNotFound(task_id.to_string()))?;

        if task.status == TaskStatus::Running {
            return Err(SyncError::TaskRunning(task_id.to_string()));
        }

        task.apply_patch(patch);
        let updated = task.clone();
        self.persist(&tasks);
        Ok(updated)
    }

    /// `remove` (§4.7): stops first if running.
    pub async fn remove(&self, task_id: &str) -> Result<()> {
        if self.is_running(task_id).await {
            self.stop(task_id).await?;
        }

        let mut tasks = self.tasks.lock().await;
        if tasks.remove(task_id).is_none() {
            return Err(SyncError::TaskNotFound(task_id.to_string()));
        }
        self.persist(&tasks);
        Ok(())
    }

    async fn is_running(&self, task_id: &str) -> bool {
        self.active.lock().await.contains_key(task_id)
    }

    /// Start the task's worker: the Full-Tree Reconciler followed by an
    /// endless watch loop (§4.7).
    pub async fn start(self: &Arc<Self>, task_id: &str) -> Result<ActionOutcome> {
        if self.is_running(task_id).await {
            return Ok(ActionOutcome::failed("已在运行"));
        }

        let task = self
            .get(task_id)
            .await
            .ok_or_else(|| SyncError::TaskNotFound(task_id.to_string()))?;

        let input_dir = PathBuf::from(&task.input_dir);
        tokio::fs::create_dir_all(&task.output_dir).await?;

        let (handler, monitor_rx) = SyncHandler::new(
            task.clone(),
            Arc::clone(&self.cache),
            Arc::clone(&self.log_writer),
            WriteMonitorConfig::default(),
            BatchQueueConfig::default(),
        );

        let watch: Box<dyn WatchSource> = match NotifyWatchSource::spawn(&input_dir) {
            Ok(source) => Box::new(source),
            Err(err) => {
                error!(task_id, error = %err, "failed to start watch source");
                return Err(SyncError::WatchSource(err.to_string()));
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let worker_handler = Arc::clone(&handler);
        let task_id_owned = task_id.to_string();

        let join = tokio::spawn(async move {
            if let Err(err) = reconciler::reconcile(&worker_handler).await {
                error!(task_id = %task_id_owned, error = %err, "initial reconciliation failed");
            }
            worker_handler.run_live(watch, monitor_rx, stop_rx).await;
        });

        self.active
            .lock()
            .await
            .insert(task_id.to_string(), ActiveTask { stop_tx, join });

        self.mark_status(task_id, TaskStatus::Running).await?;
        info!(task_id, "task started");
        Ok(ActionOutcome::ok())
    }

    /// Stop the task: signal the worker, join within [`STOP_JOIN_TIMEOUT`],
    /// mark `stopped` regardless of whether the join completed in time
    /// (§4.7, §5 cancellation step e).
    pub async fn stop(&self, task_id: &str) -> Result<ActionOutcome> {
        let active = self.active.lock().await.remove(task_id);

        let Some(active) = active else {
            self.mark_status(task_id, TaskStatus::Stopped).await?;
            return Ok(ActionOutcome::ok_with("task was not running"));
        };

        let _ = active.stop_tx.send(());

        match tokio::time::timeout(STOP_JOIN_TIMEOUT, active.join).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(task_id, error = %err, "sync handler worker panicked"),
            Err(_) => warn!(task_id, "stop timed out after {:?}; marking stopped anyway", STOP_JOIN_TIMEOUT),
        }

        self.mark_status(task_id, TaskStatus::Stopped).await?;
        info!(task_id, "task stopped");
        Ok(ActionOutcome::ok())
    }

    /// `POST /api/tasks/{id}/sync` (§6): run the Full-Tree Reconciler
    /// synchronously, independent of whether the task is currently running
    /// a live watch loop.
    pub async fn sync_now(&self, task_id: &str) -> Result<ActionOutcome> {
        let task = self
            .get(task_id)
            .await
            .ok_or_else(|| SyncError::TaskNotFound(task_id.to_string()))?;

        let (handler, _monitor_rx) = SyncHandler::new(
            task,
            Arc::clone(&self.cache),
            Arc::clone(&self.log_writer),
            WriteMonitorConfig::default(),
            BatchQueueConfig::default(),
        );

        let stats = reconciler::reconcile(&handler).await?;
        Ok(ActionOutcome::ok_with(format!(
            "synced {} files ({} copied, {} linked, {} skipped)",
            stats.total_files, stats.copied, stats.linked, stats.skipped
        )))
    }

    pub fn log_writer(&self) -> &Arc<TaskLogWriter> {
        &self.log_writer
    }

    pub fn state_dir(&self) -> &std::path::Path {
        &self.state_dir
    }

    async fn mark_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| SyncError::TaskNotFound(task_id.to_string()))?;

        task.status = status;
        let now = Utc::now().to_rfc3339();
        match status {
            TaskStatus::Running => task.start_time = Some(now),
            TaskStatus::Stopped => task.stop_time = Some(now),
        }
        self.persist(&tasks);
        Ok(())
    }

    fn persist(&self, tasks: &HashMap<String, TaskConfig>) {
        let list: Vec<TaskConfig> = tasks.values().cloned().collect();
        crate::config::registry::save_best_effort(&self.registry, &list);
    }
}

/// Gracefully stop every running task, used on process shutdown.
pub async fn shutdown_all(supervisor: &Supervisor) {
    let ids: Vec<String> = supervisor.active.lock().await.keys().cloned().collect();
    for id in ids {
        if let Err(err) = supervisor.stop(&id).await {
            warn!(task_id = %id, error = %err, "error stopping task during shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let supervisor = Arc::new(Supervisor::new(dir.path()).unwrap());
        let task = supervisor
            .add("demo".into(), "/in".into(), "/out".into(), Default::default())
            .await
            .unwrap();

        let fetched = supervisor.get(&task.task_id).await.unwrap();
        assert_eq!(fetched.name, "demo");
        assert_eq!(fetched.status, TaskStatus::Stopped);
    }

    #[tokio::test]
    async fn update_is_rejected_while_running() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();

        let supervisor = Arc::new(
            Supervisor::new(dir.path().join("state")).unwrap(),
        );
        let task = supervisor
            .add(
                "demo".into(),
                input.to_string_lossy().to_string(),
                output.to_string_lossy().to_string(),
                Default::default(),
            )
            .await
            .unwrap();

        supervisor.start(&task.task_id).await.unwrap();

        let patch = TaskPatch {
            name: Some("renamed".into()),
            ..Default::default()
        };
        let result = supervisor.update(&task.task_id, patch).await;
        assert!(matches!(result, Err(SyncError::TaskRunning(_))));

        supervisor.stop(&task.task_id).await.unwrap();
    }

    #[tokio::test]
    async fn starting_twice_reports_already_running() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();

        let supervisor = Arc::new(Supervisor::new(dir.path().join("state")).unwrap());
        let task = supervisor
            .add(
                "demo".into(),
                input.to_string_lossy().to_string(),
                output.to_string_lossy().to_string(),
                Default::default(),
            )
            .await
            .unwrap();

        supervisor.start(&task.task_id).await.unwrap();
        let second = supervisor.start(&task.task_id).await.unwrap();
        assert!(!second.success);

        supervisor.stop(&task.task_id).await.unwrap();
    }

    #[tokio::test]
    async fn sync_now_reconciles_without_requiring_running_state() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::File::create(input.join("a.png")).unwrap().write_all(b"x").unwrap();

        let supervisor = Arc::new(Supervisor::new(dir.path().join("state")).unwrap());
        let mut extensions = std::collections::HashSet::new();
        extensions.insert("png".to_string());
        let task = supervisor
            .add(
                "demo".into(),
                input.to_string_lossy().to_string(),
                output.to_string_lossy().to_string(),
                extensions,
            )
            .await
            .unwrap();

        let outcome = supervisor.sync_now(&task.task_id).await.unwrap();
        assert!(outcome.success);
        assert_eq!(std::fs::read(output.join("a.png")).unwrap(), b"x");
    }
}
