// src/write_monitor.rs

//! Write-Completion Monitor (§4.3): waits until a file's `(size, mtime)`
//! have been stable for `stable_duration` before declaring it safe to copy.
//!
//! Cancellation follows the teacher's executor-loop pattern: at most one
//! monitor per path is active at a time, and installing a new one cancels
//! the prior one first (atomic cancel-then-install, §5 "Monitor replacement
//! for the same path is atomic").

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::debug;

/// Tunables for the monitor, defaulted per §4.3.
#[derive(Debug, Clone, Copy)]
pub struct WriteMonitorConfig {
    pub stable_duration: Duration,
    pub check_interval: Duration,
    pub max_wait: Duration,
}

impl Default for WriteMonitorConfig {
    fn default() -> Self {
        Self {
            stable_duration: Duration::from_secs_f64(1.0),
            check_interval: Duration::from_secs_f64(0.5),
            max_wait: Duration::from_secs(30),
        }
    }
}

/// Outcome of waiting for a file to stabilize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    Ready,
    Timeout,
    Vanished,
}

/// A completed (or cancelled) monitor run, delivered back to the owning
/// Sync Handler.
#[derive(Debug, Clone)]
pub struct MonitorResult {
    pub path: PathBuf,
    pub outcome: MonitorOutcome,
}

struct ActiveMonitor {
    cancel: oneshot::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

/// Owns the set of in-flight Write-Completion Monitors for a single Sync
/// Handler (§3 "each Sync Handler exclusively owns its WriteMonitor map").
pub struct WriteMonitorSet {
    config: WriteMonitorConfig,
    active: HashMap<PathBuf, ActiveMonitor>,
    results_tx: mpsc::Sender<MonitorResult>,
}

impl WriteMonitorSet {
    pub fn new(config: WriteMonitorConfig, results_tx: mpsc::Sender<MonitorResult>) -> Self {
        Self {
            config,
            active: HashMap::new(),
            results_tx,
        }
    }

    /// Start (or restart, cancelling any prior monitor) a monitor for
    /// `path` (§4.5.1 step 4).
    pub fn start_or_restart(&mut self, path: PathBuf) {
        self.cancel(&path);

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let config = self.config;
        let results_tx = self.results_tx.clone();
        let task_path = path.clone();

        let handle = tokio::spawn(async move {
            let outcome = run_monitor(&task_path, config, cancel_rx).await;
            if let Some(outcome) = outcome {
                let _ = results_tx.send(MonitorResult { path: task_path, outcome }).await;
            }
            // `None` means the monitor was cancelled by a newer event for
            // the same path; the newer monitor owns reporting the outcome.
        });

        self.active.insert(
            path,
            ActiveMonitor {
                cancel: cancel_tx,
                handle,
            },
        );
    }

    /// Cancel any in-flight monitor for `path` without starting a new one
    /// (§4.3 "a move-from or delete event MUST cancel any monitor for the
    /// source path").
    pub fn cancel(&mut self, path: &Path) {
        if let Some(existing) = self.active.remove(path) {
            debug!(?path, "cancelling in-flight write monitor");
            let _ = existing.cancel.send(());
            existing.handle.abort();
        }
    }

    /// Cancel every in-flight monitor (used when a task is stopped, §5).
    pub fn cancel_all(&mut self) {
        for (_, monitor) in self.active.drain() {
            let _ = monitor.cancel.send(());
            monitor.handle.abort();
        }
    }
}

async fn run_monitor(
    path: &Path,
    config: WriteMonitorConfig,
    mut cancel_rx: oneshot::Receiver<()>,
) -> Option<MonitorOutcome> {
    let started_at = Instant::now();
    let mut last_size_mtime: Option<(u64, std::time::SystemTime)> = None;
    let mut last_stable_at = started_at;

    loop {
        tokio::select! {
            _ = &mut cancel_rx => {
                debug!(?path, "write monitor cancelled");
                return None;
            }
            _ = tokio::time::sleep(config.check_interval) => {}
        }

        if started_at.elapsed() >= config.max_wait {
            return Some(MonitorOutcome::Timeout);
        }

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Some(MonitorOutcome::Vanished);
            }
            Err(_) => continue,
        };

        let current = (metadata.len(), metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH));

        match last_size_mtime {
            Some(prev) if prev == current => {
                if last_stable_at.elapsed() >= config.stable_duration {
                    return Some(MonitorOutcome::Ready);
                }
            }
            _ => {
                last_stable_at = Instant::now();
            }
        }

        last_size_mtime = Some(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[tokio::test]
    async fn ready_when_file_stops_changing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::File::create(&path).unwrap().write_all(b"data").unwrap();

        let config = WriteMonitorConfig {
            stable_duration: Duration::from_millis(50),
            check_interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(2),
        };
        let (tx, mut rx) = mpsc::channel(1);
        let mut set = WriteMonitorSet::new(config, tx);
        set.start_or_restart(path.clone());

        let result = rx.recv().await.unwrap();
        assert_eq!(result.path, path);
        assert_eq!(result.outcome, MonitorOutcome::Ready);
    }

    #[tokio::test]
    async fn vanished_when_file_is_removed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::File::create(&path).unwrap();

        let config = WriteMonitorConfig {
            stable_duration: Duration::from_secs(10),
            check_interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(2),
        };
        let (tx, mut rx) = mpsc::channel(1);
        let mut set = WriteMonitorSet::new(config, tx);
        set.start_or_restart(path.clone());

        std::fs::remove_file(&path).unwrap();

        let result = rx.recv().await.unwrap();
        assert_eq!(result.outcome, MonitorOutcome::Vanished);
    }

    #[tokio::test]
    async fn restarting_cancels_the_prior_monitor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::File::create(&path).unwrap();

        let config = WriteMonitorConfig {
            stable_duration: Duration::from_millis(100),
            check_interval: Duration::from_millis(10),
            max_wait: Duration::from_secs(5),
        };
        let (tx, mut rx) = mpsc::channel(4);
        let mut set = WriteMonitorSet::new(config, tx);

        set.start_or_restart(path.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        set.start_or_restart(path.clone());

        let result = rx.recv().await.unwrap();
        assert_eq!(result.outcome, MonitorOutcome::Ready);
        assert!(rx.try_recv().is_err(), "only one outcome should be reported");
    }
}
