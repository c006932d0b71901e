// src/handler/log_writer.rs

//! Per-task log files consumed by the admin surface's `logs` and
//! `log_dates` endpoints (§6 "Persisted state": `logs/file_sync_{task_id}_
//! {YYYYMMDD}.log`, UTF-8, `timestamp - LEVEL - [logger] - message`).
//!
//! This sits alongside `tracing` rather than replacing it: `tracing` is the
//! operator-facing stderr stream (§ "Logging"), while `TaskLogWriter`
//! persists the subset of outcomes the admin UI surfaces per task
//! ([complete]/[copy]/[link]/[delete]/[cleanup] and per-file errors).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;
use tracing::warn;

/// Appends formatted lines to `<root>/logs/file_sync_{task_id}_{date}.log`.
#[derive(Debug, Clone)]
pub struct TaskLogWriter {
    logs_dir: PathBuf,
}

impl TaskLogWriter {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            logs_dir: state_dir.into().join("logs"),
        }
    }

    /// Append one log line for `task_id`, dated to "now" in local time.
    ///
    /// A write failure is logged to the process-wide `tracing` stream and
    /// swallowed: admin log retrieval is a convenience surface, not a path
    /// that correctness of the mirror depends on (§7 cache-failure
    /// tolerance applies by the same reasoning here).
    pub fn log(&self, task_id: &str, level: &str, logger: &str, message: &str) {
        if let Err(err) = self.try_log(task_id, level, logger, message) {
            warn!(error = %err, task_id, "failed to append task log line");
        }
    }

    fn try_log(&self, task_id: &str, level: &str, logger: &str, message: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.logs_dir)?;
        let now = Local::now();
        let path = self.path_for(task_id, &now.format("%Y%m%d").to_string());

        let line = format!(
            "{} - {} - [{}] - {}\n",
            now.format("%Y-%m-%d %H:%M:%S%.3f"),
            level,
            logger,
            message
        );

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())
    }

    fn path_for(&self, task_id: &str, date: &str) -> PathBuf {
        self.logs_dir.join(format!("file_sync_{task_id}_{date}.log"))
    }

    /// All dates with a log file for `task_id`, newest first (§6
    /// `GET .../log_dates`).
    pub fn log_dates(&self, task_id: &str) -> Vec<String> {
        let prefix = format!("file_sync_{task_id}_");
        let mut dates: Vec<String> = match std::fs::read_dir(&self.logs_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .filter_map(|name| {
                    let stem = name.strip_prefix(&prefix)?.strip_suffix(".log")?;
                    Some(stem.to_string())
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates
    }

    /// The lines of `task_id`'s log for `date` (format `YYYYMMDD`), or an
    /// empty vector if no such file exists.
    pub fn read_logs(&self, task_id: &str, date: &str) -> Vec<String> {
        let path = self.path_for(task_id, date);
        match std::fs::read_to_string(&path) {
            Ok(contents) => contents.lines().map(|s| s.to_string()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let writer = TaskLogWriter::new(dir.path());
        writer.log("task-1", "INFO", "sync_handler", "[complete] foo.png");

        let dates = writer.log_dates("task-1");
        assert_eq!(dates.len(), 1);

        let lines = writer.read_logs("task-1", &dates[0]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("[complete] foo.png"));
    }

    #[test]
    fn unknown_task_has_no_dates_or_lines() {
        let dir = tempdir().unwrap();
        let writer = TaskLogWriter::new(dir.path());
        assert!(writer.log_dates("nope").is_empty());
        assert!(writer.read_logs("nope", "20260101").is_empty());
    }

    #[test]
    fn dates_are_sorted_newest_first() {
        let dir = tempdir().unwrap();
        let writer = TaskLogWriter::new(dir.path());
        for date in ["20260101", "20260301", "20260201"] {
            std::fs::create_dir_all(&writer.logs_dir).unwrap();
            std::fs::write(writer.path_for("t1", date), "x - INFO - [h] - x\n").unwrap();
        }
        assert_eq!(writer.log_dates("t1"), vec!["20260301", "20260201", "20260101"]);
    }
}
