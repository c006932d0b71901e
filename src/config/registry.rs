// src/config/registry.rs

//! Durable task registry: a JSON array of [`TaskConfig`] persisted to disk
//! (§4.7, §6 "Persisted state").

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::model::TaskConfig;
use crate::errors::Result;

/// On-disk task registry file name, relative to the state directory.
pub const REGISTRY_FILE_NAME: &str = "tasks.json";

/// Load and persist the list of configured tasks as a JSON array.
///
/// This only handles the data on disk; it does not know about running
/// handlers. [`crate::supervisor::Supervisor`] is the component that maps
/// loaded configs onto live tasks.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    path: PathBuf,
}

impl TaskRegistry {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: state_dir.into().join(REGISTRY_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the registry from disk. A missing file is treated as an empty
    /// registry, matching the source's "first run" behavior.
    pub fn load(&self) -> Result<Vec<TaskConfig>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no task registry on disk yet");
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        let tasks: Vec<TaskConfig> = serde_json::from_str(&contents)?;
        Ok(tasks)
    }

    /// Persist the given tasks, overwriting the registry file.
    pub fn save(&self, tasks: &[TaskConfig]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(tasks)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Log-and-swallow wrapper used where registry persistence failures must not
/// abort an otherwise successful admin operation (mirrors §7's tolerance for
/// cache-layer failures; a failed save just means state must be re-derived
/// from the in-memory supervisor on next mutation).
pub fn save_best_effort(registry: &TaskRegistry, tasks: &[TaskConfig]) {
    if let Err(err) = registry.save(tasks) {
        warn!(error = %err, "failed to persist task registry");
    }
}
