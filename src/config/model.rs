// src/config/model.rs

//! Task configuration data model (§3 `TaskConfig`).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::TaskStatus;

/// Immutable-while-running description of a single sync task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    pub task_id: String,
    pub name: String,
    pub input_dir: String,
    pub output_dir: String,
    pub extensions: HashSet<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub stop_time: Option<String>,
}

impl TaskConfig {
    /// Build a freshly created, stopped task with a new id.
    pub fn new(
        task_id: String,
        name: String,
        input_dir: String,
        output_dir: String,
        extensions: HashSet<String>,
    ) -> Self {
        Self {
            task_id,
            name,
            input_dir,
            output_dir,
            extensions,
            status: TaskStatus::Stopped,
            start_time: None,
            stop_time: None,
        }
    }

    /// Case-insensitive suffix test against the configured extension set
    /// (§4.5.6): a plain `ends_with`, exactly as spec.md §3 defines
    /// membership and as `original_source/sync_files.py`'s
    /// `check_extension` implements it (no `.` boundary requirement, so a
    /// configured extension of `"png"` also matches a filename literally
    /// ending in `...png` with no separating dot).
    pub fn is_in_copy_set(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.extensions.iter().any(|ext| lower.ends_with(ext.to_lowercase().as_str()))
    }
}

/// Subset of fields accepted by `POST /api/tasks` and `PUT /api/tasks/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub input_dir: Option<String>,
    pub output_dir: Option<String>,
    pub extensions: Option<HashSet<String>>,
}

impl TaskConfig {
    pub fn apply_patch(&mut self, patch: TaskPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(input_dir) = patch.input_dir {
            self.input_dir = input_dir;
        }
        if let Some(output_dir) = patch.output_dir {
            self.output_dir = output_dir;
        }
        if let Some(extensions) = patch.extensions {
            self.extensions = extensions;
        }
    }
}
