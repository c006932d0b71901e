// src/types.rs

use serde::{Deserialize, Serialize};

/// Lifecycle status of a configured sync task (§3 `TaskConfig.status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Stopped,
    Running,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Stopped
    }
}

/// Kind of file-system event observed by the Watch Source Adapter (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Modified,
    /// Writer closed the file descriptor. Only emitted on platforms where the
    /// underlying primitive natively supports it.
    Closed,
    Deleted,
    Moved,
}

/// Reason a path was handed to `sync_one` (§3 `PendingWork.event_kind`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// From the Full-Tree Reconciler's initial walk.
    Initial,
    /// From a stabilized write (Write-Completion Monitor or native `closed`).
    WriteComplete,
    /// From the destination side of a `moved` event.
    Moved,
}

/// Outcome of a single `sync_one` invocation, used for logging and for the
/// idempotence law in the reconciler (a counter of real writes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// File copied and verified.
    Copied,
    /// Symlink created or repaired.
    Linked,
    /// Already up to date; nothing written.
    Skipped,
}

/// Result of an admin action (`start`/`stop`/`sync`) that can fail
/// "softly" without being an error (§6, §7 "task-start race").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}
