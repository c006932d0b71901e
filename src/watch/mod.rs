// src/watch/mod.rs

//! Watch Source Adapter (§4.1): abstraction over the platform file-event
//! primitive, so the Sync Handler never depends on `notify` directly.

pub mod mock;
pub mod notify_source;
pub mod path_utils;

pub use mock::MockWatchSource;
pub use notify_source::NotifyWatchSource;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::types::EventKind;

/// A single file-system event surfaced by a watch source.
#[derive(Debug, Clone)]
pub struct FsEvent {
    pub src_path: PathBuf,
    /// Present only for `Moved` events: the destination path.
    pub dest_path: Option<PathBuf>,
    pub kind: EventKind,
    pub is_directory: bool,
}

/// Capability set hiding the platform file-event primitive (§4.1).
///
/// Implementations are started by the Supervisor and stopped by dropping
/// them. When a source natively reports [`EventKind::Closed`], the Sync
/// Handler skips the Write-Completion Monitor for that event; otherwise it
/// falls back to polling-based stability detection.
#[async_trait]
pub trait WatchSource: Send {
    /// Wait for and return the next event, or `None` once the source is
    /// exhausted (watcher stopped, channel closed).
    async fn next_event(&mut self) -> Option<FsEvent>;

    /// Whether this source natively emits [`EventKind::Closed`] events.
    fn supports_closed_events(&self) -> bool {
        false
    }
}
