// src/watch/notify_source.rs

//! Production [`WatchSource`] backed by the `notify` crate.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notify::{
    event::{ModifyKind, RemoveKind, RenameMode},
    Config, Event, EventKind as NotifyEventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use tokio::sync::mpsc;
use tracing::warn;

use crate::errors::Result;
use crate::types::EventKind;

use super::{FsEvent, WatchSource};

/// Watches a directory tree recursively using the OS-native primitive
/// `notify` selects, and surfaces a normalized [`FsEvent`] stream.
///
/// `notify`'s portable backend does not expose a distinct "writer closed
/// file descriptor" signal, so [`WatchSource::supports_closed_events`]
/// returns `false` here and the Sync Handler always falls back to the
/// Write-Completion Monitor for stability detection (§4.1).
pub struct NotifyWatchSource {
    // Kept alive for as long as the source is in use; dropping it stops
    // watching.
    _watcher: RecommendedWatcher,
    event_rx: mpsc::UnboundedReceiver<Event>,
    pending_rename_from: Option<PathBuf>,
}

impl NotifyWatchSource {
    /// Begin watching `root` recursively.
    pub fn spawn(root: &Path) -> Result<Self> {
        let (tx, event_rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        // Receiver dropped; watcher is being torn down.
                    }
                }
                Err(err) => {
                    eprintln!("mirrorsync: watch error: {err}");
                }
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;

        Ok(Self {
            _watcher: watcher,
            event_rx,
            pending_rename_from: None,
        })
    }
}

#[async_trait]
impl WatchSource for NotifyWatchSource {
    async fn next_event(&mut self) -> Option<FsEvent> {
        loop {
            let event = self.event_rx.recv().await?;
            if let Some(fs_event) = self.translate(event) {
                return Some(fs_event);
            }
            // Directory-only or otherwise uninteresting event; keep polling.
        }
    }

    fn supports_closed_events(&self) -> bool {
        false
    }
}

impl NotifyWatchSource {
    fn translate(&mut self, event: Event) -> Option<FsEvent> {
        let is_directory = event.paths.iter().any(|p| p.is_dir());

        match event.kind {
            NotifyEventKind::Create(_) => {
                let path = event.paths.into_iter().next()?;
                Some(FsEvent {
                    src_path: path,
                    dest_path: None,
                    kind: EventKind::Created,
                    is_directory,
                })
            }
            NotifyEventKind::Modify(ModifyKind::Data(_)) | NotifyEventKind::Modify(ModifyKind::Any) => {
                let path = event.paths.into_iter().next()?;
                Some(FsEvent {
                    src_path: path,
                    dest_path: None,
                    kind: EventKind::Modified,
                    is_directory,
                })
            }
            NotifyEventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                self.pending_rename_from = event.paths.into_iter().next();
                None
            }
            NotifyEventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                let dest = event.paths.into_iter().next()?;
                let src = self.pending_rename_from.take().unwrap_or_else(|| dest.clone());
                Some(FsEvent {
                    src_path: src,
                    dest_path: Some(dest),
                    kind: EventKind::Moved,
                    is_directory,
                })
            }
            NotifyEventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = event.paths.into_iter();
                let src = paths.next()?;
                let dest = paths.next();
                Some(FsEvent {
                    src_path: src,
                    dest_path: dest,
                    kind: EventKind::Moved,
                    is_directory,
                })
            }
            NotifyEventKind::Remove(RemoveKind::Any)
            | NotifyEventKind::Remove(RemoveKind::File)
            | NotifyEventKind::Remove(RemoveKind::Folder) => {
                let path = event.paths.into_iter().next()?;
                Some(FsEvent {
                    src_path: path,
                    dest_path: None,
                    kind: EventKind::Deleted,
                    is_directory,
                })
            }
            other => {
                warn!(?other, "ignoring unhandled notify event kind");
                None
            }
        }
    }
}
