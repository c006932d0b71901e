// src/handler/dispatch.rs

//! Pure event-dispatch decision logic (§4.5.1).
//!
//! Mirrors the teacher's core/event_handlers split: this module contains no
//! IO and no Tokio types. It consumes one [`FsEvent`] plus the owning
//! handler's symlink-processed bookkeeping and produces a list of
//! [`HandlerCommand`]s for the async shell ([`super::SyncHandler`]) to
//! execute. This keeps the event-classification rules unit-testable without
//! a filesystem or a runtime.

use std::path::PathBuf;

use crate::config::TaskConfig;
use crate::types::SyncKind;
use crate::watch::FsEvent;

/// Command produced by [`dispatch`], to be carried out by the IO shell.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerCommand {
    /// Start (or restart) a Write-Completion Monitor for this path.
    StartWriteMonitor(PathBuf),
    /// Cancel any in-flight Write-Completion Monitor for this path.
    CancelWriteMonitor(PathBuf),
    /// Append to the Batch Queue.
    Enqueue(PathBuf, SyncKind),
    /// Create/repair the symlink for this path immediately (not batched).
    EnsureSymlinkNow(PathBuf),
    /// Remove the mirror counterpart of this source path.
    DeleteMirror(PathBuf),
}

/// Per-handler state the pure dispatcher needs across calls: the
/// symlink-processed set (§3), used to deduplicate the create/modify event
/// pair notify commonly fires for the same non-copied file.
#[derive(Debug, Default)]
pub struct DispatchState {
    symlink_processed: std::collections::HashSet<PathBuf>,
}

impl DispatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_symlink_processed(&self, path: &PathBuf) -> bool {
        self.symlink_processed.contains(path)
    }

    pub fn mark_symlink_processed(&mut self, path: PathBuf) {
        self.symlink_processed.insert(path);
    }

    pub fn forget_symlink(&mut self, path: &PathBuf) {
        self.symlink_processed.remove(path);
    }
}

/// Dispatch one normalized filesystem event into zero or more commands
/// (§4.5.1). `supports_closed` reflects whether the owning watch source
/// natively reports [`crate::types::EventKind::Closed`].
pub fn dispatch(
    state: &mut DispatchState,
    task: &TaskConfig,
    event: &FsEvent,
    supports_closed: bool,
) -> Vec<HandlerCommand> {
    use crate::types::EventKind::*;

    if event.is_directory {
        return Vec::new();
    }

    match event.kind {
        Deleted => on_deleted(state, &event.src_path),
        Moved => {
            let dest = match &event.dest_path {
                Some(d) => d.clone(),
                None => return on_deleted(state, &event.src_path),
            };
            let mut commands = on_deleted(state, &event.src_path);
            commands.extend(on_newly_observed(state, task, &dest));
            commands
        }
        Created => {
            let mut commands = Vec::new();
            let name = file_name(&event.src_path);
            if task.is_in_copy_set(&name) {
                commands.push(HandlerCommand::StartWriteMonitor(event.src_path.clone()));
            } else {
                commands.push(HandlerCommand::EnsureSymlinkNow(event.src_path.clone()));
                state.mark_symlink_processed(event.src_path.clone());
            }
            commands
        }
        Modified => {
            let name = file_name(&event.src_path);
            if task.is_in_copy_set(&name) {
                vec![HandlerCommand::StartWriteMonitor(event.src_path.clone())]
            } else {
                Vec::new()
            }
        }
        Closed => {
            if !supports_closed {
                return Vec::new();
            }
            vec![HandlerCommand::Enqueue(
                event.src_path.clone(),
                SyncKind::WriteComplete,
            )]
        }
    }
}

fn on_deleted(state: &mut DispatchState, src_path: &PathBuf) -> Vec<HandlerCommand> {
    state.forget_symlink(src_path);
    vec![
        HandlerCommand::CancelWriteMonitor(src_path.clone()),
        HandlerCommand::DeleteMirror(src_path.clone()),
    ]
}

fn on_newly_observed(state: &mut DispatchState, task: &TaskConfig, path: &PathBuf) -> Vec<HandlerCommand> {
    let name = file_name(path);
    if task.is_in_copy_set(&name) {
        vec![HandlerCommand::Enqueue(path.clone(), SyncKind::Moved)]
    } else {
        state.mark_symlink_processed(path.clone());
        vec![HandlerCommand::EnsureSymlinkNow(path.clone())]
    }
}

fn file_name(path: &PathBuf) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn task() -> TaskConfig {
        TaskConfig::new(
            "t1".into(),
            "name".into(),
            "/src".into(),
            "/out".into(),
            HashSet::from(["png".to_string()]),
        )
    }

    fn event(src: &str, kind: crate::types::EventKind) -> FsEvent {
        FsEvent {
            src_path: PathBuf::from(src),
            dest_path: None,
            kind,
            is_directory: false,
        }
    }

    #[test]
    fn created_copy_set_file_starts_write_monitor() {
        let mut state = DispatchState::new();
        let cmds = dispatch(&mut state, &task(), &event("/src/a.png", crate::types::EventKind::Created), false);
        assert_eq!(cmds, vec![HandlerCommand::StartWriteMonitor(PathBuf::from("/src/a.png"))]);
    }

    #[test]
    fn created_non_copy_set_file_links_immediately() {
        let mut state = DispatchState::new();
        let cmds = dispatch(&mut state, &task(), &event("/src/a.mkv", crate::types::EventKind::Created), false);
        assert_eq!(cmds, vec![HandlerCommand::EnsureSymlinkNow(PathBuf::from("/src/a.mkv"))]);
        assert!(state.is_symlink_processed(&PathBuf::from("/src/a.mkv")));
    }

    #[test]
    fn deleted_cancels_monitor_and_removes_mirror() {
        let mut state = DispatchState::new();
        let cmds = dispatch(&mut state, &task(), &event("/src/a.png", crate::types::EventKind::Deleted), false);
        assert_eq!(
            cmds,
            vec![
                HandlerCommand::CancelWriteMonitor(PathBuf::from("/src/a.png")),
                HandlerCommand::DeleteMirror(PathBuf::from("/src/a.png")),
            ]
        );
    }

    #[test]
    fn closed_without_native_support_is_ignored() {
        let mut state = DispatchState::new();
        let cmds = dispatch(&mut state, &task(), &event("/src/a.png", crate::types::EventKind::Closed), false);
        assert!(cmds.is_empty());
    }

    #[test]
    fn closed_with_native_support_enqueues_directly() {
        let mut state = DispatchState::new();
        let cmds = dispatch(&mut state, &task(), &event("/src/a.png", crate::types::EventKind::Closed), true);
        assert_eq!(cmds, vec![HandlerCommand::Enqueue(PathBuf::from("/src/a.png"), SyncKind::WriteComplete)]);
    }

    #[test]
    fn moved_deletes_source_and_observes_destination() {
        let mut state = DispatchState::new();
        let mut ev = event("/src/old.png", crate::types::EventKind::Moved);
        ev.dest_path = Some(PathBuf::from("/src/new.png"));
        let cmds = dispatch(&mut state, &task(), &ev, false);
        assert!(cmds.contains(&HandlerCommand::DeleteMirror(PathBuf::from("/src/old.png"))));
        assert!(cmds.contains(&HandlerCommand::Enqueue(PathBuf::from("/src/new.png"), SyncKind::Moved)));
    }

    #[test]
    fn directory_events_are_dropped() {
        let mut state = DispatchState::new();
        let mut ev = event("/src/dir", crate::types::EventKind::Created);
        ev.is_directory = true;
        assert!(dispatch(&mut state, &task(), &ev, false).is_empty());
    }
}
