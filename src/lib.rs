// src/lib.rs

//! `mirrorsync`: continuously-synchronized mirror of a source tree.
//!
//! - [`handler`] is the per-task Sync Handler (§4.5): event dispatch, the
//!   Write-Completion Monitor, the Batch Queue, and the copy/symlink
//!   procedures.
//! - [`reconciler`] is the Full-Tree Reconciler (§4.6) run at task startup
//!   and on demand via the admin API.
//! - [`supervisor`] owns every configured task's lifecycle and the durable
//!   task registry (§4.7).
//! - [`api`] is the thin HTTP/JSON admin surface (§6) fronting the
//!   supervisor.
//! - [`watch`] abstracts the platform file-event primitive (§4.1).
//! - [`cache`] is the persisted content-hash cache (§4.2).

pub mod api;
pub mod batch_queue;
pub mod cache;
pub mod cli;
pub mod config;
pub mod digest;
pub mod errors;
pub mod handler;
pub mod logging;
pub mod reconciler;
pub mod supervisor;
pub mod types;
pub mod watch;
pub mod write_monitor;
