// src/errors.rs

//! Crate-wide error type and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task is running and cannot be updated: {0}")]
    TaskRunning(String),

    #[error("hash cache error: {0}")]
    Cache(String),

    #[error("verification failed for {path}: {reason}")]
    Verification { path: String, reason: String },

    #[error("watch source error: {0}")]
    WatchSource(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error as AnyhowError;
pub type Result<T> = std::result::Result<T, SyncError>;
