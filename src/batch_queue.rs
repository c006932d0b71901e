// src/batch_queue.rs

//! Batch Queue (§4.4): coalesces file-level work items under size/interval
//! thresholds before handing them to the Sync Handler for concurrent
//! processing.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::types::SyncKind;

/// Tunables for the queue, defaulted per §4.4.
#[derive(Debug, Clone, Copy)]
pub struct BatchQueueConfig {
    pub batch_size: usize,
    pub interval: Duration,
}

impl Default for BatchQueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            interval: Duration::from_secs_f64(1.0),
        }
    }
}

/// A single FIFO element: a path plus the reason it was enqueued (§3
/// `PendingWork`).
#[derive(Debug, Clone)]
pub struct PendingWork {
    pub path: PathBuf,
    pub kind: SyncKind,
}

struct State {
    items: VecDeque<PendingWork>,
    last_drain: Instant,
}

/// FIFO queue with O(1) append/pop-front, owned exclusively by one Sync
/// Handler (§3 "ownership").
///
/// A single internal lock ([`Mutex`]) plays two roles at once: it protects
/// the deque, and because `drain_ready` holds it for the full pop-up-to-N
/// operation, it also gives "single drainer at a time" for free — a second
/// caller blocks until the first finishes popping, then sees a
/// (possibly-empty) queue rather than racing over the same items.
pub struct BatchQueue {
    config: BatchQueueConfig,
    state: Mutex<State>,
}

impl BatchQueue {
    pub fn new(config: BatchQueueConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                items: VecDeque::new(),
                last_drain: Instant::now(),
            }),
        }
    }

    /// Append a work item (§4.4 `enqueue`).
    pub async fn enqueue(&self, path: PathBuf, kind: SyncKind) {
        let mut state = self.state.lock().await;
        state.items.push_back(PendingWork { path, kind });
    }

    /// If the drain threshold is met (`len >= batch_size` or `len > 0 and
    /// elapsed >= interval`), pop up to `batch_size` items in FIFO order and
    /// return them; otherwise return an empty vector.
    ///
    /// Ordering across drains is preserved by the FIFO; the caller is free
    /// to process the returned batch's items concurrently since within a
    /// drain they may legitimately complete out of order (§4.4).
    pub async fn drain_ready(&self) -> Vec<PendingWork> {
        let mut state = self.state.lock().await;

        let len = state.items.len();
        let elapsed_ready = len > 0 && state.last_drain.elapsed() >= self.config.interval;
        if len < self.config.batch_size && !elapsed_ready {
            return Vec::new();
        }

        let take = len.min(self.config.batch_size);
        let batch: Vec<PendingWork> = state.items.drain(..take).collect();
        state.last_drain = Instant::now();
        batch
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
