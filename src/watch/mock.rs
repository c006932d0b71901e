// src/watch/mock.rs

//! Test double for [`WatchSource`] driven by a simple in-memory queue.

use std::collections::VecDeque;

use async_trait::async_trait;

use super::{FsEvent, WatchSource};

/// A `WatchSource` whose events are fed in by the test, rather than
/// observed from the filesystem.
#[derive(Default)]
pub struct MockWatchSource {
    events: VecDeque<FsEvent>,
    supports_closed: bool,
}

impl MockWatchSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_closed_event_support(mut self) -> Self {
        self.supports_closed = true;
        self
    }

    pub fn push(&mut self, event: FsEvent) {
        self.events.push_back(event);
    }
}

#[async_trait]
impl WatchSource for MockWatchSource {
    async fn next_event(&mut self) -> Option<FsEvent> {
        self.events.pop_front()
    }

    fn supports_closed_events(&self) -> bool {
        self.supports_closed
    }
}
