//! Idle-time work queue.
//!
//! Deferred work (thumbnail backfill) runs one item per idle opportunity so
//! large documents never block interaction. Hosts with a real idle signal
//! pass `host_idle = true` when the event loop is quiet; hosts without one
//! fall back to a fixed delay between items.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// FIFO of deferred work popped one item at a time.
#[derive(Debug)]
pub struct IdleRunner<T> {
    queue: VecDeque<T>,
    fallback_delay: Duration,
    last_pop: Option<Instant>,
}

impl<T> IdleRunner<T> {
    pub fn new(fallback_delay: Duration) -> Self {
        Self { queue: VecDeque::new(), fallback_delay, last_pop: None }
    }

    pub fn push(&mut self, item: T) {
        self.queue.push_back(item);
    }

    /// Pop the next item if the host is idle, or if the fallback delay has
    /// elapsed since the last pop. Returns at most one item per call.
    pub fn pop_ready(&mut self, now: Instant, host_idle: bool) -> Option<T> {
        if self.queue.is_empty() {
            return None;
        }

        let due = host_idle
            || self
                .last_pop
                .map_or(true, |last| now.duration_since(last) >= self.fallback_delay);

        if due {
            self.last_pop = Some(now);
            self.queue.pop_front()
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.last_pop = None;
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
