//! Single-flight task table with generation tagging.
//!
//! The table guarantees at most one live task per key. Beginning a task for
//! a key that already has one cancels the old task first. Completions come
//! back through [`TaskTable::try_finish`], which compares the ticket's
//! generation and token against the table before letting the caller write
//! any result: a cancelled or superseded task's completion is discarded
//! instead of overwriting newer state.

use crate::cancel::CancellationToken;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Handle for one live task. The ticket travels with the work; the table
/// keeps a matching entry until the task finishes, is superseded, cancelled
/// or reaped.
#[derive(Debug, Clone)]
pub struct TaskTicket<K> {
    key: K,
    generation: u64,
    token: CancellationToken,
}

impl<K: Clone> TaskTicket<K> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Generation the task was started under. Stale generations cannot
    /// complete.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

struct LiveTask {
    token: CancellationToken,
    started_at: Instant,
    generation: u64,
}

struct TableState<K> {
    live: HashMap<K, LiveTask>,
    generation: u64,
}

/// Per-key single-flight task registry.
///
/// Thread-safe; tickets may be carried to worker threads while the table
/// stays with the coordinator.
pub struct TaskTable<K>
where
    K: Eq + Hash + Clone,
{
    state: Mutex<TableState<K>>,
}

impl<K> TaskTable<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self { state: Mutex::new(TableState { live: HashMap::new(), generation: 0 }) }
    }

    /// Start a task for `key`, cancelling any task already live for it.
    ///
    /// The returned ticket is the only way to complete the task.
    pub fn begin(&self, key: K, now: Instant) -> TaskTicket<K> {
        let mut state = self.state.lock().unwrap();
        let generation = state.generation;

        if let Some(previous) = state.live.remove(&key) {
            previous.token.cancel();
        }

        let token = CancellationToken::new();
        state.live.insert(
            key.clone(),
            LiveTask { token: token.clone(), started_at: now, generation },
        );

        TaskTicket { key, generation, token }
    }

    /// Attempt to complete the task behind `ticket`.
    ///
    /// Returns `false` when the ticket's token was cancelled, its generation
    /// is stale, or its table entry was already replaced; the caller must
    /// then discard its result without touching shared state. Returns `true`
    /// and removes the live entry otherwise.
    pub fn try_finish(&self, ticket: &TaskTicket<K>) -> bool {
        let mut state = self.state.lock().unwrap();

        if ticket.token.is_cancelled() || ticket.generation != state.generation {
            return false;
        }

        match state.live.get(&ticket.key) {
            Some(live) if live.generation == ticket.generation && !live.token.is_cancelled() => {
                state.live.remove(&ticket.key);
                true
            }
            _ => false,
        }
    }

    /// Cancel and remove the live task for `key`, if any. The key becomes
    /// immediately eligible for a fresh `begin`.
    pub fn cancel(&self, key: &K) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.live.remove(key) {
            Some(task) => {
                task.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every live task. Returns the number cancelled.
    pub fn cancel_all(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let count = state.live.len();
        for task in state.live.values() {
            task.token.cancel();
        }
        state.live.clear();
        count
    }

    /// Cancel all live tasks and advance the generation, invalidating every
    /// outstanding ticket. Used when scale or rotation changes make all
    /// in-flight raster output worthless, and on document replacement.
    pub fn bump_generation(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        for task in state.live.values() {
            task.token.cancel();
        }
        state.live.clear();
        state.generation += 1;
        state.generation
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }

    /// Cancel and remove every task older than `timeout`, returning the
    /// affected keys so the caller can reset their state. Callers run this
    /// on a fixed period of half the timeout.
    pub fn sweep(&self, now: Instant, timeout: Duration) -> Vec<K> {
        let mut state = self.state.lock().unwrap();
        let expired: Vec<K> = state
            .live
            .iter()
            .filter(|(_, task)| now.duration_since(task.started_at) >= timeout)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            if let Some(task) = state.live.remove(key) {
                task.token.cancel();
            }
        }

        expired
    }

    /// Whether a task is currently live for `key`.
    pub fn is_live(&self, key: &K) -> bool {
        self.state.lock().unwrap().live.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().unwrap().live.is_empty()
    }
}

impl<K> Default for TaskTable<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
