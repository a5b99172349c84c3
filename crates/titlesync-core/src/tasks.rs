//! Named deferred operations (settle delays, follow-up rechecks).
//!
//! The engine never fires bare timers. Deferred work is recorded here as a
//! named, cancellable task with a due time; the host pumps the queue (or a
//! test advances a [`crate::clock::ManualClock`] and drains it directly).
//! Scheduling the same kind for the same path replaces the earlier task, so a
//! path never accumulates more than one pending recheck.

use std::sync::Mutex;
use std::sync::PoisonError;

/// What a deferred task should do when it comes due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Let the host's cache settle before a dependent read
    SettleDelay,
    /// Re-run the pipeline once for a document that changed mid-operation
    AliasRecheck,
}

/// A scheduled deferred operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub kind: TaskKind,
    pub path: String,
    pub due_ms: u64,
}

/// Queue of pending deferred operations
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Mutex<Vec<Task>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue::default()
    }

    /// Schedule a task, replacing any existing task of the same kind for the
    /// same path (at most one follow-up per path).
    pub fn schedule(&self, kind: TaskKind, path: &str, due_ms: u64) {
        let mut tasks = self.lock();
        tasks.retain(|t| !(t.kind == kind && t.path == path));
        tasks.push(Task {
            kind,
            path: path.to_string(),
            due_ms,
        });
    }

    /// Cancel all tasks of a kind for a path
    pub fn cancel(&self, kind: TaskKind, path: &str) {
        self.lock().retain(|t| !(t.kind == kind && t.path == path));
    }

    /// Rekey tasks after a rename so pending work follows the document
    pub fn rekey(&self, old_path: &str, new_path: &str) {
        for task in self.lock().iter_mut() {
            if task.path == old_path {
                task.path = new_path.to_string();
            }
        }
    }

    /// Remove and return every task due at or before `now_ms`
    pub fn take_due(&self, now_ms: u64) -> Vec<Task> {
        let mut tasks = self.lock();
        let (due, pending): (Vec<Task>, Vec<Task>) =
            tasks.drain(..).partition(|t| t.due_ms <= now_ms);
        *tasks = pending;
        due
    }

    /// Earliest due time among pending tasks, if any
    pub fn next_due(&self) -> Option<u64> {
        self.lock().iter().map(|t| t.due_ms).min()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
