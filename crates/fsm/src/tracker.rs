// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background task tracking.
//!
//! Every task the machine spawns is tracked so `cancel_all` can tear
//! them down atomically when the machine faults. Entries remove
//! themselves when a task finishes. Each tracked task carries its id
//! in a task-local, so `cancel_all` called from *inside* a tracked
//! task (a timeout firing `to_fault`, say) skips that task instead of
//! aborting the caller out from under itself.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

tokio::task_local! {
    static CURRENT_TASK: u64;
}

/// Id of the tracked task the caller is running inside, if any.
pub(crate) fn current_task_id() -> Option<u64> {
    CURRENT_TASK.try_with(|id| *id).ok()
}

type TaskMap = Arc<Mutex<HashMap<u64, JoinHandle<()>>>>;

/// Handle to one tracked task.
pub struct TaskHandle {
    id: u64,
    abort: AbortHandle,
    done: watch::Receiver<bool>,
}

impl TaskHandle {
    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }

    /// Wait until the task has finished or been cancelled.
    /// Cancellation is not surfaced as an error.
    pub async fn done(&mut self) {
        while !*self.done.borrow() {
            if self.done.changed().await.is_err() {
                // Sender dropped: the task is gone, one way or another.
                return;
            }
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

/// Removes the task's map entry when its future is dropped, on normal
/// completion and on abort alike.
struct Untrack {
    id: u64,
    tasks: Weak<Mutex<HashMap<u64, JoinHandle<()>>>>,
}

impl Drop for Untrack {
    fn drop(&mut self) {
        if let Some(tasks) = self.tasks.upgrade() {
            tasks.lock().remove(&self.id);
        }
    }
}

/// Owns every outstanding background task.
#[derive(Clone, Default)]
pub struct TaskTracker {
    tasks: TaskMap,
    next_id: Arc<AtomicU64>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn and track a task.
    pub fn spawn<F>(&self, fut: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (done_tx, done_rx) = watch::channel(false);
        let untrack = Untrack {
            id,
            tasks: Arc::downgrade(&self.tasks),
        };

        let handle = tokio::spawn(CURRENT_TASK.scope(id, async move {
            let _untrack = untrack;
            fut.await;
            let _ = done_tx.send(true);
        }));
        let abort = handle.abort_handle();

        {
            let mut tasks = self.tasks.lock();
            if !handle.is_finished() {
                tasks.insert(id, handle);
                // The task may have finished between the check and the
                // insert, with its untrack guard firing before the
                // entry existed.
                if tasks.get(&id).map(JoinHandle::is_finished).unwrap_or(false) {
                    tasks.remove(&id);
                }
            }
        }

        TaskHandle {
            id,
            abort,
            done: done_rx,
        }
    }

    /// Number of outstanding tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every tracked task and wait for each to terminate.
    /// Idempotent. When called from inside a tracked task, that task
    /// is released from tracking but keeps running; aborting or
    /// joining it from itself could never complete.
    pub async fn cancel_all(&self) {
        let current = current_task_id();
        let drained: Vec<(u64, JoinHandle<()>)> = {
            let mut tasks = self.tasks.lock();
            tasks.drain().collect()
        };

        for (id, handle) in drained {
            if current == Some(id) {
                continue;
            }
            handle.abort();
            if let Err(err) = handle.await {
                if err.is_panic() {
                    tracing::warn!(task = id, "tracked task panicked before cancellation");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
