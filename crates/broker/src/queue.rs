// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded per-subscriber queue.
//!
//! Split into a sender half (held by the topic, used by the
//! distributor) and a receiver half (owned by exactly one stream
//! handler). Items live in a locked deque; the consumer is woken
//! through a capacity-1 channel so wakes coalesce, and FIFO senders
//! wait for space on a notify.
//!
//! Dropping the receiver closes the queue: senders get
//! [`QueueClosed`] from then on, which is how the distributor learns a
//! subscriber is gone.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};

/// The receiver half was dropped; the subscriber is gone.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("subscriber queue closed")]
pub struct QueueClosed;

struct Shared {
    state: Mutex<QueueState>,
    /// Signals FIFO senders that space opened up (or the queue closed).
    space: Notify,
    capacity: usize,
}

struct QueueState {
    items: VecDeque<Value>,
    closed: bool,
}

/// Create a queue holding at most `capacity` items. A capacity of
/// zero is bumped to one.
pub fn bounded(capacity: usize) -> (QueueSender, QueueReceiver) {
    let shared = Arc::new(Shared {
        state: Mutex::new(QueueState {
            items: VecDeque::new(),
            closed: false,
        }),
        space: Notify::new(),
        capacity: capacity.max(1),
    });
    let (wake_tx, wake_rx) = mpsc::channel(1);
    (
        QueueSender {
            shared: Arc::clone(&shared),
            wake_tx,
        },
        QueueReceiver { shared, wake_rx },
    )
}

/// Producer half, held by the topic.
#[derive(Clone)]
pub struct QueueSender {
    shared: Arc<Shared>,
    wake_tx: mpsc::Sender<()>,
}

impl QueueSender {
    /// Enqueue without blocking; a full queue drops its oldest item.
    pub fn send_latest(&self, item: Value) -> Result<(), QueueClosed> {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(QueueClosed);
            }
            if state.items.len() >= self.shared.capacity {
                state.items.pop_front();
            }
            state.items.push_back(item);
        }
        // Non-blocking wake - if the channel is full, the consumer is
        // already scheduled to wake
        let _ = self.wake_tx.try_send(());
        Ok(())
    }

    /// Enqueue, awaiting space when the queue is full.
    pub async fn send_fifo(&self, item: Value) -> Result<(), QueueClosed> {
        loop {
            {
                let mut state = self.shared.state.lock();
                if state.closed {
                    return Err(QueueClosed);
                }
                if state.items.len() < self.shared.capacity {
                    state.items.push_back(item);
                    drop(state);
                    let _ = self.wake_tx.try_send(());
                    return Ok(());
                }
            }
            self.shared.space.notified().await;
        }
    }

    /// Current queue depth.
    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}

/// Consumer half, owned by one stream handler.
pub struct QueueReceiver {
    shared: Arc<Shared>,
    wake_rx: mpsc::Receiver<()>,
}

impl QueueReceiver {
    /// Wait for the next item. Returns `None` once every sender is
    /// gone and the queue is drained.
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            if let Some(item) = self.pop() {
                return Some(item);
            }
            if self.wake_rx.recv().await.is_none() {
                // All senders dropped; one final drain check.
                return self.pop();
            }
        }
    }

    fn pop(&self) -> Option<Value> {
        let mut state = self.shared.state.lock();
        let item = state.items.pop_front();
        if item.is_some() {
            self.shared.space.notify_one();
        }
        item
    }

    /// Current queue depth.
    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for QueueReceiver {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.closed = true;
        state.items.clear();
        drop(state);
        // Unblock any FIFO sender so it observes the closure.
        self.shared.space.notify_waiters();
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
