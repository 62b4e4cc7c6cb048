// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-stream topic state and the distributor task.
//!
//! A topic owns its subscriber table, the last published value and an
//! unbounded publish queue. One distributor task per topic drains the
//! publish queue and delivers to every subscriber according to the
//! topic's policy. The distributor starts lazily on the first publish
//! or subscribe, survives subscriber churn, and ends when the broker
//! shuts down (or every handle to the topic is gone).

use crate::payload::normalize_payload;
use crate::queue::{self, QueueReceiver, QueueSender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vapp_core::ShortId;

vapp_core::define_id! {
    /// Identifies one subscriber within its topic.
    pub struct SubscriberId;
}

impl SubscriberId {
    fn fresh() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

/// Delivery policy for a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamPolicy {
    /// Never block: a slow subscriber loses intermediate items and
    /// keeps only the newest.
    #[default]
    Latest,
    /// Preserve every item in order; the distributor waits for queue
    /// space, which back-pressures the whole topic.
    Fifo,
}

/// Configuration of one stream/topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
    /// Seed new subscribers with the last published value.
    #[serde(default = "default_replay")]
    pub replay: bool,
    /// Per-subscriber queue capacity.
    #[serde(default = "default_queue_maxsize")]
    pub queue_maxsize: usize,
    #[serde(default)]
    pub policy: StreamPolicy,
}

fn default_replay() -> bool {
    true
}

fn default_queue_maxsize() -> usize {
    1
}

impl StreamDescriptor {
    /// Descriptor with the defaults: replay on, queue of one, latest-wins.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replay: default_replay(),
            queue_maxsize: default_queue_maxsize(),
            policy: StreamPolicy::default(),
        }
    }

    pub fn replay(mut self, replay: bool) -> Self {
        self.replay = replay;
        self
    }

    pub fn queue_maxsize(mut self, maxsize: usize) -> Self {
        self.queue_maxsize = maxsize;
        self
    }

    pub fn policy(mut self, policy: StreamPolicy) -> Self {
        self.policy = policy;
        self
    }
}

struct SubscriberSlot {
    queue: QueueSender,
    joined_at: Instant,
    last_send_at: Option<Instant>,
}

struct TopicState {
    subscribers: HashMap<SubscriberId, SubscriberSlot>,
    last_value: Option<Value>,
    /// Taken by the distributor when it starts.
    publish_rx: Option<mpsc::UnboundedReceiver<Value>>,
    distributor: Option<JoinHandle<()>>,
}

pub(crate) struct Topic {
    descriptor: StreamDescriptor,
    publish_tx: mpsc::UnboundedSender<Value>,
    state: Mutex<TopicState>,
}

impl Topic {
    pub(crate) fn new(descriptor: StreamDescriptor) -> Arc<Self> {
        let (publish_tx, publish_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            descriptor,
            publish_tx,
            state: Mutex::new(TopicState {
                subscribers: HashMap::new(),
                last_value: None,
                publish_rx: Some(publish_rx),
                distributor: None,
            }),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub(crate) fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    /// Enqueue an item for distribution. Non-blocking; `last_value` is
    /// updated before the distributor (or any subscriber) sees the item.
    pub(crate) fn publish(self: &Arc<Self>, value: Value) {
        let value = normalize_payload(value);
        self.state.lock().last_value = Some(value.clone());
        self.ensure_distributor();
        // Send only fails when the distributor is gone (broker shut
        // down); the item is dropped then, like any other post-shutdown
        // publish.
        if self.publish_tx.send(value).is_err() {
            tracing::debug!(topic = %self.descriptor.name, "publish after shutdown dropped");
        }
    }

    /// Add a subscriber with a fresh queue, seeding it with the last
    /// value when replay is on.
    pub(crate) fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = SubscriberId::fresh();
        let (queue_tx, queue_rx) = queue::bounded(self.descriptor.queue_maxsize);

        {
            let mut state = self.state.lock();
            if self.descriptor.replay {
                if let Some(last) = state.last_value.clone() {
                    // A fresh queue cannot be full, but seeding shares
                    // the drop-oldest path for uniformity.
                    let _ = queue_tx.send_latest(last);
                }
            }
            state.subscribers.insert(
                id.clone(),
                SubscriberSlot {
                    queue: queue_tx,
                    joined_at: Instant::now(),
                    last_send_at: None,
                },
            );
        }
        self.ensure_distributor();

        tracing::debug!(topic = %self.descriptor.name, subscriber = id.short(8), "subscribed");
        Subscription {
            id,
            topic: Arc::clone(self),
            receiver: queue_rx,
        }
    }

    /// Remove a subscriber. Idempotent.
    pub(crate) fn unsubscribe(&self, id: &SubscriberId) {
        let removed = self.state.lock().subscribers.remove(id).is_some();
        if removed {
            tracing::debug!(topic = %self.descriptor.name, subscriber = id.short(8), "unsubscribed");
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    pub(crate) fn last_value(&self) -> Option<Value> {
        self.state.lock().last_value.clone()
    }

    /// Stop the distributor task. Pending publishes are dropped.
    pub(crate) fn abort_distributor(&self) {
        if let Some(handle) = self.state.lock().distributor.take() {
            handle.abort();
        }
    }

    /// Start the distributor on first use.
    fn ensure_distributor(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.distributor.is_some() {
            return;
        }
        let Some(rx) = state.publish_rx.take() else {
            // Already ran and was shut down; do not restart.
            return;
        };
        let topic = Arc::downgrade(self);
        state.distributor = Some(tokio::spawn(distribute(topic, rx)));
    }

    /// Deliver one item to every current subscriber, purging the ones
    /// whose queue has closed.
    async fn deliver(&self, item: Value) {
        let subscribers: Vec<(SubscriberId, QueueSender)> = {
            let state = self.state.lock();
            state
                .subscribers
                .iter()
                .map(|(id, slot)| (id.clone(), slot.queue.clone()))
                .collect()
        };

        let mut dead = Vec::new();
        for (id, queue) in subscribers {
            let result = match self.descriptor.policy {
                StreamPolicy::Latest => queue.send_latest(item.clone()),
                StreamPolicy::Fifo => queue.send_fifo(item.clone()).await,
            };
            match result {
                Ok(()) => {
                    let mut state = self.state.lock();
                    if let Some(slot) = state.subscribers.get_mut(&id) {
                        slot.last_send_at = Some(Instant::now());
                    }
                }
                Err(_) => dead.push(id),
            }
        }

        if !dead.is_empty() {
            let mut state = self.state.lock();
            for id in &dead {
                state.subscribers.remove(id);
            }
            tracing::debug!(
                topic = %self.descriptor.name,
                purged = dead.len(),
                "removed dead subscribers"
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_ages(&self) -> Vec<(Instant, Option<Instant>)> {
        let state = self.state.lock();
        state
            .subscribers
            .values()
            .map(|slot| (slot.joined_at, slot.last_send_at))
            .collect()
    }
}

async fn distribute(topic: Weak<Topic>, mut rx: mpsc::UnboundedReceiver<Value>) {
    while let Some(item) = rx.recv().await {
        let Some(topic) = topic.upgrade() else {
            break;
        };
        topic.deliver(item).await;
    }
}

/// One consumer of a topic. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    topic: Arc<Topic>,
    receiver: QueueReceiver,
}

impl Subscription {
    /// Wait for the next item; `None` once this subscriber has been
    /// removed from the topic and its queue is drained.
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }

    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Items currently buffered for this subscriber.
    pub fn queue_len(&self) -> usize {
        self.receiver.len()
    }

    /// Explicitly remove this subscriber. Equivalent to dropping.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.topic.unsubscribe(&self.id);
    }
}

#[cfg(test)]
#[path = "topic_tests.rs"]
mod tests;
