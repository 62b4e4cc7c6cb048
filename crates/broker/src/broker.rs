// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker facade: owns every topic, hands out publisher handles and
//! subscriptions.
//!
//! Publishers close over their topic instead of looking the broker up
//! through process globals, so a stream's publish path is explicit in
//! whoever constructed it.

use crate::topic::{StreamDescriptor, Subscription, Topic};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Broker errors.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("unknown stream: {0}")]
    UnknownStream(String),
    #[error("stream already registered: {0}")]
    DuplicateStream(String),
    #[error("failed to serialize stream item: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Topic registry and entry point for publish/subscribe.
#[derive(Clone, Default)]
pub struct Broker {
    topics: Arc<Mutex<HashMap<String, Arc<Topic>>>>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stream. Re-registering the same name with an
    /// identical descriptor is a no-op; registering it with different
    /// settings is a configuration error.
    pub fn register(&self, descriptor: StreamDescriptor) -> Result<(), BrokerError> {
        let mut topics = self.topics.lock();
        if let Some(existing) = topics.get(&descriptor.name) {
            if *existing.descriptor() == descriptor {
                return Ok(());
            }
            return Err(BrokerError::DuplicateStream(descriptor.name));
        }
        let name = descriptor.name.clone();
        topics.insert(name, Topic::new(descriptor));
        Ok(())
    }

    /// Handle for publishing into a stream.
    pub fn publisher(&self, name: &str) -> Result<Publisher, BrokerError> {
        let topic = self.topic(name)?;
        Ok(Publisher { topic })
    }

    /// Add a subscriber to a stream.
    pub fn subscribe(&self, name: &str) -> Result<Subscription, BrokerError> {
        Ok(self.topic(name)?.subscribe())
    }

    /// One-off publish without keeping a handle around.
    pub fn publish(&self, name: &str, item: impl Serialize) -> Result<(), BrokerError> {
        self.publisher(name)?.publish(item)
    }

    /// Registered stream names.
    pub fn stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop every distributor task. Queued items are dropped;
    /// subscribers see end-of-stream once their queues drain.
    pub fn shutdown(&self) {
        let topics = self.topics.lock();
        for topic in topics.values() {
            topic.abort_distributor();
        }
        tracing::info!(topics = topics.len(), "broker shut down");
    }

    fn topic(&self, name: &str) -> Result<Arc<Topic>, BrokerError> {
        self.topics
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::UnknownStream(name.to_string()))
    }
}

/// Clone-able publishing handle bound to one topic.
#[derive(Clone)]
pub struct Publisher {
    topic: Arc<Topic>,
}

impl Publisher {
    /// Serialize and publish an item. Non-blocking.
    pub fn publish(&self, item: impl Serialize) -> Result<(), BrokerError> {
        let value = serde_json::to_value(item)?;
        self.topic.publish(value);
        Ok(())
    }

    /// Publish a pre-built JSON value. Non-blocking, infallible.
    pub fn publish_value(&self, value: Value) {
        self.topic.publish(value);
    }

    pub fn stream_name(&self) -> &str {
        self.topic.name()
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
