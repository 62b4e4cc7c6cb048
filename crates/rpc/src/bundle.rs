// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC bundles: actions, streams and their message types.
//!
//! A bundle is what a plugin hands the registry: the state-machine
//! crate builds one per machine, and applications compose their own.
//! Handlers speak `serde_json::Value` at this layer; typed (de)serialization
//! happens inside the handler closures.

use crate::error::RpcError;
use crate::schema::MessageSchema;
use indexmap::IndexMap;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use vapp_broker::{StreamDescriptor, StreamPolicy};

/// Boxed future returned by an action handler.
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<Value, RpcError>> + Send>>;

/// A unary RPC implementation. Receives the parsed input message (or
/// `None` for input-less actions) and returns the output message.
pub type ActionHandler = Arc<dyn Fn(Option<Value>) -> ActionFuture + Send + Sync>;

/// Wrap an async closure as an [`ActionHandler`].
pub fn handler<F, Fut>(f: F) -> ActionHandler
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    Arc::new(move |input| Box::pin(f(input)))
}

/// One unary RPC.
#[derive(Clone)]
pub struct ActionEntry {
    pub name: String,
    pub handler: ActionHandler,
    /// Name of the input message type in the bundle's type table.
    pub input_type: Option<String>,
    /// Name of the output message type in the bundle's type table.
    pub output_type: Option<String>,
}

impl ActionEntry {
    pub fn new(name: impl Into<String>, handler: ActionHandler) -> Self {
        Self {
            name: name.into(),
            handler,
            input_type: None,
            output_type: None,
        }
    }

    pub fn with_input(mut self, type_name: impl Into<String>) -> Self {
        self.input_type = Some(type_name.into());
        self
    }

    pub fn with_output(mut self, type_name: impl Into<String>) -> Self {
        self.output_type = Some(type_name.into());
        self
    }
}

impl std::fmt::Debug for ActionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEntry")
            .field("name", &self.name)
            .field("input_type", &self.input_type)
            .field("output_type", &self.output_type)
            .finish_non_exhaustive()
    }
}

/// One server-streaming RPC, backed by a broker topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub name: String,
    /// Name of the payload message type in the bundle's type table.
    pub payload_type: Option<String>,
    pub replay: bool,
    pub queue_maxsize: usize,
    pub policy: StreamPolicy,
}

impl StreamEntry {
    /// Stream with the config defaults: replay on, queue of one,
    /// latest-wins.
    pub fn new(name: impl Into<String>) -> Self {
        let descriptor = StreamDescriptor::new(name);
        Self {
            name: descriptor.name,
            payload_type: None,
            replay: descriptor.replay,
            queue_maxsize: descriptor.queue_maxsize,
            policy: descriptor.policy,
        }
    }

    pub fn with_payload(mut self, type_name: impl Into<String>) -> Self {
        self.payload_type = Some(type_name.into());
        self
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

    /// The broker-side configuration for this stream.
    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor::new(self.name.clone())
            .replay(self.replay)
            .queue_maxsize(self.queue_maxsize)
            .policy(self.policy)
    }
}

/// A set of RPC declarations contributed by one plugin.
#[derive(Clone, Default)]
pub struct RpcBundle {
    pub actions: Vec<ActionEntry>,
    pub streams: Vec<StreamEntry>,
    /// Message types referenced by entries, keyed by type name.
    pub types: IndexMap<String, MessageSchema>,
}

impl RpcBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(mut self, entry: ActionEntry) -> Self {
        self.actions.push(entry);
        self
    }

    pub fn stream(mut self, entry: StreamEntry) -> Self {
        self.streams.push(entry);
        self
    }

    pub fn register_type(mut self, schema: MessageSchema) -> Self {
        self.types.entry(schema.name.clone()).or_insert(schema);
        self
    }

    /// Concatenate another bundle into this one. On type-name
    /// collisions the first registration wins.
    pub fn extend(&mut self, other: RpcBundle) {
        self.actions.extend(other.actions);
        self.streams.extend(other.streams);
        for (name, schema) in other.types {
            self.types.entry(name).or_insert(schema);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.streams.is_empty()
    }
}

impl std::fmt::Debug for RpcBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcBundle")
            .field("actions", &self.actions.len())
            .field("streams", &self.streams.len())
            .field("types", &self.types.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "bundle_tests.rs"]
mod tests;
