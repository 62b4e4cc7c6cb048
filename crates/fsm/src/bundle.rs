// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Expose a machine over RPC.
//!
//! One `Trigger_<PascalCaseTrigger>` action per trigger, plus
//! `GetState` and `GetHistory`, plus the `state_change` stream. The
//! stream is fed by a transition observer wired in at build time;
//! the publisher handle comes from the broker, not from any global.

use crate::builder::MachineBuilder;
use crate::machine::Machine;
use serde_json::{json, Value};
use vapp_broker::Publisher;
use vapp_rpc::bundle::{handler, ActionEntry, RpcBundle, StreamEntry};
use vapp_rpc::schema::{FieldKind, MessageSchema};
use vapp_rpc::RpcError;

/// Name of the machine's state-change stream.
pub const STATE_CHANGE_STREAM: &str = "state_change";

/// PascalCase form of a trigger name: `finished_picking` →
/// `FinishedPicking`, `recover__homing` → `RecoverHoming`.
fn pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for part in name.split('_').filter(|p| !p.is_empty()) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Build the RPC bundle for a machine.
pub fn machine_bundle(machine: &Machine) -> RpcBundle {
    let mut bundle = RpcBundle::new()
        .register_type(
            MessageSchema::new("TriggerResponse")
                .field("result", FieldKind::String)
                .field("previous_state", FieldKind::String)
                .field("new_state", FieldKind::String),
        )
        .register_type(
            MessageSchema::new("StateResponse")
                .field("state", FieldKind::String)
                .optional("last_state", FieldKind::String),
        )
        .register_type(
            MessageSchema::new("HistoryEntry")
                .field("timestamp", FieldKind::Int64)
                .field("state", FieldKind::String)
                .optional("duration_ms", FieldKind::Int64),
        )
        .register_type(
            MessageSchema::new("HistoryRequest").optional("last", FieldKind::Int64),
        )
        .register_type(
            MessageSchema::new("HistoryResponse")
                .repeated("history", FieldKind::Message("HistoryEntry".into()))
                .field("buffer_size", FieldKind::Int64),
        )
        .register_type(MessageSchema::new("DiagramResponse").field("dot", FieldKind::String))
        .register_type(
            MessageSchema::new("StateChange")
                .field("old", FieldKind::String)
                .field("new", FieldKind::String)
                .field("trigger", FieldKind::String)
                .field("timestamp", FieldKind::Int64),
        );

    for trigger in machine.graph().triggers() {
        let action_name = format!("Trigger_{}", pascal_case(trigger.as_str()));
        let m = machine.clone();
        let t = trigger.clone();
        bundle = bundle.action(
            ActionEntry::new(
                action_name,
                handler(move |_| {
                    let m = m.clone();
                    let t = t.clone();
                    async move { fire_trigger(&m, t.as_str()).await }
                }),
            )
            .with_output("TriggerResponse"),
        );
    }

    let state_machine = machine.clone();
    bundle = bundle.action(
        ActionEntry::new(
            "GetState",
            handler(move |_| {
                let m = state_machine.clone();
                async move {
                    Ok(json!({
                        "state": m.state(),
                        "last_state": m.last_recoverable_state(),
                    }))
                }
            }),
        )
        .with_output("StateResponse"),
    );

    let history_machine = machine.clone();
    bundle = bundle.action(
        ActionEntry::new(
            "GetHistory",
            handler(move |input| {
                let m = history_machine.clone();
                async move {
                    let last = input
                        .as_ref()
                        .and_then(|v| v.get("last"))
                        .and_then(Value::as_u64);
                    let records = match last {
                        Some(n) => m.last_n(n as usize),
                        None => m.history(),
                    };
                    let entries: Vec<Value> = records
                        .iter()
                        .map(|entry| {
                            let mut obj = json!({
                                "timestamp": entry.timestamp_ms,
                                "state": entry.state,
                            });
                            if let Some(duration) = entry.duration_ms {
                                obj["duration_ms"] = json!(duration);
                            }
                            obj
                        })
                        .collect();
                    Ok(json!({
                        "history": entries,
                        "buffer_size": m.history_capacity(),
                    }))
                }
            }),
        )
        .with_input("HistoryRequest")
        .with_output("HistoryResponse"),
    );

    let diagram_machine = machine.clone();
    bundle = bundle.action(
        ActionEntry::new(
            "GetStateDiagram",
            handler(move |_| {
                let m = diagram_machine.clone();
                async move { Ok(json!({ "dot": m.graph().to_dot() })) }
            }),
        )
        .with_output("DiagramResponse"),
    );

    bundle.stream(StreamEntry::new(STATE_CHANGE_STREAM).with_payload("StateChange"))
}

/// Attach the observer that publishes every transition onto the
/// `state_change` stream.
pub fn wire_state_stream(builder: MachineBuilder, publisher: Publisher) -> MachineBuilder {
    builder.observe(move |_, report| {
        publisher.publish_value(json!({
            "old": report.from,
            "new": report.to,
            "trigger": report.trigger,
            "timestamp": report.timestamp_ms,
        }));
    })
}

async fn fire_trigger(machine: &Machine, trigger: &str) -> Result<Value, RpcError> {
    let current = machine.state();
    let available = machine.available_triggers();
    if !available.iter().any(|t| t == trigger) {
        return Err(RpcError::failed_precondition(format!(
            "trigger '{}' not allowed from '{}' (available: {})",
            trigger,
            current,
            available
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    match machine.trigger(trigger).await {
        Ok(report) => Ok(json!({
            "result": trigger,
            "previous_state": report.from,
            "new_state": report.to,
        })),
        Err(err) if err.is_precondition() => Err(RpcError::failed_precondition(err.to_string())),
        Err(err) => Err(RpcError::internal(err.to_string())),
    }
}

#[cfg(test)]
#[path = "bundle_tests.rs"]
mod tests;
