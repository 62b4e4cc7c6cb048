// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

#[parameterized(
    plain = { "state", "state" },
    two_parts = { "last_state", "lastState" },
    three_parts = { "previous_state_name", "previousStateName" },
    trailing = { "duration_ms", "durationMs" },
    already_camel = { "bufferSize", "bufferSize" },
)]
fn camelize_cases(input: &str, expected: &str) {
    assert_eq!(camelize(input), expected);
}

#[test]
fn apply_aliases_fills_only_missing_aliases() {
    let mut schema = MessageSchema::new("StateResponse")
        .field("state", FieldKind::String)
        .optional("last_state", FieldKind::String);
    schema.fields[0].alias = Some("currentState".into());

    schema.apply_aliases();

    assert_eq!(schema.fields[0].alias.as_deref(), Some("currentState"));
    assert_eq!(schema.fields[1].alias.as_deref(), Some("lastState"));

    // Idempotent: a second pass changes nothing.
    let before = schema.clone();
    schema.apply_aliases();
    assert_eq!(schema, before);
}

fn aliased_types() -> IndexMap<String, MessageSchema> {
    let mut history_entry = MessageSchema::new("HistoryEntry")
        .field("timestamp", FieldKind::Int64)
        .field("state", FieldKind::String)
        .optional("duration_ms", FieldKind::Int64);
    let mut history = MessageSchema::new("HistoryResponse")
        .repeated("history", FieldKind::Message("HistoryEntry".into()))
        .field("buffer_size", FieldKind::Int64);
    history_entry.apply_aliases();
    history.apply_aliases();

    let mut types = IndexMap::new();
    types.insert(history_entry.name.clone(), history_entry);
    types.insert(history.name.clone(), history);
    types
}

#[test]
fn alias_value_rewrites_nested_and_repeated_fields() {
    let types = aliased_types();
    let mut value = json!({
        "history": [
            {"timestamp": 1, "state": "picking", "duration_ms": 250},
            {"timestamp": 2, "state": "placing"},
        ],
        "buffer_size": 1000,
    });

    alias_value(&types, "HistoryResponse", &mut value);

    assert_eq!(
        value,
        json!({
            "history": [
                {"timestamp": 1, "state": "picking", "durationMs": 250},
                {"timestamp": 2, "state": "placing"},
            ],
            "bufferSize": 1000,
        })
    );
}

#[test]
fn alias_value_is_idempotent() {
    let types = aliased_types();
    let mut value = json!({"buffer_size": 2, "history": []});
    alias_value(&types, "HistoryResponse", &mut value);
    let once = value.clone();
    alias_value(&types, "HistoryResponse", &mut value);
    assert_eq!(value, once);
}

#[test]
fn alias_value_ignores_unknown_types_and_non_objects() {
    let types = aliased_types();
    let mut scalar = json!(42);
    alias_value(&types, "HistoryResponse", &mut scalar);
    assert_eq!(scalar, json!(42));

    let mut value = json!({"buffer_size": 2});
    alias_value(&types, "NoSuchType", &mut value);
    assert_eq!(value, json!({"buffer_size": 2}));
}

#[test]
fn dealias_value_accepts_either_spelling() {
    let types = aliased_types();

    let mut camel = json!({"bufferSize": 5, "history": []});
    dealias_value(&types, "HistoryResponse", &mut camel);
    assert_eq!(camel, json!({"buffer_size": 5, "history": []}));

    let mut snake = json!({"buffer_size": 5, "history": []});
    dealias_value(&types, "HistoryResponse", &mut snake);
    assert_eq!(snake, json!({"buffer_size": 5, "history": []}));
}

#[test]
fn dealias_and_alias_are_inverses_on_nested_values() {
    let types = aliased_types();
    let original = json!({
        "history": [{"timestamp": 1, "state": "a", "duration_ms": 2}],
        "buffer_size": 10,
    });

    let mut value = original.clone();
    alias_value(&types, "HistoryResponse", &mut value);
    assert_eq!(value["history"][0]["durationMs"], 2);
    dealias_value(&types, "HistoryResponse", &mut value);
    assert_eq!(value, original);
}

#[test]
fn referenced_types_lists_message_fields_only() {
    let schema = MessageSchema::new("A")
        .field("x", FieldKind::String)
        .field("b", FieldKind::Message("B".into()))
        .repeated("c", FieldKind::Message("C".into()));
    let refs: Vec<&str> = schema.referenced_types().collect();
    assert_eq!(refs, vec!["B", "C"]);
}
