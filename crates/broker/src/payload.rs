// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Payload normalization for stream items.
//!
//! Subscribers always receive a JSON object or array: structured
//! values pass through untouched, scalars get wrapped so a bare number
//! or string still frames as a well-formed message.

use serde_json::{json, Value};

/// Normalize a published item into its wire shape.
///
/// Objects and arrays are emitted as-is; anything else (string,
/// number, bool, null) is wrapped as `{"value": <item>}`.
pub fn normalize_payload(value: Value) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) => value,
        other => json!({ "value": other }),
    }
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
