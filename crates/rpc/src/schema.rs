// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message schemas and camelCase alias handling.
//!
//! Schemas describe the structured types behind actions and streams.
//! Nested message fields reference other schemas **by name** through
//! the bundle's type table, which keeps possibly-cyclic type graphs
//! representable and turns the alias walk into a visited-set over
//! names.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// camelCase form of a snake_case field name.
///
/// The first segment keeps its case; every following segment gets its
/// first letter upper-cased (`last_state` → `lastState`).
pub fn camelize(name: &str) -> String {
    let mut parts = name.split('_');
    let mut out = String::with_capacity(name.len());
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Field value kinds. `Message` references a schema by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Int64,
    Double,
    Bool,
    Message(String),
    /// Schemaless JSON payload.
    Json,
}

/// One field of a message type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub repeated: bool,
    /// JSON alias, assigned by normalization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// A structured message type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSchema {
    pub name: String,
    pub fields: Vec<Field>,
}

impl MessageSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            optional: false,
            repeated: false,
            alias: None,
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            optional: true,
            repeated: false,
            alias: None,
        });
        self
    }

    pub fn repeated(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            optional: false,
            repeated: true,
            alias: None,
        });
        self
    }

    /// Assign each field its camelCase alias. Fields that already
    /// carry an alias keep it, so a second pass changes nothing.
    pub fn apply_aliases(&mut self) {
        for field in &mut self.fields {
            if field.alias.is_none() {
                field.alias = Some(camelize(&field.name));
            }
        }
    }

    /// Message type names this schema references directly.
    pub fn referenced_types(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|f| match &f.kind {
            FieldKind::Message(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

/// Rewrite a JSON object's keys to the aliases of `type_name`,
/// recursing into nested message fields (including repeated ones).
///
/// Values already keyed by alias pass through unchanged, which makes
/// the rewrite idempotent. Unknown keys are preserved as-is.
pub fn alias_value(types: &IndexMap<String, MessageSchema>, type_name: &str, value: &mut Value) {
    let Some(schema) = types.get(type_name) else {
        return;
    };
    let Value::Object(map) = value else {
        return;
    };

    for field in &schema.fields {
        let target = field.alias.as_deref().unwrap_or(&field.name);
        let taken = map.remove(&field.name).or_else(|| map.remove(target));
        let Some(mut inner) = taken else { continue };
        if let FieldKind::Message(nested) = &field.kind {
            match &mut inner {
                Value::Array(items) => {
                    for item in items {
                        alias_value(types, nested, item);
                    }
                }
                other => alias_value(types, nested, other),
            }
        }
        map.insert(target.to_string(), inner);
    }
}

/// Rewrite a JSON object's keys from aliases back to the field names
/// of `type_name`, recursing into nested message fields. Inputs are
/// accepted under either spelling; handlers only ever see field
/// names.
pub fn dealias_value(types: &IndexMap<String, MessageSchema>, type_name: &str, value: &mut Value) {
    let Some(schema) = types.get(type_name) else {
        return;
    };
    let Value::Object(map) = value else {
        return;
    };

    for field in &schema.fields {
        let alias = field.alias.as_deref().unwrap_or(&field.name);
        let taken = map.remove(alias).or_else(|| map.remove(&field.name));
        let Some(mut inner) = taken else { continue };
        if let FieldKind::Message(nested) = &field.kind {
            match &mut inner {
                Value::Array(items) => {
                    for item in items {
                        dealias_value(types, nested, item);
                    }
                }
                other => dealias_value(types, nested, other),
            }
        }
        map.insert(field.name.clone(), inner);
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
