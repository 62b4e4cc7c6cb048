// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Central registry: merges bundles and normalizes message types.
//!
//! Normalization assigns camelCase aliases to every message type
//! reachable from an action input/output or a stream payload. It runs
//! once per registry; re-running it is a no-op by construction.

use crate::bundle::RpcBundle;
use std::collections::HashSet;

/// Fallback service name when the application name has no usable
/// characters.
pub const DEFAULT_SERVICE_NAME: &str = "VentionApp";

/// PascalCase service name derived from an application name.
///
/// Alphanumeric runs become words; each word's first letter is
/// upper-cased and the rest preserved (`"my pick&place app"` →
/// `"MyPickPlaceApp"`).
pub fn sanitize_service_name(name: &str) -> String {
    let mut out = String::new();
    for word in name.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() {
        DEFAULT_SERVICE_NAME.to_string()
    } else {
        out
    }
}

/// Collects RPC bundles and exposes the unified, normalized view.
#[derive(Debug, Default)]
pub struct RpcRegistry {
    bundles: Vec<RpcBundle>,
    unified: Option<RpcBundle>,
}

impl RpcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bundle for inclusion in the unified view. Bundles
    /// added after [`RpcRegistry::unified`] has run are ignored by the
    /// cached result; callers register everything before finalizing.
    pub fn add_bundle(&mut self, bundle: RpcBundle) {
        self.bundles.push(bundle);
    }

    /// The merged bundle with aliases applied. Normalization runs on
    /// the first call; later calls return the cached result.
    pub fn unified(&mut self) -> RpcBundle {
        if self.unified.is_none() {
            let mut merged = RpcBundle::new();
            for bundle in &self.bundles {
                merged.extend(bundle.clone());
            }
            normalize_aliases(&mut merged);
            self.unified = Some(merged);
        }
        self.unified
            .clone()
            .unwrap_or_default()
    }
}

/// Walk every message type reachable from the bundle's entries and
/// assign camelCase aliases, following message references through the
/// type table with a visited set (type graphs may be cyclic).
fn normalize_aliases(bundle: &mut RpcBundle) {
    let mut pending: Vec<String> = Vec::new();
    for action in &bundle.actions {
        pending.extend(action.input_type.iter().cloned());
        pending.extend(action.output_type.iter().cloned());
    }
    for stream in &bundle.streams {
        pending.extend(stream.payload_type.iter().cloned());
    }

    let mut visited: HashSet<String> = HashSet::new();
    while let Some(name) = pending.pop() {
        if !visited.insert(name.clone()) {
            continue;
        }
        if let Some(schema) = bundle.types.get_mut(&name) {
            schema.apply_aliases();
            pending.extend(schema.referenced_types().map(str::to_string));
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
