// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded transition history.
//!
//! Each record gets its `duration_ms` backfilled when the next record
//! is appended: the duration measures how long the state was current
//! before it was left.

use crate::id::StateName;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// One transition record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Milliseconds since the Unix epoch at which the state was entered.
    pub timestamp_ms: u64,
    pub state: StateName,
    /// How long the state stayed current; unset on the newest entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Ring buffer of [`HistoryEntry`] with a fixed capacity.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl History {
    /// Create an empty history holding at most `capacity` entries.
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Append a record for entering `state` at `now_ms`, backfilling
    /// the previous record's duration and evicting the oldest entry
    /// once the buffer is full.
    pub fn record(&mut self, state: StateName, now_ms: u64) {
        if let Some(last) = self.entries.back_mut() {
            last.duration_ms = Some(now_ms.saturating_sub(last.timestamp_ms));
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry {
            timestamp_ms: now_ms,
            state,
            duration_ms: None,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// All entries, oldest first.
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// The newest `n` entries, oldest of those first.
    pub fn last_n(&self, n: usize) -> Vec<HistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
