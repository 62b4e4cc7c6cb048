// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vapp-fsm: hierarchical state machine runtime.
//!
//! A [`Machine`] is built once from declarative states, transitions
//! and hooks, then driven by triggers. It tracks every background task
//! it spawns, keeps at most one pending timeout per state, records a
//! bounded transition history, and can recover into the last leaf it
//! was in before a restart. The [`bundle`] module exposes a machine's
//! triggers as RPCs.

pub mod base;
pub mod builder;
pub mod bundle;
pub mod machine;
pub mod tracker;

pub use builder::{BuildError, MachineBuilder};
pub use machine::{
    HookError, Machine, TransitionReport, TriggerError, DEFAULT_HISTORY_SIZE,
};
pub use tracker::{TaskHandle, TaskTracker};
