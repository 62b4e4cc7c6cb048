// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Distinguished states and triggers every machine gets.
//!
//! `ready` is where a machine starts; `fault` is the error sink.
//! `start` leaves `ready` for the designated initial state, `to_fault`
//! is allowed from anywhere and cancels all background work first, and
//! `reset` returns from `fault` to `ready`. One `recover__<leaf>`
//! trigger per declared leaf carries the recovery path.

/// Initial state of every machine.
pub const READY: &str = "ready";

/// Error sink state.
pub const FAULT: &str = "fault";

/// Trigger from `ready` into the designated initial state.
pub const START: &str = "start";

/// Trigger from `fault` back to `ready`.
pub const RESET: &str = "reset";

/// Trigger from any state into `fault`; cancels tracked tasks before
/// the state changes.
pub const TO_FAULT: &str = "to_fault";
