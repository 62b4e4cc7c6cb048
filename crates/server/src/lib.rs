// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! vapp-server: the ConnectRPC-compatible HTTP surface.
//!
//! Turns a unified [`vapp_rpc::RpcBundle`] into axum routes: unary
//! POST endpoints answering JSON (errors as HTTP-200 envelopes) and
//! server-stream endpoints answering length-prefixed frame sequences
//! fed from broker subscriptions. The [`app`] module is the finalize
//! layer that wires config, registry, broker and router together.

pub mod app;
pub mod frame;
pub mod router;

pub use app::{App, AppConfig, AppError, FinalizedApp, ProtoEmitter};
pub use frame::{Frame, FrameError, FLAG_DATA, FLAG_TRAILER};
pub use router::{connect_router, CONTENT_TYPE};
