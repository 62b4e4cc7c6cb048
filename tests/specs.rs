//! Behavioral specifications for the machine-app runtime.
//!
//! These tests are black-box: they drive the public crate APIs — a
//! machine wired to a broker behind the Connect router — and verify
//! observable behavior end to end. Timing-sensitive scenarios run on
//! a paused tokio runtime so virtual time makes them deterministic.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/machine.rs"]
mod machine;

#[path = "specs/rpc.rs"]
mod rpc;

#[path = "specs/streams.rs"]
mod streams;
