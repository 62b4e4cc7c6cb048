// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for timestamping.
//!
//! Production code uses [`SystemClock`]; tests use [`FakeClock`] and
//! advance it manually so history durations come out deterministic.
//! Sleeping is not part of the trait; delayed work goes through
//! `tokio::time`, which tests control with a paused runtime.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic and wall-clock time.
pub trait Clock: Send + Sync {
    /// Monotonic instant, for elapsed-time math.
    fn now(&self) -> Instant;

    /// Milliseconds since the Unix epoch, for timestamps that leave
    /// the process (history records, stream payloads).
    fn epoch_ms(&self) -> u64;
}

/// Real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Manually-advanced clock for tests.
///
/// Clones share the same underlying time, so a test can hand one copy
/// to the code under test and keep another to advance.
#[derive(Debug, Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeTime>>,
}

#[derive(Debug)]
struct FakeTime {
    start: Instant,
    offset: Duration,
    epoch_ms: u64,
}

/// Arbitrary fixed epoch base so fake timestamps look like real ones.
const FAKE_EPOCH_BASE_MS: u64 = 1_700_000_000_000;

impl FakeClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeTime {
                start: Instant::now(),
                offset: Duration::ZERO,
                epoch_ms: FAKE_EPOCH_BASE_MS,
            })),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        let mut time = self.inner.lock();
        time.offset += duration;
        time.epoch_ms += duration.as_millis() as u64;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        let time = self.inner.lock();
        time.start + time.offset
    }

    fn epoch_ms(&self) -> u64 {
        self.inner.lock().epoch_ms
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
