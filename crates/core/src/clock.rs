// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for deterministic time in tests

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic and wall-clock time.
pub trait Clock: Clone + Send + Sync + 'static {
    /// Monotonic instant, for measuring intervals.
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch, for persisted timestamps.
    fn epoch_ms(&self) -> u64;
}

/// Real system clock
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

#[derive(Debug)]
struct FakeTime {
    now: Instant,
    epoch_ms: u64,
}

/// Manually driven clock. Clones share the same time.
#[derive(Debug, Clone)]
pub struct FakeClock {
    time: Arc<Mutex<FakeTime>>,
}

/// Epoch the fake clock starts at (2026-01-01T00:00:00Z).
const FAKE_EPOCH_START_MS: u64 = 1_767_225_600_000;

impl FakeClock {
    pub fn new() -> Self {
        Self {
            time: Arc::new(Mutex::new(FakeTime {
                now: Instant::now(),
                epoch_ms: FAKE_EPOCH_START_MS,
            })),
        }
    }

    /// Move both the monotonic and wall clocks forward.
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock();
        time.now += by;
        time.epoch_ms += by.as_millis() as u64;
    }

    pub fn set_epoch_ms(&self, epoch_ms: u64) {
        self.time.lock().epoch_ms = epoch_ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.time.lock().now
    }

    fn epoch_ms(&self) -> u64 {
        self.time.lock().epoch_ms
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
