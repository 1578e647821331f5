// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling
//!
//! Lock expiries and idempotency timestamps are compared by different
//! processes, so the clock reports wall time as Unix milliseconds rather
//! than a process-local `Instant`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A clock that provides the current wall time
pub trait Clock: Clone + Send + Sync + 'static {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;
}

/// Real system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone, Debug)]
pub struct FakeClock {
    current: Arc<Mutex<u64>>,
}

impl FakeClock {
    /// Starting point for fresh fake clocks (2023-11-14T22:13:20Z)
    pub const EPOCH_MS: u64 = 1_700_000_000_000;

    pub fn new() -> Self {
        Self::at(Self::EPOCH_MS)
    }

    /// Create a fake clock reading the given Unix milliseconds
    pub fn at(now_ms: u64) -> Self {
        Self {
            current: Arc::new(Mutex::new(now_ms)),
        }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = current.saturating_add(duration_ms(duration));
    }

    /// Set the clock to a specific time
    pub fn set(&self, now_ms: u64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = now_ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Whole milliseconds in a duration, saturating at `u64::MAX`
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
