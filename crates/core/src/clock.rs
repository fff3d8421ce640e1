// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time access for TTL, debounce, dedup-window, and watchdog decisions.
//!
//! The daemon reasons about time exclusively in epoch milliseconds:
//! `last_activity` stamps, dedup-window entries, and task `updated_at`
//! fields are all epoch-ms, so the trait exposes that single reading plus
//! elapsed-time helpers over it. Tests swap in the controllable
//! [`crate::test_support::FakeClock`].

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    fn epoch_ms(&self) -> u64;

    /// Milliseconds elapsed since an earlier `epoch_ms` reading. Saturates
    /// at zero when the reading is in the future (clock skew, state
    /// restored from another host).
    fn ms_since(&self, earlier_ms: u64) -> u64 {
        self.epoch_ms().saturating_sub(earlier_ms)
    }

    /// Whether more than `duration` has passed since an earlier reading.
    fn has_elapsed(&self, earlier_ms: u64, duration: Duration) -> bool {
        self.ms_since(earlier_ms) > duration.as_millis() as u64
    }
}

/// Real system clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
