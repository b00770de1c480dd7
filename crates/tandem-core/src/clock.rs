//! Timestamp sources.
//!
//! Timestamps order resting orders at equal price and stamp every event.
//! Any monotonic source works; wall-clock time is never read.

use std::sync::atomic::{AtomicU64, Ordering};

/// Supplies event and book timestamps in nanoseconds.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> u64;
}

/// TSC-backed clock, nanoseconds since construction.
pub struct MonotonicClock {
    clock: quanta::Clock,
    origin: u64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        let clock = quanta::Clock::new();
        let origin = clock.raw();
        Self { clock, origin }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline(always)]
    fn now(&self) -> u64 {
        self.clock.delta_as_nanos(self.origin, self.clock.raw())
    }
}

/// Counter clock for deterministic tests: each reading advances by one.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value without advancing.
    pub fn peek(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }
}
