//! Wrapping millisecond ticks used for reconnect deadlines.
//!
//! Deadlines are stored as 32-bit tick values which wrap roughly every
//! 49.7 days. Comparisons therefore never use `<`/`>` directly; a deadline
//! has elapsed when the wrapping distance from it to "now" is non-negative
//! when read as a signed value.

use std::{
    sync::atomic::{AtomicU32, Ordering},
    time::{Duration, Instant},
};

/// A monotonic millisecond tick that wraps at `u32::MAX`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Tick(pub u32);

impl Tick {
    /// Tick value `duration` after `self`, wrapping on overflow.
    pub fn after(self, duration: Duration) -> Self {
        Tick(self.0.wrapping_add(millis_u32(duration)))
    }

    /// Whether `self`, read as a deadline, has been reached at `now`.
    pub fn has_elapsed(self, now: Tick) -> bool {
        (now.0.wrapping_sub(self.0) as i32) >= 0
    }

    /// Milliseconds remaining until `self` at `now`; zero once elapsed.
    pub fn remaining(self, now: Tick) -> Duration {
        if self.has_elapsed(now) {
            Duration::ZERO
        } else {
            Duration::from_millis(u64::from(self.0.wrapping_sub(now.0)))
        }
    }
}

fn millis_u32(duration: Duration) -> u32 {
    // Half the tick range is the largest interval that still compares correctly.
    duration.as_millis().min(i32::MAX as u128) as u32
}

/// Source of the current tick.
pub trait Clock: Send + Sync {
    fn now(&self) -> Tick;
}

/// Clock backed by [`Instant`], truncated to a wrapping 32-bit tick.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Tick {
        Tick(self.origin.elapsed().as_millis() as u32)
    }
}

/// Clock whose value only changes when told to.
///
/// Used by tests to drive reconnect deadlines without sleeping.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU32,
}

impl ManualClock {
    pub fn starting_at(tick: Tick) -> Self {
        Self {
            now: AtomicU32::new(tick.0),
        }
    }

    pub fn set(&self, tick: Tick) {
        self.now.store(tick.0, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let next = self.now().after(by);
        self.set(next);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        Tick(self.now.load(Ordering::SeqCst))
    }
}
