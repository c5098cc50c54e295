//! Monotonic lap timers.
//!
//! The engine owns its timer slots as [`LapTimer`] values; the host only
//! stamps and reads them against a [`Clock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A source of monotonic milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall-clock monotonic time since the clock was created.
#[derive(Debug)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::AcqRel);
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::Acquire)
    }
}

/// An origin tick captured by `reset_lap_timer`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LapTimer {
    origin: u64,
}

impl LapTimer {
    pub fn reset(&mut self, clock: &dyn Clock) {
        self.origin = clock.now_millis();
    }

    /// Milliseconds since the last reset. Never negative.
    pub fn elapsed_millis(&self, clock: &dyn Clock) -> i64 {
        clock.now_millis().saturating_sub(self.origin) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lap_timer_with_manual_clock() {
        let clock = ManualClock::new(1_000);
        let mut lap = LapTimer::default();
        lap.reset(&clock);
        assert_eq!(lap.elapsed_millis(&clock), 0);
        clock.advance(250);
        assert_eq!(lap.elapsed_millis(&clock), 250);
        lap.reset(&clock);
        clock.advance(5);
        assert_eq!(lap.elapsed_millis(&clock), 5);
    }

    #[test]
    fn test_independent_slots() {
        let clock = ManualClock::new(0);
        let mut a = LapTimer::default();
        let mut b = LapTimer::default();
        a.reset(&clock);
        clock.advance(100);
        b.reset(&clock);
        clock.advance(10);
        assert_eq!(a.elapsed_millis(&clock), 110);
        assert_eq!(b.elapsed_millis(&clock), 10);
    }

    #[test]
    fn test_clock_going_backwards_saturates() {
        let clock = ManualClock::new(500);
        let mut lap = LapTimer::default();
        lap.reset(&clock);
        clock.set(100);
        assert_eq!(lap.elapsed_millis(&clock), 0);
    }

    #[test]
    fn test_monotonic_clock_does_not_decrease() {
        let clock = MonotonicClock::new();
        let a = clock.now_millis();
        let b = clock.now_millis();
        assert!(b >= a);
    }
}
