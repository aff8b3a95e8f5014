//! Frame timestamps.
//!
//! The pipeline never asks the OS for the time.  Callers stamp each frame with
//! a [`Timestamp`] (an offset from an arbitrary origin) and every debounce or
//! PWM comparison is made against that value.

use std::ops::Add;
use std::time::{Duration, Instant};

// ════════════════════════════════════════════════════════════════════════════
// Timestamp
// ════════════════════════════════════════════════════════════════════════════

/// A point in time measured from an arbitrary, caller-chosen origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    pub fn from_duration(d: Duration) -> Self { Timestamp(d) }

    pub fn from_millis(ms: u64) -> Self { Timestamp(Duration::from_millis(ms)) }

    /// Negative or non-finite inputs map to [`Timestamp::ZERO`].
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Timestamp(Duration::from_secs_f64(secs))
        } else {
            Timestamp::ZERO
        }
    }

    pub fn as_duration(self) -> Duration { self.0 }

    pub fn as_secs_f64(self) -> f64 { self.0.as_secs_f64() }

    /// Time elapsed since `earlier`; zero if `earlier` is in the future.
    pub fn since(self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;
    fn add(self, rhs: Duration) -> Timestamp { Timestamp(self.0 + rhs) }
}

// ════════════════════════════════════════════════════════════════════════════
// MonotonicClock: wall-clock source for live hosts
// ════════════════════════════════════════════════════════════════════════════

/// Produces [`Timestamp`]s from `std::time::Instant`, relative to creation.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self { MonotonicClock { origin: Instant::now() } }

    pub fn now(&self) -> Timestamp { Timestamp(self.origin.elapsed()) }
}

impl Default for MonotonicClock {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_saturates() {
        let a = Timestamp::from_millis(100);
        let b = Timestamp::from_millis(250);
        assert_eq!(b.since(a), Duration::from_millis(150));
        assert_eq!(a.since(b), Duration::ZERO);
    }

    #[test]
    fn from_secs_rejects_garbage() {
        assert_eq!(Timestamp::from_secs_f64(-1.0), Timestamp::ZERO);
        assert_eq!(Timestamp::from_secs_f64(f64::NAN), Timestamp::ZERO);
        assert_eq!(Timestamp::from_secs_f64(0.5), Timestamp::from_millis(500));
    }

    #[test]
    fn monotonic_clock_advances() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
