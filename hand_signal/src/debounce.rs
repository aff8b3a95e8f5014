//! Per-signal debounce / hysteresis.
//!
//! A key's externally visible value (`confirmed`) only flips after the raw
//! input has disagreed with it *continuously* for `delay`.  Any frame in
//! which the raw input returns to the confirmed value cancels the pending
//! flip, and the next disagreement starts the clock from zero.
//!
//! ```text
//!            raw == confirmed                 raw != confirmed
//!   ┌──────┐ ─────────────────▶ stay   ┌──────┐ ───────────────▶ ┌─────────────┐
//!   │ Idle │                           │ Idle │                  │ Pending     │
//!   └──────┘ ◀─── raw == confirmed ─── └──────┘                  │ {cand,since}│
//!       ▲                                                        └─────────────┘
//!       └──────────── now − since ≥ delay: confirmed = cand ───────────┘
//! ```
//!
//! The strict re-arm favours stability over responsiveness to rapid
//! oscillation; it is the knob to revisit if gestures feel sluggish.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tracing::debug;

use crate::clock::Timestamp;

pub const MIN_DELAY: f64 = 0.05;
pub const MAX_DELAY: f64 = 0.5;
pub const DEFAULT_DELAY: f64 = 0.18;

/// Transition in flight for one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pending {
    Idle,
    Pending { candidate: bool, since: Timestamp },
}

#[derive(Clone, Copy, Debug)]
struct KeyState {
    confirmed: bool,
    pending:   Pending,
}

impl Default for KeyState {
    fn default() -> Self {
        KeyState { confirmed: false, pending: Pending::Idle }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// StabilityFilter
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct StabilityFilter<K> {
    delay: Duration,
    keys:  HashMap<K, KeyState>,
}

impl<K: Eq + Hash + Copy + std::fmt::Debug> StabilityFilter<K> {
    /// `delay_secs` is clamped to `[MIN_DELAY, MAX_DELAY]`.
    pub fn new(delay_secs: f64) -> Self {
        StabilityFilter { delay: clamp_delay(delay_secs), keys: HashMap::new() }
    }

    pub fn set_delay(&mut self, delay_secs: f64) {
        self.delay = clamp_delay(delay_secs);
    }

    pub fn delay(&self) -> Duration { self.delay }

    /// Feed this frame's raw decision for `key`; returns the confirmed value.
    pub fn update(&mut self, key: K, raw: bool, now: Timestamp) -> bool {
        let delay = self.delay;
        let state = self.keys.entry(key).or_default();

        if raw == state.confirmed {
            state.pending = Pending::Idle;
            return state.confirmed;
        }

        match state.pending {
            Pending::Pending { candidate, since } if candidate == raw => {
                if now.since(since) >= delay {
                    state.confirmed = raw;
                    state.pending = Pending::Idle;
                    debug!(?key, value = raw, "debounce commit");
                }
            }
            _ => {
                state.pending = Pending::Pending { candidate: raw, since: now };
            }
        }
        state.confirmed
    }

    /// Last committed value; unknown keys read as `false`.
    pub fn confirmed(&self, key: K) -> bool {
        self.keys.get(&key).map(|s| s.confirmed).unwrap_or(false)
    }

    pub fn pending(&self, key: K) -> Pending {
        self.keys.get(&key).map(|s| s.pending).unwrap_or(Pending::Idle)
    }

    pub fn is_pending(&self, key: K) -> bool {
        self.pending(key) != Pending::Idle
    }

    /// Forget every confirmed value and pending transition.
    pub fn reset(&mut self) { self.keys.clear(); }
}

impl<K: Eq + Hash + Copy + std::fmt::Debug> Default for StabilityFilter<K> {
    fn default() -> Self { Self::new(DEFAULT_DELAY) }
}

fn clamp_delay(secs: f64) -> Duration {
    let secs = if secs.is_finite() { secs } else { DEFAULT_DELAY };
    Duration::from_secs_f64(secs.clamp(MIN_DELAY, MAX_DELAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Timestamp { Timestamp::from_millis(n) }

    #[test]
    fn unknown_key_starts_false() {
        let f: StabilityFilter<&str> = StabilityFilter::new(0.1);
        assert!(!f.confirmed("x"));
        assert!(!f.is_pending("x"));
    }

    #[test]
    fn holds_prior_value_until_delay() {
        let mut f = StabilityFilter::new(0.1);
        // 0 ms starts the pending transition; every call before 100 ms elapsed
        // returns the old value.
        for t in (0..100).step_by(10) {
            assert!(!f.update("k", true, ms(t)), "flipped early at {} ms", t);
        }
        assert!(f.update("k", true, ms(100)));
        for t in (110..300).step_by(10) {
            assert!(f.update("k", true, ms(t)));
        }
    }

    #[test]
    fn flicker_never_commits() {
        let mut f = StabilityFilter::new(0.1);
        let mut t = 0;
        for i in 0..50 {
            let raw = i % 3 != 2;   // true, true, false, …
            assert!(!f.update("k", raw, ms(t)));
            t += 40;
        }
        assert!(!f.confirmed("k"));
    }

    #[test]
    fn flip_back_restarts_clock() {
        let mut f = StabilityFilter::new(0.1);
        f.update("k", true, ms(0));
        f.update("k", true, ms(90));
        f.update("k", false, ms(95));   // back to confirmed → pending cleared
        assert!(!f.is_pending("k"));
        f.update("k", true, ms(100));   // new pending from 100
        assert!(!f.update("k", true, ms(150)));
        assert!(f.update("k", true, ms(200)));
    }

    #[test]
    fn falling_edge_debounced_too() {
        let mut f = StabilityFilter::new(0.05);
        f.update("k", true, ms(0));
        assert!(f.update("k", true, ms(50)));
        assert!(f.update("k", false, ms(60)));
        assert!(f.update("k", false, ms(100)));
        assert!(!f.update("k", false, ms(110)));
    }

    #[test]
    fn keys_are_independent() {
        let mut f = StabilityFilter::new(0.05);
        f.update("a", true, ms(0));
        f.update("b", true, ms(30));
        assert!(f.update("a", true, ms(50)));
        assert!(!f.update("b", true, ms(50)));
    }

    #[test]
    fn delay_clamped() {
        let mut f: StabilityFilter<u8> = StabilityFilter::new(5.0);
        assert_eq!(f.delay(), Duration::from_millis(500));
        f.set_delay(0.0);
        assert_eq!(f.delay(), Duration::from_millis(50));
        f.set_delay(f64::NAN);
        assert!((f.delay().as_secs_f64() - DEFAULT_DELAY).abs() < 1e-6);
    }

    #[test]
    fn reset_clears_confirmed_and_pending() {
        let mut f = StabilityFilter::new(0.05);
        f.update(1u8, true, ms(0));
        f.update(1u8, true, ms(60));
        f.update(2u8, true, ms(60));
        f.reset();
        assert!(!f.confirmed(1));
        assert!(!f.is_pending(2));
    }
}
