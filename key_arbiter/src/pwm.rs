//! Duty-cycle law for graded keys.
//!
//! ```text
//!   duty     = min_duty + (1 − min_duty) × clamp(force × strength, 0, 1)
//!   on_time  = max(cycle × duty,       min_on)
//!   off_time = max(cycle × (1 − duty), min_off)
//! ```
//!
//! `min_on` keeps a pulse from collapsing below a frame or two, which the game
//! on the other end would never see.

use std::time::Duration;

use hand_signal::Timestamp;
use serde::{Deserialize, Serialize};

pub const MIN_STRENGTH: f32 = 0.5;
pub const MAX_STRENGTH: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PwmSettings {
    /// Length of one on+off period.
    pub cycle:           Duration,
    /// Duty at zero force.
    pub min_duty:        f32,
    pub min_on:          Duration,
    pub min_off:         Duration,
    /// At or above this force the key is simply held.
    pub full_hold_force: f32,
}

impl Default for PwmSettings {
    fn default() -> Self {
        PwmSettings {
            cycle:           Duration::from_millis(100),
            min_duty:        0.10,
            min_on:          Duration::from_millis(30),
            min_off:         Duration::ZERO,
            full_hold_force: 0.95,
        }
    }
}

impl PwmSettings {
    pub fn duty(&self, force: f32, strength: f32) -> f32 {
        let drive = (sanitize(force) * strength).clamp(0.0, 1.0);
        self.min_duty + (1.0 - self.min_duty) * drive
    }

    /// `(on_time, off_time)` for the given force.
    pub fn phase_durations(&self, force: f32, strength: f32) -> (Duration, Duration) {
        let duty = self.duty(force, strength) as f64;
        let on  = self.cycle.mul_f64(duty).max(self.min_on);
        let off = self.cycle.mul_f64((1.0 - duty).max(0.0)).max(self.min_off);
        (on, off)
    }

    pub fn is_full_hold(&self, force: f32) -> bool {
        sanitize(force) >= self.full_hold_force
    }
}

/// Clamp to `[0, 1]`, mapping NaN to zero.
pub(crate) fn sanitize(force: f32) -> f32 {
    if force.is_nan() { 0.0 } else { force.clamp(0.0, 1.0) }
}

pub(crate) fn clamp_strength(strength: f32) -> f32 {
    if strength.is_finite() { strength.clamp(MIN_STRENGTH, MAX_STRENGTH) } else { 1.0 }
}

// ════════════════════════════════════════════════════════════════════════════
// PwmChannel: phase timer for one graded key
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PwmChannel {
    pub target_force: f32,
    pub phase_on:     bool,
    /// `None` until the first toggle: a fresh channel is due immediately.
    pub last_toggle:  Option<Timestamp>,
}

impl PwmChannel {
    pub fn new(force: f32, phase_on: bool, last_toggle: Option<Timestamp>) -> Self {
        PwmChannel { target_force: sanitize(force), phase_on, last_toggle }
    }

    /// Whether the current phase has run its course at `now`.
    pub fn is_due(&self, now: Timestamp, on: Duration, off: Duration) -> bool {
        let phase = if self.phase_on { on } else { off };
        self.last_toggle.map_or(true, |t| now.since(t) >= phase)
    }
}
