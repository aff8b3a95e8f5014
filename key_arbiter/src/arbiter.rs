//! Budgeted owner of every held key.
//!
//! # Invariants
//!
//! * A key is in `held` only if the sink accepted its press while the budget
//!   had room.
//! * `held.len() <= max_concurrent`, except transiently after the budget is
//!   lowered under [`ShrinkPolicy::Retain`], where no new key is acquired
//!   until usage drops below the new limit.
//! * PWM state exists only for keys currently being driven in graded mode.
//!
//! # Graded drive
//!
//! Each driven key runs its own phase timer, advanced only by calls to
//! [`ActuatorArbiter::drive`].  A call toggles at most once, so a long gap
//! between frames just catches the timer up in one step.  Changing force
//! never resets the timer; the next phase simply uses the new duty.

use std::collections::HashMap;
use std::time::Duration;

use hand_signal::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::pwm::{self, PwmChannel, PwmSettings};
use crate::sink::{ActuatorSink, SinkError};

pub const MIN_BUDGET: usize = 1;
pub const MAX_BUDGET: usize = 10;

/// What happens to already-held keys when the budget shrinks below usage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShrinkPolicy {
    /// Keep them; only new acquisitions are blocked.
    #[default]
    Retain,
    /// Release the least-recently acquired keys down to the new limit.
    EvictOldest,
}

/// Result of one [`ActuatorArbiter::drive_outcome`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveOutcome {
    /// The key is down after the call.
    On,
    /// The key is up for its off phase.
    Off,
    /// The key was due to go down but the press was refused (budget full,
    /// output disabled or sink failure).
    Refused,
}

impl DriveOutcome {
    pub fn is_on(self) -> bool { self == DriveOutcome::On }
}

// ════════════════════════════════════════════════════════════════════════════
// ActuatorArbiter
// ════════════════════════════════════════════════════════════════════════════

pub struct ActuatorArbiter<S: ActuatorSink> {
    sink:           S,
    /// Held keys, oldest acquisition first.
    held:           Vec<String>,
    pwm:            HashMap<String, PwmChannel>,
    max_concurrent: usize,
    shrink:         ShrinkPolicy,
    settings:       PwmSettings,
    strength:       f32,
    enabled:        bool,
}

impl<S: ActuatorSink> ActuatorArbiter<S> {
    pub fn new(sink: S, max_concurrent: usize) -> Self {
        ActuatorArbiter {
            sink,
            held:           Vec::new(),
            pwm:            HashMap::new(),
            max_concurrent: clamp_budget(max_concurrent),
            shrink:         ShrinkPolicy::Retain,
            settings:       PwmSettings::default(),
            strength:       1.0,
            enabled:        true,
        }
    }

    pub fn with_settings(mut self, settings: PwmSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_shrink_policy(mut self, shrink: ShrinkPolicy) -> Self {
        self.shrink = shrink;
        self
    }

    // ── direct mode ──────────────────────────────────────────────────────

    /// Acquire `key`.  `Ok(true)` if it is held after the call (including
    /// when it already was), `Ok(false)` if the budget is full or the arbiter
    /// is disabled.  A sink failure leaves nothing marked held.
    pub fn press(&mut self, key: &str) -> Result<bool, SinkError> {
        if !self.enabled || key.is_empty() {
            return Ok(false);
        }
        if self.is_held(key) {
            return Ok(true);
        }
        if self.held.len() >= self.max_concurrent {
            debug!(key, held = self.held.len(), budget = self.max_concurrent, "budget full");
            return Ok(false);
        }
        if let Err(e) = self.sink.press(key) {
            warn!(key, error = %e, "press failed");
            return Err(e);
        }
        self.held.push(key.to_string());
        debug!(key, held = self.held.len(), "press");
        Ok(true)
    }

    /// Release `key` and drop any PWM state for it.  No-op if not held.  The
    /// key is forgotten even when the sink reports a failure.
    pub fn release(&mut self, key: &str) -> Result<(), SinkError> {
        self.pwm.remove(key);
        self.release_held(key)
    }

    fn release_held(&mut self, key: &str) -> Result<(), SinkError> {
        let Some(pos) = self.held.iter().position(|k| k == key) else {
            return Ok(());
        };
        self.held.remove(pos);
        debug!(key, held = self.held.len(), "release");
        self.sink.release(key).map_err(|e| {
            warn!(key, error = %e, "release failed");
            e
        })
    }

    // ── graded mode ──────────────────────────────────────────────────────

    /// Drive `key` at `force` in `[0, 1]`.  Returns whether the key is held
    /// after the call.
    pub fn drive(&mut self, key: &str, force: f32, now: Timestamp) -> bool {
        self.drive_outcome(key, force, now).is_on()
    }

    /// Like [`drive`](Self::drive), but tells a key resting in its off phase
    /// apart from one whose press was refused this call.
    pub fn drive_outcome(&mut self, key: &str, force: f32, now: Timestamp) -> DriveOutcome {
        if !self.enabled || key.is_empty() {
            return DriveOutcome::Refused;
        }

        if self.settings.is_full_hold(force) {
            self.pwm.remove(key);
            return match self.press(key) {
                Ok(true) => DriveOutcome::On,
                _ => DriveOutcome::Refused,
            };
        }

        let (on, off) = self.settings.phase_durations(force, self.strength);
        let mut ch = match self.pwm.get(key) {
            Some(ch) => *ch,
            // Coming out of a full hold keeps the key down and starts an on
            // phase; otherwise the first call is immediately due.
            None if self.is_held(key) => PwmChannel::new(force, true, Some(now)),
            None => PwmChannel::new(force, false, None),
        };
        ch.target_force = pwm::sanitize(force);

        let mut refused = false;
        if ch.is_due(now, on, off) {
            if ch.phase_on {
                if off > Duration::ZERO {
                    let _ = self.release_held(key);
                    ch.phase_on = false;
                }
                ch.last_toggle = Some(now);
            } else if let Ok(true) = self.press(key) {
                ch.phase_on = true;
                ch.last_toggle = Some(now);
            } else {
                // Stay off and retry on the next call.
                refused = true;
            }
        }

        self.pwm.insert(key.to_string(), ch);
        match (ch.phase_on, refused) {
            (true, _)      => DriveOutcome::On,
            (false, true)  => DriveOutcome::Refused,
            (false, false) => DriveOutcome::Off,
        }
    }

    // ── cleanup ──────────────────────────────────────────────────────────

    /// Release every held key and forget all PWM state.  Returns how many
    /// keys were released; sink failures are logged, not returned.
    pub fn release_all(&mut self) -> usize {
        let keys = std::mem::take(&mut self.held);
        self.pwm.clear();
        for key in &keys {
            if let Err(e) = self.sink.release(key) {
                warn!(key = key.as_str(), error = %e, "release failed during release_all");
            }
        }
        if !keys.is_empty() {
            info!(released = keys.len(), "released all keys");
        }
        keys.len()
    }

    // ── configuration ────────────────────────────────────────────────────

    /// Set the budget (clamped to `[1, 10]`).  Returns the number of keys
    /// evicted, which is always zero under [`ShrinkPolicy::Retain`].
    pub fn set_max_concurrent(&mut self, max: usize) -> usize {
        self.max_concurrent = clamp_budget(max);
        if self.shrink != ShrinkPolicy::EvictOldest {
            return 0;
        }
        let mut evicted = 0;
        while self.held.len() > self.max_concurrent {
            let key = self.held[0].clone();
            let _ = self.release(&key);
            evicted += 1;
        }
        if evicted > 0 {
            info!(evicted, budget = self.max_concurrent, "budget lowered, evicted oldest keys");
        }
        evicted
    }

    pub fn set_shrink_policy(&mut self, shrink: ShrinkPolicy) { self.shrink = shrink; }

    /// Force multiplier for graded keys, clamped to `[0.5, 2.0]`.
    pub fn set_strength(&mut self, strength: f32) {
        self.strength = pwm::clamp_strength(strength);
    }

    pub fn set_cycle(&mut self, cycle: Duration) {
        if cycle > Duration::ZERO {
            self.settings.cycle = cycle;
        }
    }

    /// Disabling releases everything and refuses further acquisitions.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.release_all();
        }
    }

    // ── accessors ────────────────────────────────────────────────────────

    pub fn count_held(&self)     -> usize          { self.held.len() }
    pub fn held_keys(&self)      -> &[String]      { &self.held }
    pub fn is_held(&self, key: &str) -> bool       { self.held.iter().any(|k| k == key) }
    pub fn max_concurrent(&self) -> usize          { self.max_concurrent }
    pub fn shrink_policy(&self)  -> ShrinkPolicy   { self.shrink }
    pub fn strength(&self)       -> f32            { self.strength }
    pub fn settings(&self)       -> &PwmSettings   { &self.settings }
    pub fn is_enabled(&self)     -> bool           { self.enabled }
    pub fn pwm_channel(&self, key: &str) -> Option<&PwmChannel> { self.pwm.get(key) }
    pub fn pwm_channels(&self)   -> usize          { self.pwm.len() }
    pub fn sink(&self)           -> &S             { &self.sink }
    pub fn sink_mut(&mut self)   -> &mut S         { &mut self.sink }
}

impl<S: ActuatorSink> Drop for ActuatorArbiter<S> {
    fn drop(&mut self) {
        self.release_all();
    }
}

fn clamp_budget(n: usize) -> usize { n.clamp(MIN_BUDGET, MAX_BUDGET) }

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
