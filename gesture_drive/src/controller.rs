//! Gesture → key mapping on top of the pipeline and the arbiter.
//!
//! Each frame:
//!
//! 1. run the pipeline;
//! 2. collect the keys of enabled, bound, asserted gestures;
//! 3. release every key this controller owns that is no longer wanted;
//! 4. acquire the wanted keys, in gesture order (`press`, or `drive` for
//!    steering keys under the progressive policy).
//!
//! Releasing before acquiring lets a gesture change hand its budget slot to
//! the new gesture within the same frame.

use std::collections::BTreeSet;

use hand_signal::{HandRecord, Timestamp};
use key_arbiter::{ActuatorArbiter, ActuatorSink, DriveOutcome, PwmSettings};
use tracing::{debug, info};

use crate::config::ControlConfig;
use crate::gesture::{Gesture, GestureState};
use crate::pipeline::GesturePipeline;

/// What one frame did to the keys.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub state:    GestureState,
    /// Keys that went down this frame.
    pub pressed:  Vec<String>,
    /// Keys that went up this frame.
    pub released: Vec<String>,
    /// Wanted keys the arbiter would not acquire (budget full, disabled or
    /// sink failure).
    pub refused:  Vec<String>,
    /// Keys held after the frame, oldest first.
    pub held:     Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Want {
    Hold,
    Drive(f32),
}

pub struct GestureController<S: ActuatorSink> {
    pipeline: GesturePipeline,
    arbiter:  ActuatorArbiter<S>,
    /// Keys acquired on behalf of a gesture, including graded keys currently
    /// in their off phase.
    active:   BTreeSet<String>,
}

impl<S: ActuatorSink> GestureController<S> {
    pub fn new(cfg: &ControlConfig, sink: S) -> Self {
        let cfg = cfg.clamped();
        let settings = PwmSettings { cycle: cfg.pwm_cycle(), ..PwmSettings::default() };
        let mut arbiter = ActuatorArbiter::new(sink, cfg.max_concurrent)
            .with_settings(settings)
            .with_shrink_policy(cfg.shrink_policy);
        arbiter.set_strength(cfg.sensitivity.steering);

        GestureController {
            pipeline: GesturePipeline::new(&cfg),
            arbiter,
            active: BTreeSet::new(),
        }
    }

    pub fn handle_frame(&mut self, hands: &[HandRecord], now: Timestamp) -> FrameReport {
        let state = self.pipeline.process(hands, now);
        let wanted = self.wanted_keys(&state);
        let mut report = FrameReport::default();

        let stale: Vec<String> = self.active.iter()
            .filter(|k| !wanted.iter().any(|(w, _)| w == *k))
            .cloned()
            .collect();
        for key in stale {
            let was_held = self.arbiter.is_held(&key);
            let _ = self.arbiter.release(&key);
            self.active.remove(&key);
            if was_held {
                report.released.push(key);
            }
        }

        let mut next = BTreeSet::new();
        for (key, want) in wanted {
            let was_held = self.arbiter.is_held(&key);
            match want {
                Want::Hold => match self.arbiter.press(&key) {
                    Ok(true) => {
                        if !was_held {
                            report.pressed.push(key.clone());
                        }
                        next.insert(key);
                    }
                    _ => report.refused.push(key),
                },
                Want::Drive(force) => {
                    match self.arbiter.drive_outcome(&key, force, now) {
                        DriveOutcome::On if !was_held => report.pressed.push(key.clone()),
                        DriveOutcome::Off if was_held => report.released.push(key.clone()),
                        DriveOutcome::Refused => report.refused.push(key.clone()),
                        _ => {}
                    }
                    next.insert(key);
                }
            }
        }
        self.active = next;

        if !report.pressed.is_empty() || !report.released.is_empty() {
            debug!(pressed = ?report.pressed, released = ?report.released, "keys changed");
        }
        report.held = self.arbiter.held_keys().to_vec();
        report.state = state;
        report
    }

    /// Wanted keys in gesture order, deduplicated.  A key bound to both a
    /// held and a graded gesture is held.
    fn wanted_keys(&self, state: &GestureState) -> Vec<(String, Want)> {
        let cfg = self.pipeline.config();
        let graded = self.pipeline.policy().is_graded();
        let mut wanted: Vec<(String, Want)> = Vec::new();

        for g in Gesture::ALL {
            if !state.is_active(g) {
                continue;
            }
            let Some(key) = cfg.binding(g) else { continue };
            let want = if graded && g.is_steering() {
                Want::Drive(state.steering_force)
            } else {
                Want::Hold
            };
            match wanted.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => {
                    if want == Want::Hold {
                        entry.1 = Want::Hold;
                    }
                }
                None => wanted.push((key.to_string(), want)),
            }
        }
        wanted
    }

    /// The detector failed and was re-initialized: drop all history and let
    /// go of every key.
    pub fn detector_failed(&mut self) -> usize {
        info!("detector failure, resetting pipeline");
        self.pipeline.reset();
        self.active.clear();
        self.arbiter.release_all()
    }

    /// Release everything; the controller stays usable.
    pub fn stop(&mut self) -> usize {
        self.active.clear();
        self.arbiter.release_all()
    }

    /// Keyboard output on/off.  Turning it off releases every key.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.arbiter.set_enabled(enabled);
        if !enabled {
            self.active.clear();
        }
        info!(enabled, "key output toggled");
    }

    /// Apply a new configuration snapshot between frames.  Returns the
    /// number of keys evicted by a lowered budget.
    pub fn update_config(&mut self, cfg: &ControlConfig) -> usize {
        let was_graded = self.pipeline.policy().is_graded();
        self.pipeline.update_config(cfg);
        let cfg = self.pipeline.config().clone();

        if cfg.steering_policy().is_graded() != was_graded {
            // Graded and held keys are tracked differently; start clean.
            self.stop();
        }

        self.arbiter.set_shrink_policy(cfg.shrink_policy);
        self.arbiter.set_strength(cfg.sensitivity.steering);
        self.arbiter.set_cycle(cfg.pwm_cycle());
        let evicted = self.arbiter.set_max_concurrent(cfg.max_concurrent);

        let arbiter = &self.arbiter;
        self.active.retain(|k| arbiter.is_held(k) || arbiter.pwm_channel(k).is_some());
        evicted
    }

    pub fn state(&self)        -> &GestureState          { self.pipeline.state() }
    pub fn config(&self)       -> &ControlConfig         { self.pipeline.config() }
    pub fn pipeline(&self)     -> &GesturePipeline       { &self.pipeline }
    pub fn arbiter(&self)      -> &ActuatorArbiter<S>    { &self.arbiter }
    pub fn active_keys(&self)  -> &BTreeSet<String>      { &self.active }
    pub fn is_enabled(&self)   -> bool                   { self.arbiter.is_enabled() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SteeringMode;
    use crate::source::{synthetic_hand, BACKWARD, FIST, FORWARD};
    use hand_signal::{FingerFlags, Point, Side};
    use key_arbiter::{MemorySink, ShrinkPolicy, SinkEvent};

    fn ms(n: u64) -> Timestamp { Timestamp::from_millis(n) }

    fn raw_cfg() -> ControlConfig {
        ControlConfig { stability_mode: false, ..Default::default() }
    }

    fn controller(cfg: &ControlConfig) -> (GestureController<MemorySink>, MemorySink) {
        let sink = MemorySink::new();
        (GestureController::new(cfg, sink.clone()), sink)
    }

    fn right(flags: FingerFlags) -> Vec<HandRecord> {
        vec![synthetic_hand(Side::Right, Point::new(0.7, 0.8), flags)]
    }

    fn both(left_y: f32, right_y: f32, gap: f32, right_pose: FingerFlags) -> Vec<HandRecord> {
        vec![
            synthetic_hand(Side::Left, Point::new(0.5 - gap / 2.0, left_y), FIST),
            synthetic_hand(Side::Right, Point::new(0.5 + gap / 2.0, right_y), right_pose),
        ]
    }

    #[test]
    fn gesture_press_and_release() {
        let (mut c, sink) = controller(&raw_cfg());
        let r = c.handle_frame(&right(FORWARD), ms(0));
        assert_eq!(r.pressed, vec!["w"]);
        assert_eq!(r.held, vec!["w"]);

        let r = c.handle_frame(&right(FORWARD), ms(30));
        assert!(r.pressed.is_empty());

        let r = c.handle_frame(&right(BACKWARD), ms(60));
        assert_eq!(r.released, vec!["w"]);
        assert_eq!(r.pressed, vec!["s"]);
        assert_eq!(sink.down(), vec!["s".to_string()]);
    }

    #[test]
    fn debounced_press_waits_for_dwell() {
        let (mut c, sink) = controller(&ControlConfig::default());
        c.handle_frame(&right(FORWARD), ms(0));
        c.handle_frame(&right(FORWARD), ms(100));
        assert!(sink.events().is_empty());
        c.handle_frame(&right(FORWARD), ms(200));
        assert_eq!(sink.down(), vec!["w".to_string()]);
    }

    #[test]
    fn disabled_gesture_never_pressed() {
        let (mut c, sink) = controller(&raw_cfg());
        // Wide apart: HandsFar asserted but disabled by default.
        let r = c.handle_frame(&both(0.7, 0.7, 0.8, FIST), ms(0));
        assert!(r.state.hands_far);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn hands_lost_releases_keys() {
        let (mut c, sink) = controller(&raw_cfg());
        c.handle_frame(&both(0.7, 0.7, 0.05, FIST), ms(0));
        assert_eq!(sink.down(), vec!["space".to_string()]);
        let r = c.handle_frame(&[], ms(30));
        assert_eq!(r.released, vec!["space"]);
        assert!(sink.down().is_empty());
    }

    #[test]
    fn budget_refuses_extra_keys() {
        let mut cfg = ControlConfig { max_concurrent: 1, ..raw_cfg() };
        cfg.thresholds.hands_close_dist = 0.4;
        let (mut c, sink) = controller(&cfg);
        // Palms ≈ 0.3 apart (tilt included), right wrist raised, right hand forward.
        let r = c.handle_frame(&both(0.8, 0.5, 0.05, FORWARD), ms(0));
        assert!(r.state.steer_right && r.state.hands_close && r.state.right_forward);
        assert_eq!(r.held.len(), 1);
        assert_eq!(r.refused.len(), 2);
        assert_eq!(sink.down().len(), 1);
    }

    #[test]
    fn graded_steering_pulses() {
        let cfg = ControlConfig { steering_mode: SteeringMode::ProgressiveForce, ..raw_cfg() };
        let (mut c, sink) = controller(&cfg);
        // angle 54 → n 0.9 → force ≈ 0.857, below full hold.
        let r = c.handle_frame(&both(0.8, 0.5, 0.4, FIST), ms(0));
        assert!(r.state.steer_right);
        assert!(r.state.steering_force < 0.95);
        assert_eq!(r.pressed, vec!["d"]);

        // On phase ≈ 87 ms has run out.
        let r = c.handle_frame(&both(0.8, 0.5, 0.4, FIST), ms(200));
        assert_eq!(r.released, vec!["d"]);
        assert!(c.active_keys().contains("d"));
        assert_eq!(
            sink.events(),
            vec![SinkEvent::Press("d".into()), SinkEvent::Release("d".into())]
        );

        // Level long enough to flush the smoother: key and timer both go.
        for i in 0..12 {
            c.handle_frame(&both(0.7, 0.7, 0.4, FIST), ms(400 + 30 * i));
        }
        assert!(!c.state().steer_right);
        assert!(c.active_keys().is_empty());
        assert!(c.arbiter().pwm_channel("d").is_none());
        assert!(sink.down().is_empty());
    }

    #[test]
    fn graded_key_off_phase_is_not_released_by_diff() {
        let cfg = ControlConfig { steering_mode: SteeringMode::ProgressiveForce, ..raw_cfg() };
        let (mut c, _sink) = controller(&cfg);
        c.handle_frame(&both(0.8, 0.5, 0.4, FIST), ms(0));
        c.handle_frame(&both(0.8, 0.5, 0.4, FIST), ms(200));
        assert!(c.arbiter().pwm_channel("d").is_some());
        c.handle_frame(&both(0.8, 0.5, 0.4, FIST), ms(205));
        assert!(c.arbiter().pwm_channel("d").is_some());
    }

    #[test]
    fn graded_key_blocked_by_budget_is_refused() {
        let cfg = ControlConfig {
            max_concurrent: 1,
            steering_mode:  SteeringMode::ProgressiveForce,
            ..raw_cfg()
        };
        let (mut c, sink) = controller(&cfg);
        c.handle_frame(&right(FORWARD), ms(0));
        assert_eq!(sink.down(), vec!["w".to_string()]);

        for t in [30, 60, 90] {
            let r = c.handle_frame(&both(0.8, 0.5, 0.4, FORWARD), ms(t));
            assert!(r.state.steer_right);
            assert_eq!(r.refused, vec!["d"]);
            assert_eq!(r.held, vec!["w"]);
        }
    }

    #[test]
    fn detector_failure_releases_and_resets() {
        let (mut c, sink) = controller(&raw_cfg());
        c.handle_frame(&right(FORWARD), ms(0));
        assert_eq!(c.detector_failed(), 1);
        assert!(sink.down().is_empty());
        assert!(c.active_keys().is_empty());
        assert!(c.state().active.is_empty());
    }

    #[test]
    fn disabling_output_releases_and_blocks() {
        let (mut c, sink) = controller(&raw_cfg());
        c.handle_frame(&right(FORWARD), ms(0));
        c.set_enabled(false);
        assert!(sink.down().is_empty());
        let r = c.handle_frame(&right(FORWARD), ms(30));
        assert_eq!(r.refused, vec!["w"]);
        c.set_enabled(true);
        c.handle_frame(&right(FORWARD), ms(60));
        assert_eq!(sink.down(), vec!["w".to_string()]);
    }

    #[test]
    fn lowered_budget_evicts_oldest() {
        let mut cfg = ControlConfig { shrink_policy: ShrinkPolicy::EvictOldest, ..raw_cfg() };
        cfg.thresholds.hands_close_dist = 0.4;
        let (mut c, sink) = controller(&cfg);
        c.handle_frame(&both(0.8, 0.5, 0.05, FORWARD), ms(0));
        assert_eq!(sink.down().len(), 3);

        let lowered = ControlConfig { max_concurrent: 1, ..cfg };
        assert_eq!(c.update_config(&lowered), 2);
        assert_eq!(sink.down().len(), 1);
        assert_eq!(c.active_keys().len(), 1);
    }

    #[test]
    fn rebinding_moves_key() {
        let (mut c, sink) = controller(&raw_cfg());
        c.handle_frame(&right(FORWARD), ms(0));
        let mut cfg = raw_cfg();
        cfg.keybindings.insert(Gesture::RightForward, "up".to_string());
        c.update_config(&cfg);
        let r = c.handle_frame(&right(FORWARD), ms(30));
        assert_eq!(r.released, vec!["w"]);
        assert_eq!(r.pressed, vec!["up"]);
        assert_eq!(sink.down(), vec!["up".to_string()]);
    }

    #[test]
    fn drop_releases_everything() {
        let sink = MemorySink::new();
        {
            let mut c = GestureController::new(&raw_cfg(), sink.clone());
            c.handle_frame(&right(FORWARD), ms(0));
            assert_eq!(sink.down().len(), 1);
        }
        assert!(sink.down().is_empty());
    }
}
