//! One frame of hand records in, one [`GestureState`] out.
//!
//! ```text
//!   HandRecord[] ─▶ side assignment ─▶ HandFeatures ─┬─▶ finger pose ──────────▶ debounce ─┐
//!                                                    └─▶ (both hands) distance ─▶ smoother ─▶ debounce ─┤
//!                                                                     wrist dy ─▶ smoother ─▶ policy ─▶ debounce ─┤
//!                                                                                                     GestureState
//! ```
//!
//! All state (smoothers, debounce table, visual follower) lives here; nothing
//! is global.  Time comes in with every call.

use hand_signal::{
    distance, finger_margin, raw_steering_angle, HandFeatures, HandRecord, Side, Smoother,
    StabilityFilter, SteeringPolicy, SteeringReading, Timestamp, VisualSteer, DISTANCE_WINDOW,
    STEERING_WINDOW,
};
use tracing::{debug, warn};

use crate::config::ControlConfig;
use crate::gesture::{Gesture, GestureState};

pub struct GesturePipeline {
    cfg:       ControlConfig,
    policy:    SteeringPolicy,
    steering:  Smoother,
    distance:  Smoother,
    stability: StabilityFilter<Gesture>,
    visual:    VisualSteer,
    state:     GestureState,
}

impl GesturePipeline {
    pub fn new(cfg: &ControlConfig) -> Self {
        let cfg = cfg.clamped();
        GesturePipeline {
            policy:    cfg.steering_policy(),
            steering:  Smoother::new(STEERING_WINDOW),
            distance:  Smoother::new(DISTANCE_WINDOW),
            stability: StabilityFilter::new(cfg.thresholds.stability_delay),
            visual:    VisualSteer::default(),
            state:     GestureState::default(),
            cfg,
        }
    }

    /// Take a new configuration snapshot.  Smoothing and debounce state
    /// carry over; only thresholds and modes change.
    pub fn update_config(&mut self, cfg: &ControlConfig) {
        self.cfg = cfg.clamped();
        self.policy = self.cfg.steering_policy();
        self.stability.set_delay(self.cfg.thresholds.stability_delay);
    }

    /// Clear smoothers, debounce table and the visual follower, as after a
    /// detector re-initialization.
    pub fn reset(&mut self) {
        self.steering.reset();
        self.distance.reset();
        self.stability.reset();
        self.visual.reset();
        self.state = GestureState::default();
        debug!("pipeline reset");
    }

    pub fn state(&self)  -> &GestureState  { &self.state }
    pub fn config(&self) -> &ControlConfig { &self.cfg }
    pub fn policy(&self) -> SteeringPolicy { self.policy }

    pub fn process(&mut self, hands: &[HandRecord], now: Timestamp) -> GestureState {
        let (left, right) = self.assign_sides(hands);
        let mut s = GestureState {
            left_detected:  left.is_some(),
            right_detected: right.is_some(),
            ..Default::default()
        };

        let margin = finger_margin(self.cfg.thresholds.finger_extend_thresh, self.cfg.sensitivity.fingers);

        if let Some(h) = &left {
            let pose = h.pose(margin);
            s.left_forward  = self.gate(Gesture::LeftForward, pose.forward, now);
            s.left_backward = self.gate(Gesture::LeftBackward, pose.backward, now);
        }
        if let Some(h) = &right {
            let pose = h.pose(margin);
            s.right_forward  = self.gate(Gesture::RightForward, pose.forward, now);
            s.right_backward = self.gate(Gesture::RightBackward, pose.backward, now);
        }

        if let (Some(l), Some(r)) = (&left, &right) {
            let t    = &self.cfg.thresholds;
            let sens = self.cfg.sensitivity.distance;
            let close_t = t.hands_close_dist / sens;
            let far_t   = t.hands_far_dist * sens;
            let dy_scale = t.steering_dy_scale;

            let d = self.distance.add(distance(l.palm, r.palm));
            s.hands_distance = d;
            s.hands_close = self.gate(Gesture::HandsClose, d < close_t, now);
            s.hands_far   = self.gate(Gesture::HandsFar, d > far_t, now);

            let angle = self.steering.add(raw_steering_angle(l.wrist, r.wrist, dy_scale));
            let reading: SteeringReading = self.policy.evaluate(angle);
            s.steering_angle      = angle;
            s.steering_normalized = reading.normalized;
            s.steering_force      = reading.force;
            s.steer_left  = self.gate(Gesture::SteerLeft, reading.left, now);
            s.steer_right = self.gate(Gesture::SteerRight, reading.right, now);

            self.visual.follow(reading.normalized);
        }
        s.visual_steer = self.visual.position();
        s.collect_active();

        if s.active != self.state.active {
            debug!(active = ?s.active, "gestures changed");
        }
        self.state = s.clone();
        s
    }

    /// Debounced value, or the raw one when stability mode is off.
    fn gate(&mut self, g: Gesture, raw: bool, now: Timestamp) -> bool {
        if self.cfg.stability_mode {
            self.stability.update(g, raw, now)
        } else {
            raw
        }
    }

    /// Later records for the same side replace earlier ones; malformed
    /// records are dropped for this frame.
    fn assign_sides(&self, hands: &[HandRecord]) -> (Option<HandFeatures>, Option<HandFeatures>) {
        let mut left  = None;
        let mut right = None;
        for rec in hands {
            let features = match HandFeatures::extract(rec) {
                Ok(f)  => f,
                Err(e) => {
                    warn!(error = %e, "dropping malformed hand record");
                    continue;
                }
            };
            let side = if self.cfg.mirror_handedness { rec.side.mirrored() } else { rec.side };
            match side {
                Side::Left  => left  = Some(features),
                Side::Right => right = Some(features),
            }
        }
        (left, right)
    }
}
