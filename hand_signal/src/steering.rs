//! Two-hand steering: raw tilt angle, dead-zone force law, and the policy
//! that turns the smoothed angle into left/right intents.
//!
//! # Raw angle
//!
//! Only the vertical offset between the wrists is used:
//! `angle = −(right.y − left.y) × dy_scale`.  Image `y` grows downward, so a
//! raised right wrist gives a positive (rightward) angle.  Level wrists give
//! exactly zero.
//!
//! # Dead-zone force law
//!
//! ```text
//!   n     = clamp(angle / visual_max_angle, −1, 1)
//!   force = 0                                   if |n| ≤ dz
//!         = clamp((|n| − dz) / (1 − dz), 0, 1)  otherwise
//!   left  = n < −dz        right = n > dz
//! ```
//!
//! The boundary is exclusive, but whether a tilt that lands exactly on it
//! (0.1 at the default scale gives 18, i.e. `n = 0.3`) counts depends on how
//! the wrist difference rounds in `f32`.  Wrists at 0.5 and 0.4 give
//! 17.999998 and stay in the dead zone; 0.75 and 0.65 give 18.000004 and
//! steer right.

use crate::landmarks::Point;

pub const DEFAULT_DY_SCALE: f32 = 180.0;
pub const DEFAULT_VISUAL_MAX_ANGLE: f32 = 60.0;
pub const DEFAULT_DEAD_ZONE: f32 = 0.3;

/// Visual follower gain per frame.
pub const VISUAL_ALPHA: f32 = 0.25;

/// Pseudo-angle proportional to the wrists' vertical offset.
pub fn raw_steering_angle(left_wrist: Point, right_wrist: Point, dy_scale: f32) -> f32 {
    let dy = right_wrist.y - left_wrist.y;
    -dy * dy_scale
}

// ════════════════════════════════════════════════════════════════════════════
// SteeringReading
// ════════════════════════════════════════════════════════════════════════════

/// Direction plus force for one frame.  `force` only means something while
/// `left` or `right` is set.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SteeringReading {
    /// Steering value in `[−1, 1]`.
    pub normalized: f32,
    pub force:      f32,
    pub left:       bool,
    pub right:      bool,
}

// ════════════════════════════════════════════════════════════════════════════
// SteeringForceModel
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SteeringForceModel {
    pub visual_max_angle: f32,
    pub dead_zone_ratio:  f32,
}

impl SteeringForceModel {
    pub fn new(visual_max_angle: f32, dead_zone_ratio: f32) -> Self {
        SteeringForceModel { visual_max_angle, dead_zone_ratio }
    }

    pub fn normalize(&self, angle: f32) -> f32 {
        if self.visual_max_angle <= 0.0 || !angle.is_finite() {
            return 0.0;
        }
        (angle / self.visual_max_angle).clamp(-1.0, 1.0)
    }

    /// Linear ramp from 0 at the dead-zone edge to 1 at full deflection.
    pub fn force(&self, normalized: f32) -> f32 {
        let dz  = self.dead_zone_ratio;
        let mag = normalized.abs();
        if mag <= dz || dz >= 1.0 {
            return 0.0;
        }
        ((mag - dz) / (1.0 - dz)).clamp(0.0, 1.0)
    }

    pub fn evaluate(&self, angle: f32) -> SteeringReading {
        let n  = self.normalize(angle);
        let dz = self.dead_zone_ratio;
        SteeringReading {
            normalized: n,
            force:      self.force(n),
            left:       n < -dz,
            right:      n > dz,
        }
    }
}

impl Default for SteeringForceModel {
    fn default() -> Self {
        SteeringForceModel::new(DEFAULT_VISUAL_MAX_ANGLE, DEFAULT_DEAD_ZONE)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SteeringPolicy
// ════════════════════════════════════════════════════════════════════════════

/// How the smoothed angle maps onto the steering keys.  Pick one per
/// deployment: the two produce very different actuation patterns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SteeringPolicy {
    /// Plain threshold crossing.  The key is either held or not; force is 1
    /// while a direction is asserted.
    Threshold {
        /// Already divided by steering sensitivity.
        angle:            f32,
        visual_max_angle: f32,
    },
    /// Dead zone plus a graded force, meant to be rendered by a PWM driver.
    ProgressiveForce(SteeringForceModel),
}

impl SteeringPolicy {
    /// Threshold policy with `angle / sensitivity` as the crossing point.
    pub fn threshold(angle: f32, sensitivity: f32, visual_max_angle: f32) -> Self {
        let angle = if sensitivity > f32::EPSILON { angle / sensitivity } else { angle };
        SteeringPolicy::Threshold { angle, visual_max_angle }
    }

    pub fn progressive(visual_max_angle: f32, dead_zone_ratio: f32) -> Self {
        SteeringPolicy::ProgressiveForce(SteeringForceModel::new(visual_max_angle, dead_zone_ratio))
    }

    pub fn is_graded(&self) -> bool {
        matches!(self, SteeringPolicy::ProgressiveForce(_))
    }

    pub fn evaluate(&self, angle: f32) -> SteeringReading {
        match *self {
            SteeringPolicy::Threshold { angle: t, visual_max_angle } => {
                let left  = angle < -t;
                let right = angle > t;
                let n = if visual_max_angle > 0.0 && angle.is_finite() {
                    (angle / visual_max_angle).clamp(-1.0, 1.0)
                } else {
                    0.0
                };
                SteeringReading {
                    normalized: n,
                    force:      if left || right { 1.0 } else { 0.0 },
                    left,
                    right,
                }
            }
            SteeringPolicy::ProgressiveForce(model) => model.evaluate(angle),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// VisualSteer: eased indicator position for overlays
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VisualSteer {
    pos: f32,
}

impl VisualSteer {
    /// Move a quarter of the way toward `target` (clamped to `[−1, 1]`).
    pub fn follow(&mut self, target: f32) -> f32 {
        let target = target.clamp(-1.0, 1.0);
        self.pos += (target - self.pos) * VISUAL_ALPHA;
        self.pos
    }

    pub fn position(&self) -> f32 { self.pos }

    pub fn reset(&mut self) { self.pos = 0.0; }
}
