//! Per-hand features derived from the raw landmark list.
//!
//! # Algorithm
//!
//! * **Palm**: mean of the wrist and the four finger MCP joints.
//! * **Finger extended** (index … pinky): the tip is further from the wrist
//!   than its MCP joint is, by more than a margin:
//!   `|tip − wrist| > |mcp − wrist| + margin`.
//! * **Thumb extended**: the thumb's joints fold differently, so it uses a
//!   ratio test instead: `|thumb_tip − pinky_mcp| > 0.8 × |wrist − pinky_mcp|`.
//! * **Forward** pose: index + middle out, ring + pinky curled.
//! * **Backward** pose: thumb out, every other finger curled.

use crate::landmarks::{self, HandRecord, LandmarkError, Point, Side};

/// Thumb reach relative to the wrist→pinky-MCP span.
pub const THUMB_RATIO: f32 = 0.8;

/// Euclidean distance between two normalized points.
pub fn distance(a: Point, b: Point) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

/// `|tip − wrist| > |mcp − wrist| + margin`
pub fn finger_extended(tip: Point, mcp: Point, wrist: Point, margin: f32) -> bool {
    distance(tip, wrist) > distance(mcp, wrist) + margin
}

/// Scale the configured extension margin by finger sensitivity.
/// Higher sensitivity → smaller margin → fingers register as extended sooner.
pub fn finger_margin(threshold: f32, sensitivity: f32) -> f32 {
    if sensitivity > f32::EPSILON { threshold / sensitivity } else { threshold }
}

// ════════════════════════════════════════════════════════════════════════════
// FingerFlags / FingerPose
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FingerFlags {
    pub thumb:  bool,
    pub index:  bool,
    pub middle: bool,
    pub ring:   bool,
    pub pinky:  bool,
}

impl FingerFlags {
    /// Index + middle extended, ring + pinky curled.  Thumb is ignored.
    pub fn is_forward(&self) -> bool {
        self.index && self.middle && !self.ring && !self.pinky
    }

    /// Thumb alone extended.
    pub fn is_backward(&self) -> bool {
        self.thumb && !self.index && !self.middle && !self.ring && !self.pinky
    }

    pub fn pose(&self) -> FingerPose {
        FingerPose { forward: self.is_forward(), backward: self.is_backward() }
    }
}

/// The two composite finger gestures.  Never both true; may both be false.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FingerPose {
    pub forward:  bool,
    pub backward: bool,
}

// ════════════════════════════════════════════════════════════════════════════
// HandFeatures
// ════════════════════════════════════════════════════════════════════════════

/// Geometry of one hand for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct HandFeatures {
    pub side:  Side,
    pub wrist: Point,
    pub palm:  Point,
    /// Fingertips, thumb first.
    pub tips:  [Point; 5],
    /// MCP joints, thumb first.
    pub mcps:  [Point; 5],
}

impl HandFeatures {
    pub fn extract(record: &HandRecord) -> Result<Self, LandmarkError> {
        record.validate()?;
        let pts = &record.points;

        let (sx, sy) = landmarks::PALM_BASE.iter()
            .fold((0.0f32, 0.0f32), |(sx, sy), &i| (sx + pts[i].x, sy + pts[i].y));
        let n = landmarks::PALM_BASE.len() as f32;

        Ok(HandFeatures {
            side:  record.side,
            wrist: pts[landmarks::WRIST],
            palm:  Point::new(sx / n, sy / n),
            tips:  landmarks::TIPS.map(|i| pts[i]),
            mcps:  landmarks::MCPS.map(|i| pts[i]),
        })
    }

    pub fn pinky_mcp(&self) -> Point { self.mcps[4] }

    pub fn thumb_extended(&self) -> bool {
        distance(self.tips[0], self.pinky_mcp())
            > distance(self.wrist, self.pinky_mcp()) * THUMB_RATIO
    }

    pub fn finger_flags(&self, margin: f32) -> FingerFlags {
        let ext = |i: usize| finger_extended(self.tips[i], self.mcps[i], self.wrist, margin);
        FingerFlags {
            thumb:  self.thumb_extended(),
            index:  ext(1),
            middle: ext(2),
            ring:   ext(3),
            pinky:  ext(4),
        }
    }

    pub fn pose(&self, margin: f32) -> FingerPose {
        self.finger_flags(margin).pose()
    }
}
