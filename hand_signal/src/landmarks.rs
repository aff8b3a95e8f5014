//! Raw detector output: one record per detected hand per frame.
//!
//! Points follow the 21-landmark hand topology (wrist, then four joints per
//! digit from thumb to pinky) in normalized `[0, 1]` image coordinates with
//! `y` growing downward.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════
// Landmark indices
// ════════════════════════════════════════════════════════════════════════════

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize      = 0;
pub const THUMB_MCP: usize  = 2;
pub const THUMB_TIP: usize  = 4;
pub const INDEX_MCP: usize  = 5;
pub const INDEX_TIP: usize  = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize   = 13;
pub const RING_TIP: usize   = 16;
pub const PINKY_MCP: usize  = 17;
pub const PINKY_TIP: usize  = 20;

/// Base points averaged into the palm centroid.
pub const PALM_BASE: [usize; 5] = [WRIST, INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

/// Fingertips, thumb first.
pub const TIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// MCP joints, thumb first.
pub const MCPS: [usize; 5] = [THUMB_MCP, INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

// ════════════════════════════════════════════════════════════════════════════
// Point / Side
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self { Point { x, y } }

    pub fn is_finite(&self) -> bool { self.x.is_finite() && self.y.is_finite() }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self { Point { x, y } }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn mirrored(self) -> Side {
        match self {
            Side::Left  => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::Left  => "Left",
            Side::Right => "Right",
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandRecord
// ════════════════════════════════════════════════════════════════════════════

/// One detected hand as delivered by the landmark detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HandRecord {
    pub side:   Side,
    pub points: Vec<Point>,
}

impl HandRecord {
    pub fn new(side: Side, points: Vec<Point>) -> Self {
        HandRecord { side, points }
    }

    /// Check the record is usable for feature extraction.
    pub fn validate(&self) -> Result<(), LandmarkError> {
        if self.points.len() != LANDMARK_COUNT {
            return Err(LandmarkError::PointCount {
                side:     self.side,
                expected: LANDMARK_COUNT,
                found:    self.points.len(),
            });
        }
        if let Some(index) = self.points.iter().position(|p| !p.is_finite()) {
            return Err(LandmarkError::NonFinite { side: self.side, index });
        }
        Ok(())
    }
}

/// Why a hand record was rejected.  Rejection only drops the hand for the
/// current frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LandmarkError {
    #[error("{side:?} hand has {found} landmarks, expected {expected}")]
    PointCount { side: Side, expected: usize, found: usize },

    #[error("{side:?} hand landmark {index} is not a finite coordinate")]
    NonFinite { side: Side, index: usize },
}
