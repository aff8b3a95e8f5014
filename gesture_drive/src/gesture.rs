//! The eight bindable gestures and the per-frame gesture report.

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════
// Gesture
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    SteerLeft,
    SteerRight,
    HandsClose,
    HandsFar,
    LeftForward,
    LeftBackward,
    RightForward,
    RightBackward,
}

impl Gesture {
    pub const ALL: [Gesture; 8] = [
        Gesture::SteerLeft,
        Gesture::SteerRight,
        Gesture::HandsClose,
        Gesture::HandsFar,
        Gesture::LeftForward,
        Gesture::LeftBackward,
        Gesture::RightForward,
        Gesture::RightBackward,
    ];

    /// Order of labels in [`GestureState::active`].
    pub const REPORT_ORDER: [Gesture; 8] = [
        Gesture::LeftForward,
        Gesture::LeftBackward,
        Gesture::RightForward,
        Gesture::RightBackward,
        Gesture::HandsClose,
        Gesture::HandsFar,
        Gesture::SteerLeft,
        Gesture::SteerRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Gesture::SteerLeft     => "steer_left",
            Gesture::SteerRight    => "steer_right",
            Gesture::HandsClose    => "hands_close",
            Gesture::HandsFar      => "hands_far",
            Gesture::LeftForward   => "left_forward",
            Gesture::LeftBackward  => "left_backward",
            Gesture::RightForward  => "right_forward",
            Gesture::RightBackward => "right_backward",
        }
    }

    /// Short status label.
    pub fn label(self) -> &'static str {
        match self {
            Gesture::SteerLeft     => "STEER-L",
            Gesture::SteerRight    => "STEER-R",
            Gesture::HandsClose    => "CLOSE",
            Gesture::HandsFar      => "FAR",
            Gesture::LeftForward   => "L-FORWARD",
            Gesture::LeftBackward  => "L-BACKWARD",
            Gesture::RightForward  => "R-FORWARD",
            Gesture::RightBackward => "R-BACKWARD",
        }
    }

    pub fn default_key(self) -> &'static str {
        match self {
            Gesture::SteerLeft     => "a",
            Gesture::SteerRight    => "d",
            Gesture::HandsClose    => "space",
            Gesture::HandsFar      => "shift",
            Gesture::LeftForward   => "up",
            Gesture::LeftBackward  => "down",
            Gesture::RightForward  => "w",
            Gesture::RightBackward => "s",
        }
    }

    pub fn enabled_by_default(self) -> bool {
        !matches!(self, Gesture::HandsFar | Gesture::LeftForward | Gesture::LeftBackward)
    }

    pub fn is_steering(self) -> bool {
        matches!(self, Gesture::SteerLeft | Gesture::SteerRight)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// GestureState: one frame's confirmed gestures
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GestureState {
    pub steer_left:     bool,
    pub steer_right:    bool,
    /// Smoothed steering pseudo-angle, 0 with level wrists.
    pub steering_angle: f32,
    /// Steering value in `[−1, 1]`.
    pub steering_normalized: f32,
    /// Force in `[0, 1]`; meaningful only while a direction is asserted.
    pub steering_force: f32,
    /// Eased indicator position in `[−1, 1]` for overlays.
    pub visual_steer:   f32,

    pub hands_close:    bool,
    pub hands_far:      bool,
    /// Smoothed palm-to-palm distance (normalized units).
    pub hands_distance: f32,

    pub left_forward:   bool,
    pub left_backward:  bool,
    pub right_forward:  bool,
    pub right_backward: bool,

    pub left_detected:  bool,
    pub right_detected: bool,

    /// Labels of asserted gestures, in [`Gesture::REPORT_ORDER`].
    pub active: Vec<&'static str>,
}

impl GestureState {
    pub fn is_active(&self, g: Gesture) -> bool {
        match g {
            Gesture::SteerLeft     => self.steer_left,
            Gesture::SteerRight    => self.steer_right,
            Gesture::HandsClose    => self.hands_close,
            Gesture::HandsFar      => self.hands_far,
            Gesture::LeftForward   => self.left_forward,
            Gesture::LeftBackward  => self.left_backward,
            Gesture::RightForward  => self.right_forward,
            Gesture::RightBackward => self.right_backward,
        }
    }

    pub(crate) fn collect_active(&mut self) {
        self.active = Gesture::REPORT_ORDER.iter()
            .filter(|g| self.is_active(**g))
            .map(|g| g.label())
            .collect();
    }
}
