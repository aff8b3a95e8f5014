//! Controller configuration snapshot.
//!
//! The host owns the configuration and re-injects a fresh snapshot whenever
//! the user changes something; the controller applies it between frames
//! without resetting smoothing or debounce state.  Out-of-range values are
//! clamped, never rejected.
//!
//! Snapshots (de)serialize as JSON.  Missing fields take their defaults and
//! missing gestures in the binding tables keep their default entries, so a
//! partial file only overrides what it names.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use hand_signal::{SteeringPolicy, MAX_DELAY, MIN_DELAY};
use key_arbiter::{ShrinkPolicy, MAX_BUDGET, MIN_BUDGET};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gesture::Gesture;

pub const MIN_SENSITIVITY: f32 = 0.5;
pub const MAX_SENSITIVITY: f32 = 2.0;
pub const MAX_DEAD_ZONE: f32 = 0.95;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("could not serialize configuration: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("could not access {path}: {source}")]
    Io {
        path:   String,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown profile '{0}' (expected racing, action or casual)")]
    UnknownProfile(String),
}

// ════════════════════════════════════════════════════════════════════════════
// Sections
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Threshold-policy crossing angle (pseudo-degrees).
    pub steering_angle:       f32,
    pub hands_close_dist:     f32,
    pub hands_far_dist:       f32,
    /// Margin a fingertip must clear beyond its MCP joint to count as extended.
    pub finger_extend_thresh: f32,
    /// Debounce dwell, seconds.
    pub stability_delay:      f64,
    pub dead_zone_ratio:      f32,
    pub visual_max_angle:     f32,
    pub steering_dy_scale:    f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            steering_angle:       35.0,
            hands_close_dist:     0.12,
            hands_far_dist:       0.55,
            finger_extend_thresh: 0.06,
            stability_delay:      0.18,
            dead_zone_ratio:      0.3,
            visual_max_angle:     60.0,
            steering_dy_scale:    180.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sensitivity {
    /// Divides the steering threshold; multiplies graded steering force.
    pub steering: f32,
    /// Divides the finger-extension margin.
    pub fingers:  f32,
    /// Divides the close threshold, multiplies the far threshold.
    pub distance: f32,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Sensitivity { steering: 1.0, fingers: 1.0, distance: 1.0 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteeringMode {
    /// Steering keys are simply held past the threshold angle.
    #[default]
    Threshold,
    /// Dead zone plus PWM-graded force on the steering keys.
    ProgressiveForce,
}

// ════════════════════════════════════════════════════════════════════════════
// Profiles
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Profile {
    Racing,
    Action,
    Casual,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Racing, Profile::Action, Profile::Casual];

    pub fn name(self) -> &'static str {
        match self {
            Profile::Racing => "racing",
            Profile::Action => "action",
            Profile::Casual => "casual",
        }
    }

    /// `(max_concurrent, stability_delay, steering_angle)`
    fn values(self) -> (usize, f64, f32) {
        match self {
            Profile::Racing => (4, 0.15, 30.0),
            Profile::Action => (3, 0.18, 35.0),
            Profile::Casual => (2, 0.22, 40.0),
        }
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::ALL.iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownProfile(s.to_string()))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ControlConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub keybindings:       BTreeMap<Gesture, String>,
    pub enabled_gestures:  BTreeMap<Gesture, bool>,
    pub thresholds:        Thresholds,
    pub sensitivity:       Sensitivity,
    /// Actuator budget.
    pub max_concurrent:    usize,
    /// When off, raw per-frame decisions bypass debounce.
    pub stability_mode:    bool,
    /// Swap detector side labels (selfie-camera detectors report the
    /// mirrored hand).
    pub mirror_handedness: bool,
    pub steering_mode:     SteeringMode,
    /// Graded-steering PWM period in milliseconds.
    pub pwm_cycle_ms:      u64,
    pub shrink_policy:     ShrinkPolicy,
}

impl Default for ControlConfig {
    fn default() -> Self {
        ControlConfig {
            keybindings:       Gesture::ALL.iter().map(|g| (*g, g.default_key().to_string())).collect(),
            enabled_gestures:  Gesture::ALL.iter().map(|g| (*g, g.enabled_by_default())).collect(),
            thresholds:        Thresholds::default(),
            sensitivity:       Sensitivity::default(),
            max_concurrent:    4,
            stability_mode:    true,
            mirror_handedness: false,
            steering_mode:     SteeringMode::Threshold,
            pwm_cycle_ms:      100,
            shrink_policy:     ShrinkPolicy::Retain,
        }
    }
}

impl ControlConfig {
    /// Parse a JSON snapshot, fill gaps from defaults and clamp.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut cfg: ControlConfig = serde_json::from_str(json).map_err(ConfigError::Parse)?;
        for g in Gesture::ALL {
            cfg.keybindings.entry(g).or_insert_with(|| g.default_key().to_string());
            cfg.enabled_gestures.entry(g).or_insert_with(|| g.enabled_by_default());
        }
        Ok(cfg.clamped())
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let io_err = |source| ConfigError::Io { path: path.display().to_string(), source };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        fs::write(path, self.to_json()?).map_err(io_err)
    }

    /// Overlay a profile's budget, debounce delay and steering angle.
    pub fn apply_profile(&mut self, profile: Profile) {
        let (max_keys, delay, angle) = profile.values();
        self.max_concurrent = max_keys;
        self.thresholds.stability_delay = delay;
        self.thresholds.steering_angle = angle;
    }

    /// Copy with every value forced into its valid range.
    pub fn clamped(&self) -> Self {
        let d  = Thresholds::default();
        let t  = &self.thresholds;
        let s  = &self.sensitivity;
        let sens = |v: f32| clamp_or(v, MIN_SENSITIVITY, MAX_SENSITIVITY, 1.0);

        ControlConfig {
            thresholds: Thresholds {
                steering_angle:       positive_or(t.steering_angle, d.steering_angle),
                hands_close_dist:     clamp_or(t.hands_close_dist, 0.0, 2.0, d.hands_close_dist),
                hands_far_dist:       clamp_or(t.hands_far_dist, 0.0, 2.0, d.hands_far_dist),
                finger_extend_thresh: clamp_or(t.finger_extend_thresh, 0.0, 1.0, d.finger_extend_thresh),
                stability_delay:      if t.stability_delay.is_finite() {
                    t.stability_delay.clamp(MIN_DELAY, MAX_DELAY)
                } else {
                    d.stability_delay
                },
                dead_zone_ratio:      clamp_or(t.dead_zone_ratio, 0.0, MAX_DEAD_ZONE, d.dead_zone_ratio),
                visual_max_angle:     positive_or(t.visual_max_angle, d.visual_max_angle),
                steering_dy_scale:    if t.steering_dy_scale.is_finite() {
                    t.steering_dy_scale
                } else {
                    d.steering_dy_scale
                },
            },
            sensitivity: Sensitivity {
                steering: sens(s.steering),
                fingers:  sens(s.fingers),
                distance: sens(s.distance),
            },
            max_concurrent: self.max_concurrent.clamp(MIN_BUDGET, MAX_BUDGET),
            pwm_cycle_ms:   self.pwm_cycle_ms.clamp(20, 1_000),
            ..self.clone()
        }
    }

    pub fn steering_policy(&self) -> SteeringPolicy {
        let t = &self.thresholds;
        match self.steering_mode {
            SteeringMode::Threshold => {
                SteeringPolicy::threshold(t.steering_angle, self.sensitivity.steering, t.visual_max_angle)
            }
            SteeringMode::ProgressiveForce => {
                SteeringPolicy::progressive(t.visual_max_angle, t.dead_zone_ratio)
            }
        }
    }

    pub fn pwm_cycle(&self) -> Duration { Duration::from_millis(self.pwm_cycle_ms) }

    /// Key bound to `g`, if the gesture is enabled and the binding non-empty.
    pub fn binding(&self, g: Gesture) -> Option<&str> {
        if !self.enabled_gestures.get(&g).copied().unwrap_or(true) {
            return None;
        }
        self.keybindings.get(&g)
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
    }
}

fn clamp_or(v: f32, lo: f32, hi: f32, fallback: f32) -> f32 {
    if v.is_finite() { v.clamp(lo, hi) } else { fallback }
}

fn positive_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() && v > 0.0 { v } else { fallback }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_values() {
        let c = ControlConfig::default();
        assert_eq!(c.max_concurrent, 4);
        assert_eq!(c.thresholds.steering_angle, 35.0);
        assert_eq!(c.keybindings[&Gesture::HandsClose], "space");
        assert!(!c.enabled_gestures[&Gesture::HandsFar]);
        assert_eq!(c, c.clamped());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = ControlConfig::from_json(r#"{
            "keybindings": { "steer_left": "left" },
            "thresholds": { "stability_delay": 0.25 }
        }"#).unwrap();
        assert_eq!(c.keybindings[&Gesture::SteerLeft], "left");
        assert_eq!(c.keybindings[&Gesture::SteerRight], "d");
        assert_eq!(c.thresholds.stability_delay, 0.25);
        assert_eq!(c.thresholds.hands_close_dist, 0.12);
        assert!(c.enabled_gestures[&Gesture::SteerLeft]);
    }

    #[test]
    fn out_of_range_values_clamped() {
        let c = ControlConfig::from_json(r#"{
            "max_concurrent": 40,
            "thresholds": { "stability_delay": 3.0, "dead_zone_ratio": 1.5, "visual_max_angle": -5 },
            "sensitivity": { "steering": 9.0, "fingers": 0.01 }
        }"#).unwrap();
        assert_eq!(c.max_concurrent, 10);
        assert_eq!(c.thresholds.stability_delay, 0.5);
        assert_eq!(c.thresholds.dead_zone_ratio, MAX_DEAD_ZONE);
        assert_eq!(c.thresholds.visual_max_angle, 60.0);
        assert_eq!(c.sensitivity.steering, 2.0);
        assert_eq!(c.sensitivity.fingers, 0.5);
    }

    #[test]
    fn zero_budget_clamped_up() {
        let c = ControlConfig { max_concurrent: 0, ..Default::default() }.clamped();
        assert_eq!(c.max_concurrent, 1);
    }

    #[test]
    fn bad_json_is_parse_error() {
        assert!(matches!(ControlConfig::from_json("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn json_round_trip() {
        let mut c = ControlConfig::default();
        c.steering_mode = SteeringMode::ProgressiveForce;
        c.shrink_policy = ShrinkPolicy::EvictOldest;
        let back = ControlConfig::from_json(&c.to_json().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn profiles_apply() {
        let mut c = ControlConfig::default();
        c.apply_profile("casual".parse().unwrap());
        assert_eq!(c.max_concurrent, 2);
        assert_eq!(c.thresholds.stability_delay, 0.22);
        assert_eq!(c.thresholds.steering_angle, 40.0);
        assert!(matches!("turbo".parse::<Profile>(), Err(ConfigError::UnknownProfile(_))));
    }

    #[test]
    fn disabled_or_empty_binding_is_none() {
        let mut c = ControlConfig::default();
        assert_eq!(c.binding(Gesture::HandsFar), None);
        assert_eq!(c.binding(Gesture::RightForward), Some("w"));
        c.keybindings.insert(Gesture::RightForward, "  ".to_string());
        assert_eq!(c.binding(Gesture::RightForward), None);
    }

    #[test]
    fn steering_policy_follows_mode() {
        let mut c = ControlConfig::default();
        assert!(!c.steering_policy().is_graded());
        c.steering_mode = SteeringMode::ProgressiveForce;
        assert!(c.steering_policy().is_graded());
    }

    #[test]
    fn save_and_load() {
        let dir = std::env::temp_dir().join(format!("gesture_drive_cfg_{}", std::process::id()));
        let path = dir.join("config.json");
        let mut c = ControlConfig::default();
        c.max_concurrent = 7;
        c.save(&path).unwrap();
        assert_eq!(ControlConfig::load(&path).unwrap(), c);
        let _ = fs::remove_dir_all(&dir);
    }
}
