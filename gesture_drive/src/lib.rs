//! # gesture_drive
//!
//! Hand-gesture game controller.  Per-frame hand landmarks go in; debounced,
//! optionally force-graded key presses come out, never more than the
//! configured number at once.
//!
//! ## Gesture → key mapping (defaults)
//!
//! | Gesture | Hands | Default key | Enabled |
//! |---|---|---|---|
//! | Steer left (left wrist higher) | Both | `a` | yes |
//! | Steer right (right wrist higher) | Both | `d` | yes |
//! | Hands close | Both | `space` | yes |
//! | Hands far apart | Both | `shift` | no |
//! | Forward (index + middle out) | Right | `w` | yes |
//! | Backward (thumb out only) | Right | `s` | yes |
//! | Forward | Left | `up` | no |
//! | Backward | Left | `down` | no |
//!
//! ## Steering modes
//!
//! * **Threshold** (default): a steering key is held while the smoothed angle
//!   is past the threshold.
//! * **Progressive force**: past a dead zone the key is pulsed with a duty
//!   cycle proportional to the tilt.
//!
//! ## Feature flags
//!
//! * (default): keys are logged through `tracing`.
//! * `midi`: keys sound as notes on the first MIDI output port.
//!
//! ## Example
//!
//! ```rust
//! use gesture_drive::{ControlConfig, GestureController};
//! use gesture_drive::source::{synthetic_hand, FORWARD};
//! use hand_signal::{Point, Side, Timestamp};
//! use key_arbiter::MemorySink;
//!
//! let cfg = ControlConfig { stability_mode: false, ..Default::default() };
//! let sink = MemorySink::new();
//! let mut ctl = GestureController::new(&cfg, sink.clone());
//!
//! let hand = synthetic_hand(Side::Right, Point::new(0.7, 0.8), FORWARD);
//! let report = ctl.handle_frame(&[hand], Timestamp::ZERO);
//! assert_eq!(report.held, vec!["w".to_string()]);
//!
//! ctl.stop();
//! assert!(sink.down().is_empty());
//! ```

pub mod gesture;
pub mod config;
pub mod pipeline;
pub mod controller;
pub mod source;
pub mod sinks;
pub mod app;

pub use gesture::{Gesture, GestureState};
pub use config::{ConfigError, ControlConfig, Profile, Sensitivity, SteeringMode, Thresholds};
pub use pipeline::GesturePipeline;
pub use controller::{FrameReport, GestureController};
pub use app::{run, AppConfig, AppError, RunSummary};
