//! # hand_signal
//!
//! Signal-processing front half of the gesture pipeline: turns raw 2-D hand
//! landmarks into stable booleans and a graded steering force.
//!
//! | Stage | Type | Output |
//! |---|---|---|
//! | Feature extraction | [`HandFeatures`] | finger flags, palm centroid, forward/backward pose |
//! | Smoothing | [`Smoother`] | moving average over a fixed window |
//! | Debounce | [`StabilityFilter`] | confirmed booleans, flicker rejected |
//! | Steering | [`SteeringPolicy`] | left/right flags plus force in `[0, 1]` |
//!
//! Nothing here reads a clock: every time-dependent call takes an explicit
//! [`Timestamp`] so callers (and tests) control time.
//!
//! ## Quick start
//!
//! ```rust
//! use hand_signal::{Smoother, StabilityFilter, SteeringForceModel, Timestamp};
//!
//! let mut steer = Smoother::new(hand_signal::STEERING_WINDOW);
//! let angle = steer.add(18.0);
//!
//! let model = SteeringForceModel::new(60.0, 0.3);
//! let reading = model.evaluate(angle);
//! assert_eq!(reading.force, 0.0);
//!
//! let mut debounce = StabilityFilter::new(0.18);
//! assert!(!debounce.update("steer_r", reading.right, Timestamp::ZERO));
//! ```

pub mod clock;
pub mod landmarks;
pub mod features;
pub mod smoother;
pub mod debounce;
pub mod steering;

pub use clock::{MonotonicClock, Timestamp};
pub use landmarks::{HandRecord, LandmarkError, Point, Side, LANDMARK_COUNT};
pub use features::{distance, finger_margin, FingerFlags, FingerPose, HandFeatures};
pub use smoother::{Smoother, DISTANCE_WINDOW, STEERING_WINDOW};
pub use debounce::{Pending, StabilityFilter, DEFAULT_DELAY, MAX_DELAY, MIN_DELAY};
pub use steering::{
    raw_steering_angle, SteeringForceModel, SteeringPolicy, SteeringReading, VisualSteer,
};
