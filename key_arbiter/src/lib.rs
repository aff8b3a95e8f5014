//! # key_arbiter
//!
//! Owns every held actuator (key) and enforces the concurrency budget.
//!
//! * **Direct mode**: [`ActuatorArbiter::press`] / [`ActuatorArbiter::release`]:
//!   idempotent acquire, refused without side effects when the budget is full.
//! * **Graded mode**: [`ActuatorArbiter::drive`]: emulates an analog force
//!   with a per-key on/off duty cycle, using nothing but press and release.
//! * **Cleanup**: [`ActuatorArbiter::release_all`], also run on drop, so no
//!   key is ever left stuck down.
//!
//! The arbiter never reads a clock; graded calls take the frame's
//! [`Timestamp`](hand_signal::Timestamp).
//!
//! ```rust
//! use key_arbiter::{ActuatorArbiter, MemorySink};
//! use hand_signal::Timestamp;
//!
//! let mut arb = ActuatorArbiter::new(MemorySink::new(), 2);
//! assert_eq!(arb.press("w"), Ok(true));
//! assert_eq!(arb.press("space"), Ok(true));
//! assert_eq!(arb.press("a"), Ok(false));      // budget full
//! assert!(arb.drive("d", 0.97, Timestamp::ZERO) == false);
//! arb.release_all();
//! assert_eq!(arb.count_held(), 0);
//! ```

pub mod sink;
pub mod pwm;
pub mod arbiter;

pub use sink::{ActuatorSink, MemorySink, NullSink, SinkError, SinkEvent};
pub use pwm::{PwmChannel, PwmSettings};
pub use arbiter::{ActuatorArbiter, DriveOutcome, ShrinkPolicy, MAX_BUDGET, MIN_BUDGET};
