//! Fixed-window moving average.
//!
//! One instance per continuous signal.  The steering window is 2.4× the
//! distance window: distance must react quickly to a clap, while the wrist
//! tilt needs more damping against hand tremor.

use std::collections::VecDeque;

/// Samples averaged for the steering angle.
pub const STEERING_WINDOW: usize = 12;
/// Samples averaged for the inter-palm distance.
pub const DISTANCE_WINDOW: usize = 5;

#[derive(Clone, Debug)]
pub struct Smoother {
    samples: VecDeque<f32>,
    window:  usize,
}

impl Smoother {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Smoother { samples: VecDeque::with_capacity(window), window }
    }

    /// Append `value`, evicting the oldest sample at capacity, and return the
    /// mean of the current window.
    pub fn add(&mut self, value: f32) -> f32 {
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
        self.mean()
    }

    /// Mean of the held samples, `None` when empty.
    pub fn value(&self) -> Option<f32> {
        if self.samples.is_empty() { None } else { Some(self.mean()) }
    }

    pub fn reset(&mut self) { self.samples.clear(); }

    pub fn len(&self)      -> usize { self.samples.len() }
    pub fn is_empty(&self) -> bool  { self.samples.is_empty() }
    pub fn window(&self)   -> usize { self.window }

    fn mean(&self) -> f32 {
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }
}
