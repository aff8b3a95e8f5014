//! The press/release capability the arbiter drives.
//!
//! Real injection (OS keyboard, MIDI, serial relay…) lives outside this
//! crate; it only has to implement [`ActuatorSink`].  Both calls are
//! fire-and-forget from the frame loop's point of view: they must not block.

use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The backend is gone (device unplugged, port closed…).
    #[error("actuator sink unavailable: {0}")]
    Unavailable(String),

    /// The backend does not know how to actuate this key.
    #[error("actuator sink cannot map key '{0}'")]
    UnknownKey(String),
}

/// Anything that can press and release a named actuator.
pub trait ActuatorSink {
    fn press(&mut self, key: &str) -> Result<(), SinkError>;
    fn release(&mut self, key: &str) -> Result<(), SinkError>;
}

impl<S: ActuatorSink + ?Sized> ActuatorSink for Box<S> {
    fn press(&mut self, key: &str) -> Result<(), SinkError> { (**self).press(key) }
    fn release(&mut self, key: &str) -> Result<(), SinkError> { (**self).release(key) }
}

// ── null backend ──────────────────────────────────────────────────────────

/// Accepts everything, does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl ActuatorSink for NullSink {
    fn press(&mut self, _key: &str)   -> Result<(), SinkError> { Ok(()) }
    fn release(&mut self, _key: &str) -> Result<(), SinkError> { Ok(()) }
}

// ── recording backend ─────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Press(String),
    Release(String),
}

/// Records every call in order.  Clones share the same log, so a handle can
/// be kept after the sink is moved into an arbiter.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    events:  Arc<Mutex<Vec<SinkEvent>>>,
    failing: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self { Self::default() }

    /// Snapshot of the calls seen so far.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Keys currently down according to the log.
    pub fn down(&self) -> Vec<String> {
        let mut down: Vec<String> = Vec::new();
        for e in self.events() {
            match e {
                SinkEvent::Press(k)   => if !down.contains(&k) { down.push(k) },
                SinkEvent::Release(k) => down.retain(|d| d != &k),
            }
        }
        down
    }

    /// While set, every call fails with [`SinkError::Unavailable`] and is not
    /// recorded.
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut f) = self.failing.lock() { *f = failing; }
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.events.lock() { e.clear(); }
    }

    fn record(&self, event: SinkEvent) -> Result<(), SinkError> {
        if self.failing.lock().map(|f| *f).unwrap_or(false) {
            return Err(SinkError::Unavailable("memory sink set to fail".to_string()));
        }
        if let Ok(mut e) = self.events.lock() { e.push(event); }
        Ok(())
    }
}

impl ActuatorSink for MemorySink {
    fn press(&mut self, key: &str) -> Result<(), SinkError> {
        self.record(SinkEvent::Press(key.to_string()))
    }
    fn release(&mut self, key: &str) -> Result<(), SinkError> {
        self.record(SinkEvent::Release(key.to_string()))
    }
}
