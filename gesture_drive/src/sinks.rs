//! Concrete actuator sinks for the host binary.
//!
//! OS-level key injection is platform glue outside this workspace; these
//! sinks make the arbiter's output observable instead.
//!
//! * [`LogSink`] traces every press/release.
//! * `MidiSink` (feature `midi`) sounds one note per held key, so duty
//!   cycles can be heard as rhythmic pulses.

use std::collections::HashMap;

use key_arbiter::{ActuatorSink, SinkError};
use tracing::info;

// ── log backend ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default)]
pub struct LogSink {
    presses:  u64,
    releases: u64,
}

impl LogSink {
    pub fn new() -> Self { Self::default() }

    pub fn presses(&self)  -> u64 { self.presses }
    pub fn releases(&self) -> u64 { self.releases }
}

impl ActuatorSink for LogSink {
    fn press(&mut self, key: &str) -> Result<(), SinkError> {
        self.presses += 1;
        info!(target: "gesture_drive::keys", key, "press");
        Ok(())
    }

    fn release(&mut self, key: &str) -> Result<(), SinkError> {
        self.releases += 1;
        info!(target: "gesture_drive::keys", key, "release");
        Ok(())
    }
}

// ── key → note mapping ────────────────────────────────────────────────────

/// Lowest note handed out.
pub const BASE_NOTE: u8 = 60;

/// Assigns each distinct key name a MIDI note, first come first served,
/// starting at middle C.  Names are compared trimmed and case-folded.
#[derive(Clone, Debug, Default)]
pub struct KeyNoteMap {
    notes: HashMap<String, u8>,
}

impl KeyNoteMap {
    pub fn new() -> Self { Self::default() }

    /// Pre-assign notes in the given order.
    pub fn with_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let mut map = Self::new();
        for k in keys {
            let _ = map.note_for(k);
        }
        map
    }

    pub fn note_for(&mut self, key: &str) -> Result<u8, SinkError> {
        let name = key.trim().to_lowercase();
        if name.is_empty() {
            return Err(SinkError::UnknownKey(key.to_string()));
        }
        if let Some(n) = self.notes.get(&name) {
            return Ok(*n);
        }
        let next = BASE_NOTE as usize + self.notes.len();
        let note = u8::try_from(next)
            .ok()
            .filter(|n| *n <= 127)
            .ok_or_else(|| SinkError::UnknownKey(key.to_string()))?;
        self.notes.insert(name, note);
        Ok(note)
    }

    pub fn len(&self)      -> usize { self.notes.len() }
    pub fn is_empty(&self) -> bool  { self.notes.is_empty() }
}

// ── midir backend ─────────────────────────────────────────────────────────

#[cfg(feature = "midi")]
pub use midi::MidiSink;

#[cfg(feature = "midi")]
mod midi {
    use super::KeyNoteMap;
    use key_arbiter::{ActuatorSink, SinkError};
    use tracing::{info, warn};

    const VELOCITY: u8 = 100;

    pub struct MidiSink {
        conn:    midir::MidiOutputConnection,
        channel: u8,
        notes:   KeyNoteMap,
    }

    impl MidiSink {
        /// Open the first MIDI output port, preferring a soft synth if one is
        /// visible.
        pub fn open(notes: KeyNoteMap, channel: u8) -> Result<Self, SinkError> {
            let out = midir::MidiOutput::new("gesture_drive")
                .map_err(|e| SinkError::Unavailable(format!("MIDI init: {e}")))?;

            let ports = out.ports();
            if ports.is_empty() {
                warn!("no MIDI output ports found (try `timidity -iA` or `fluidsynth` on Linux)");
                return Err(SinkError::Unavailable("no MIDI output ports".to_string()));
            }

            let idx = ports.iter()
                .position(|p| {
                    out.port_name(p).map(|n| {
                        let n = n.to_lowercase();
                        n.contains("fluid") || n.contains("timidity") || n.contains("synth")
                    }).unwrap_or(false)
                })
                .unwrap_or(0);

            let port = &ports[idx];
            let name = out.port_name(port).unwrap_or_else(|_| "Unknown".to_string());
            info!(port = %name, "opening MIDI port");

            let conn = out.connect(port, "gesture-keys")
                .map_err(|e| SinkError::Unavailable(format!("MIDI connect: {e}")))?;
            Ok(MidiSink { conn, channel: channel & 0x0F, notes })
        }

        fn send(&mut self, msg: &[u8]) -> Result<(), SinkError> {
            self.conn.send(msg).map_err(|e| SinkError::Unavailable(e.to_string()))
        }
    }

    impl ActuatorSink for MidiSink {
        fn press(&mut self, key: &str) -> Result<(), SinkError> {
            let note = self.notes.note_for(key)?;
            self.send(&[0x90 | self.channel, note, VELOCITY])
        }

        fn release(&mut self, key: &str) -> Result<(), SinkError> {
            let note = self.notes.note_for(key)?;
            self.send(&[0x80 | self.channel, note, 0])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notes_assigned_in_order() {
        let mut m = KeyNoteMap::with_keys(["a", "d", "space"]);
        assert_eq!(m.note_for("a"), Ok(60));
        assert_eq!(m.note_for(" SPACE "), Ok(62));
        assert_eq!(m.note_for("w"), Ok(63));
        assert_eq!(m.len(), 4);
    }

    #[test]
    fn empty_key_rejected() {
        let mut m = KeyNoteMap::new();
        assert!(matches!(m.note_for("  "), Err(SinkError::UnknownKey(_))));
        assert!(m.is_empty());
    }

    #[test]
    fn note_range_exhausts() {
        let mut m = KeyNoteMap::new();
        for i in 0..68 {
            assert!(m.note_for(&format!("k{i}")).is_ok());
        }
        assert!(m.note_for("one-too-many").is_err());
    }

    #[test]
    fn log_sink_counts() {
        let mut s = LogSink::new();
        s.press("w").unwrap();
        s.release("w").unwrap();
        s.release("a").unwrap();
        assert_eq!((s.presses(), s.releases()), (1, 2));
    }
}
