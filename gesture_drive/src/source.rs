//! Landmark sources.
//!
//! The public interface is [`SourceEvent`] delivered over a `mpsc` channel.
//! The consumer never needs to know whether frames come from a camera
//! detector, the synthetic sweep, or a script.

use std::f32::consts::TAU;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use hand_signal::{FingerFlags, HandRecord, Point, Side, LANDMARK_COUNT};
use tracing::{debug, info};

// ════════════════════════════════════════════════════════════════════════════
// SourceEvent
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum SourceEvent {
    /// Every hand the detector found in one camera frame (possibly none).
    Frame(Vec<HandRecord>),
    /// The detector threw and was re-initialized; downstream state is stale.
    DetectorFailure,
    /// The source is done.
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSource trait
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`SourceEvent`]s over a channel.
pub trait LandmarkSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<SourceEvent>);
}

/// Spawn a source on its own thread and return the receiving end.
pub fn spawn_landmark_source<L: LandmarkSource>(source: L) -> Receiver<SourceEvent> {
    let (tx, rx) = mpsc::channel();
    start_landmark_source(source, tx);
    rx
}

/// Spawn a source that sends into an existing channel, so other senders
/// (an interrupt handler, a test) can share it.
pub fn start_landmark_source<L: LandmarkSource>(source: L, tx: Sender<SourceEvent>) {
    thread::spawn(move || Box::new(source).run(tx));
}

// ════════════════════════════════════════════════════════════════════════════
// Synthetic hand geometry
// ════════════════════════════════════════════════════════════════════════════

// Offsets from the wrist for an upright right hand; the left hand mirrors x.
const FINGER_DX:      [f32; 4] = [-0.09, -0.03, 0.03, 0.09];
const MCP_DY:         f32 = -0.20;
const TIP_OUT_DY:     f32 = -0.45;
const TIP_CURLED_DY:  f32 = -0.12;
const THUMB_MCP:      (f32, f32) = (-0.12, -0.12);
const THUMB_OUT:      (f32, f32) = (-0.25, -0.20);
const THUMB_CURLED:   (f32, f32) = ( 0.05, -0.18);

/// A plausible 21-point hand at `wrist` with the given fingers extended.
/// The palm centroid sits straight above the wrist, so palm distance between
/// two synthetic hands equals their horizontal wrist gap.
pub fn synthetic_hand(side: Side, wrist: Point, fingers: FingerFlags) -> HandRecord {
    let sx = match side { Side::Right => 1.0, Side::Left => -1.0 };
    let at = |(dx, dy): (f32, f32)| Point::new(wrist.x + sx * dx, wrist.y + dy);
    let lerp = |a: Point, b: Point, t: f32| Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t);

    let mut pts = vec![wrist; LANDMARK_COUNT];

    let thumb_mcp = at(THUMB_MCP);
    let thumb_tip = at(if fingers.thumb { THUMB_OUT } else { THUMB_CURLED });
    pts[1] = lerp(wrist, thumb_mcp, 0.5);
    pts[2] = thumb_mcp;
    pts[3] = lerp(thumb_mcp, thumb_tip, 0.5);
    pts[4] = thumb_tip;

    let extended = [fingers.index, fingers.middle, fingers.ring, fingers.pinky];
    for (f, (&dx, &out)) in FINGER_DX.iter().zip(extended.iter()).enumerate() {
        let base = 5 + 4 * f;
        let mcp = at((dx, MCP_DY));
        let tip = at((dx, if out { TIP_OUT_DY } else { TIP_CURLED_DY }));
        pts[base]     = mcp;
        pts[base + 1] = lerp(mcp, tip, 1.0 / 3.0);
        pts[base + 2] = lerp(mcp, tip, 2.0 / 3.0);
        pts[base + 3] = tip;
    }
    HandRecord::new(side, pts)
}

pub const FIST: FingerFlags = FingerFlags { thumb: false, index: false, middle: false, ring: false, pinky: false };
pub const FORWARD: FingerFlags = FingerFlags { thumb: false, index: true, middle: true, ring: false, pinky: false };
pub const BACKWARD: FingerFlags = FingerFlags { thumb: true, index: false, middle: false, ring: false, pinky: false };

// ════════════════════════════════════════════════════════════════════════════
// SweepSource: synthetic demo input
// ════════════════════════════════════════════════════════════════════════════

/// Two hands tilting through a sine sweep while the right hand cycles
/// through fist, forward and backward, and the hands briefly come together.
#[derive(Clone, Debug)]
pub struct SweepSource {
    pub fps:        f32,
    /// Stop after this many frames; `None` runs until the receiver hangs up.
    pub frames:     Option<u64>,
    /// Seconds per full left-right-left tilt.
    pub period:     f32,
    /// Peak vertical wrist offset (normalized units).
    pub amplitude:  f32,
    /// Seconds spent in each pose of the cycle.
    pub pose_secs:  f32,
    /// Sleep between frames; off for tests.
    pub realtime:   bool,
}

impl Default for SweepSource {
    fn default() -> Self {
        SweepSource {
            fps:       30.0,
            frames:    None,
            period:    6.0,
            amplitude: 0.3,
            pose_secs: 2.0,
            realtime:  true,
        }
    }
}

impl SweepSource {
    /// Hands for frame `i`.
    pub fn frame(&self, i: u64) -> Vec<HandRecord> {
        let t = i as f32 / self.fps.max(1.0);
        let tilt = (TAU * t / self.period.max(0.1)).sin() * self.amplitude;
        let phase = (t / self.pose_secs.max(0.1)) as u64 % 4;

        let (right_pose, gap) = match phase {
            1 => (FORWARD, 0.4),
            2 => (BACKWARD, 0.4),
            3 => (FIST, 0.06),
            _ => (FIST, 0.4),
        };
        // tilt > 0 raises the right wrist.
        vec![
            synthetic_hand(Side::Left, Point::new(0.5 - gap / 2.0, 0.7 + tilt / 2.0), FIST),
            synthetic_hand(Side::Right, Point::new(0.5 + gap / 2.0, 0.7 - tilt / 2.0), right_pose),
        ]
    }
}

impl LandmarkSource for SweepSource {
    fn run(self: Box<Self>, tx: Sender<SourceEvent>) {
        let interval = Duration::from_secs_f32(1.0 / self.fps.max(1.0));
        info!(fps = self.fps, frames = ?self.frames, "sweep source started");
        let mut i = 0u64;
        while self.frames.map_or(true, |n| i < n) {
            if tx.send(SourceEvent::Frame(self.frame(i))).is_err() {
                debug!("sweep source: receiver gone");
                return;
            }
            i += 1;
            if self.realtime {
                thread::sleep(interval);
            }
        }
        let _ = tx.send(SourceEvent::Quit);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ScriptedSource: fixed event list
// ════════════════════════════════════════════════════════════════════════════

/// Replays `events` in order, then sends [`SourceEvent::Quit`] unless the
/// script already ended with one.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSource {
    pub events:   Vec<SourceEvent>,
    pub interval: Duration,
}

impl ScriptedSource {
    pub fn new(events: Vec<SourceEvent>) -> Self {
        ScriptedSource { events, interval: Duration::ZERO }
    }
}

impl LandmarkSource for ScriptedSource {
    fn run(self: Box<Self>, tx: Sender<SourceEvent>) {
        for event in self.events {
            let quit = event == SourceEvent::Quit;
            if tx.send(event).is_err() || quit {
                return;
            }
            if !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
        }
        let _ = tx.send(SourceEvent::Quit);
    }
}
