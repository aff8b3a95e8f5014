//! Host loop: landmark source thread → controller → actuator sink.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};

use hand_signal::{MonotonicClock, Timestamp};
use key_arbiter::{ActuatorSink, SinkError};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ControlConfig, Profile, SteeringMode};
use crate::controller::GestureController;
use crate::gesture::Gesture;
use crate::sinks::LogSink;
use crate::source::{spawn_landmark_source, start_landmark_source, LandmarkSource, SourceEvent, SweepSource};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("{0}")]
    Usage(String),

    #[error("tracing init failed: {0}")]
    Tracing(String),
}

/// Install the global `tracing` subscriber.  `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_tracing() -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Tracing(e.to_string()))
}

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub control:     ControlConfig,
    /// Synthetic source frame rate.
    pub fps:         f32,
    /// Stop after this many frames; `None` runs until Ctrl-C.
    pub frames:      Option<u64>,
    /// Drive a MIDI port instead of the log sink (needs feature `midi`).
    pub midi:        bool,
    /// Print the effective configuration as JSON and exit.
    pub dump_config: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            control:     ControlConfig::default(),
            fps:         30.0,
            frames:      None,
            midi:        false,
            dump_config: false,
        }
    }
}

pub const USAGE: &str = "\
usage: gesture_drive [options]
  --config <file>        load a JSON configuration snapshot
  --profile <name>       racing | action | casual
  --frames <n>           stop after n frames
  --fps <n>              synthetic source frame rate (default 30)
  --progressive          graded (PWM) steering
  --threshold-steering   plain threshold steering (default)
  --midi                 send keys to a MIDI port
  --dump-config          print the effective configuration and exit";

impl AppConfig {
    /// Parse command-line arguments (without the program name).  The config
    /// file is applied first, then the profile, then individual flags.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, AppError> {
        let mut cfg = AppConfig::default();
        let mut config_path: Option<PathBuf> = None;
        let mut profile: Option<Profile> = None;
        let mut mode: Option<SteeringMode> = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config"  => config_path = Some(PathBuf::from(value(&mut args, &arg)?)),
                "--profile" => profile = Some(value(&mut args, &arg)?.parse()?),
                "--frames"  => cfg.frames = Some(number(&mut args, &arg)?),
                "--fps"     => {
                    let fps: f32 = number(&mut args, &arg)?;
                    if !(fps.is_finite() && fps > 0.0) {
                        return Err(AppError::Usage(format!("--fps must be positive, got {fps}")));
                    }
                    cfg.fps = fps;
                }
                "--progressive"        => mode = Some(SteeringMode::ProgressiveForce),
                "--threshold-steering" => mode = Some(SteeringMode::Threshold),
                "--midi"               => cfg.midi = true,
                "--dump-config"        => cfg.dump_config = true,
                other => return Err(AppError::Usage(format!("unknown option '{other}'\n{USAGE}"))),
            }
        }

        if let Some(path) = config_path {
            cfg.control = ControlConfig::load(path)?;
        }
        if let Some(p) = profile {
            cfg.control.apply_profile(p);
        }
        if let Some(m) = mode {
            cfg.control.steering_mode = m;
        }
        cfg.control = cfg.control.clamped();
        Ok(cfg)
    }
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, AppError> {
    args.next().ok_or_else(|| AppError::Usage(format!("{flag} needs a value")))
}

fn number<T: std::str::FromStr>(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<T, AppError> {
    let v = value(args, flag)?;
    v.trim().parse().map_err(|_| AppError::Usage(format!("{flag}: '{v}' is not a number")))
}

// ════════════════════════════════════════════════════════════════════════════
// RunSummary
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames:            u64,
    pub presses:           u64,
    pub releases:          u64,
    pub refused:           u64,
    pub detector_failures: u64,
    /// Most keys ever held at once.
    pub max_held:          usize,
    /// Keys still held when the loop ended, released on the way out.
    pub released_at_exit:  usize,
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the main loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the synthetic sweep through the controller until the source quits or
/// the user presses Ctrl-C.
pub fn run(cfg: AppConfig) -> Result<RunSummary, AppError> {
    let source = SweepSource { fps: cfg.fps, frames: cfg.frames, ..SweepSource::default() };
    let sink = open_sink(&cfg)?;
    let clock = MonotonicClock::new();

    let (tx, rx) = mpsc::channel();
    quit_on_interrupt(tx.clone());
    start_landmark_source(source, tx);
    Ok(run_on_channel(&cfg.control, &rx, sink, || clock.now()))
}

/// Ctrl-C becomes a `Quit` event, so the loop still ends through
/// [`GestureController::stop`].  After the run has ended an interrupt exits
/// the process directly.
fn quit_on_interrupt(tx: Sender<SourceEvent>) {
    let installed = ctrlc::set_handler(move || {
        if tx.send(SourceEvent::Quit).is_err() {
            std::process::exit(130);
        }
    });
    if let Err(e) = installed {
        warn!(error = %e, "no Ctrl-C handler; interrupting may leave keys down");
    }
}

/// Spawn `source`, feed every event through a fresh controller, and release
/// everything once the source ends.
pub fn run_with_source<L, S, C>(control: &ControlConfig, source: L, sink: S, clock: C) -> RunSummary
where
    L: LandmarkSource,
    S: ActuatorSink,
    C: FnMut() -> Timestamp,
{
    let rx = spawn_landmark_source(source);
    run_on_channel(control, &rx, sink, clock)
}

/// Drive a fresh controller from an already wired channel.  Any sender may
/// end the run with [`SourceEvent::Quit`].
pub fn run_on_channel<S, C>(
    control: &ControlConfig,
    rx: &Receiver<SourceEvent>,
    sink: S,
    clock: C,
) -> RunSummary
where
    S: ActuatorSink,
    C: FnMut() -> Timestamp,
{
    let mut controller = GestureController::new(control, sink);
    info!(
        budget = controller.arbiter().max_concurrent(),
        graded = controller.pipeline().policy().is_graded(),
        "controller started"
    );
    let summary = drive_loop(rx, &mut controller, clock);
    info!(frames = summary.frames, presses = summary.presses, "controller stopped");
    summary
}

/// Consume events until `Quit` or the sender hangs up.  Held keys are
/// released before returning.
pub fn drive_loop<S, C>(
    rx: &Receiver<SourceEvent>,
    controller: &mut GestureController<S>,
    mut clock: C,
) -> RunSummary
where
    S: ActuatorSink,
    C: FnMut() -> Timestamp,
{
    let mut summary = RunSummary::default();
    let mut last_active: Vec<&'static str> = Vec::new();

    for event in rx.iter() {
        match event {
            SourceEvent::Frame(hands) => {
                let report = controller.handle_frame(&hands, clock());
                summary.frames   += 1;
                summary.presses  += report.pressed.len() as u64;
                summary.releases += report.released.len() as u64;
                summary.refused  += report.refused.len() as u64;
                summary.max_held  = summary.max_held.max(report.held.len());

                if report.state.active != last_active {
                    let shown = if report.state.active.is_empty() {
                        "none".to_string()
                    } else {
                        report.state.active.join(" | ")
                    };
                    info!(
                        gestures = %shown,
                        keys = %report.held.join(" + "),
                        angle = report.state.steering_angle,
                        "gestures changed"
                    );
                    last_active = report.state.active.clone();
                }
            }
            SourceEvent::DetectorFailure => {
                summary.detector_failures += 1;
                let released = controller.detector_failed();
                warn!(released, "detector failed; state reset");
                last_active.clear();
            }
            SourceEvent::Quit => break,
        }
    }

    summary.released_at_exit = controller.stop();
    summary
}

fn open_sink(cfg: &AppConfig) -> Result<Box<dyn ActuatorSink>, AppError> {
    let bound: Vec<&str> = Gesture::ALL.iter().filter_map(|g| cfg.control.binding(*g)).collect();
    if cfg.midi {
        if let Some(sink) = open_midi(&bound)? {
            return Ok(sink);
        }
    }
    info!(keys = %bound.join(", "), "logging key output");
    Ok(Box::new(LogSink::new()))
}

#[cfg(feature = "midi")]
fn open_midi(keys: &[&str]) -> Result<Option<Box<dyn ActuatorSink>>, AppError> {
    let notes = crate::sinks::KeyNoteMap::with_keys(keys.iter().copied());
    Ok(Some(Box::new(crate::sinks::MidiSink::open(notes, 0)?)))
}

#[cfg(not(feature = "midi"))]
fn open_midi(_keys: &[&str]) -> Result<Option<Box<dyn ActuatorSink>>, AppError> {
    warn!("built without the `midi` feature; logging keys instead");
    Ok(None)
}
