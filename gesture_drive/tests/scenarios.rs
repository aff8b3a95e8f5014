//! End-to-end runs: synthetic hands through pipeline, controller and arbiter
//! into a recording sink.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use gesture_drive::app::{run_on_channel, run_with_source};
use gesture_drive::source::{
    start_landmark_source, synthetic_hand, ScriptedSource, SourceEvent, SweepSource, FIST, FORWARD,
};
use gesture_drive::{ControlConfig, GestureController, GesturePipeline, SteeringMode};
use hand_signal::{HandRecord, Point, Side, Timestamp};
use key_arbiter::{MemorySink, SinkEvent};

fn ms(n: u64) -> Timestamp { Timestamp::from_millis(n) }

fn pair(left_y: f32, right_y: f32) -> Vec<HandRecord> {
    vec![
        synthetic_hand(Side::Left, Point::new(0.3, left_y), FIST),
        synthetic_hand(Side::Right, Point::new(0.7, right_y), FIST),
    ]
}

/// Largest number of keys simultaneously down according to the log.
fn peak_down(events: &[SinkEvent]) -> usize {
    let mut down: Vec<&str> = Vec::new();
    let mut peak = 0;
    for e in events {
        match e {
            SinkEvent::Press(k) => {
                if !down.contains(&k.as_str()) {
                    down.push(k);
                }
            }
            SinkEvent::Release(k) => down.retain(|d| *d != k.as_str()),
        }
        peak = peak.max(down.len());
    }
    peak
}

fn frame_clock(step_ms: u64) -> impl FnMut() -> Timestamp {
    let mut n = 0u64;
    move || {
        let t = ms(n * step_ms);
        n += 1;
        t
    }
}

#[test]
fn two_hand_steering_scenario() {
    let mut cfg = ControlConfig {
        stability_mode: false,
        steering_mode:  SteeringMode::ProgressiveForce,
        ..Default::default()
    };
    // dy 0.125 × 144 = 18 exactly, so the boundary is not blurred by rounding.
    cfg.thresholds.steering_dy_scale = 144.0;

    let mut level = GesturePipeline::new(&cfg);
    let s = level.process(&pair(0.75, 0.75), ms(0));
    assert_eq!(s.steering_angle, 0.0);
    assert_eq!(s.steering_force, 0.0);

    let mut tilted = GesturePipeline::new(&cfg);
    let s = tilted.process(&pair(0.75, 0.625), ms(0));
    assert_eq!(s.steering_angle, 18.0);
    assert!((s.steering_normalized - 0.3).abs() < 1e-6);
    assert_eq!(s.steering_force, 0.0);
    assert!(!s.steer_left && !s.steer_right);
}

#[test]
fn tenth_tilt_at_default_scale_sits_on_dead_zone_edge() {
    let cfg = ControlConfig {
        stability_mode: false,
        steering_mode:  SteeringMode::ProgressiveForce,
        ..Default::default()
    };
    assert_eq!(cfg.thresholds.steering_dy_scale, 180.0);

    let mut pipeline = GesturePipeline::new(&cfg);
    let s = pipeline.process(&pair(0.5, 0.4), ms(0));
    assert!((s.steering_angle - 18.0).abs() < 1e-4, "angle {}", s.steering_angle);
    assert!((s.steering_normalized - 0.3).abs() < 1e-5);
    assert_eq!(s.steering_force, 0.0);
    assert!(!s.steer_left && !s.steer_right);
}

#[test]
fn budget_never_exceeded_over_long_sweep() {
    let mut cfg = ControlConfig { max_concurrent: 2, ..Default::default() };
    // Left-hand gestures on too, so more keys compete.
    for (_, on) in cfg.enabled_gestures.iter_mut() {
        *on = true;
    }
    let sink = MemorySink::new();
    let source = SweepSource { frames: Some(900), realtime: false, ..SweepSource::default() };

    let summary = run_with_source(&cfg, source, sink.clone(), frame_clock(33));

    assert_eq!(summary.frames, 900);
    assert!(summary.presses > 0);
    assert!(summary.max_held <= 2);
    assert!(peak_down(&sink.events()) <= 2);
    assert!(sink.down().is_empty(), "keys left down: {:?}", sink.down());
}

#[test]
fn progressive_steering_converges_to_duty() {
    let cfg = ControlConfig {
        stability_mode: false,
        steering_mode:  SteeringMode::ProgressiveForce,
        ..Default::default()
    };
    let mut ctl = GestureController::new(&cfg, MemorySink::new());

    // dy ≈ 0.2167 → angle ≈ 39 → n ≈ 0.65 → force ≈ 0.5.
    let hands = pair(0.75, 0.75 - 39.0 / 180.0);
    let mut on_ticks = 0u32;
    let mut force = 0.0;
    let ticks = 10_000u32;
    for t in 0..ticks {
        let r = ctl.handle_frame(&hands, ms(t as u64));
        force = r.state.steering_force;
        if ctl.arbiter().is_held("d") {
            on_ticks += 1;
        }
    }
    assert!((force - 0.5).abs() < 0.01, "force {force}");

    let expected = 0.10 + 0.90 * force;
    let measured = on_ticks as f32 / ticks as f32;
    assert!((measured - expected).abs() < 0.02, "duty {measured}, expected {expected}");
}

#[test]
fn detector_failure_releases_and_recovers() {
    let cfg = ControlConfig { stability_mode: false, ..Default::default() };
    let forward = vec![synthetic_hand(Side::Right, Point::new(0.7, 0.8), FORWARD)];
    let script = ScriptedSource::new(vec![
        SourceEvent::Frame(forward.clone()),
        SourceEvent::DetectorFailure,
        SourceEvent::Frame(forward),
        SourceEvent::Frame(Vec::new()),
    ]);
    let sink = MemorySink::new();

    let summary = run_with_source(&cfg, script, sink.clone(), frame_clock(33));

    assert_eq!(summary.frames, 3);
    assert_eq!(summary.detector_failures, 1);
    assert_eq!(summary.presses, 2);
    assert_eq!(
        sink.events(),
        vec![
            SinkEvent::Press("w".into()),
            SinkEvent::Release("w".into()),
            SinkEvent::Press("w".into()),
            SinkEvent::Release("w".into()),
        ]
    );
}

#[test]
fn keys_released_when_source_quits_mid_gesture() {
    let cfg = ControlConfig { stability_mode: false, ..Default::default() };
    let forward = vec![synthetic_hand(Side::Right, Point::new(0.7, 0.8), FORWARD)];
    let sink = MemorySink::new();

    let summary = run_with_source(
        &cfg,
        ScriptedSource::new(vec![SourceEvent::Frame(forward)]),
        sink.clone(),
        frame_clock(33),
    );

    assert_eq!(summary.released_at_exit, 1);
    assert!(sink.down().is_empty());
}

#[test]
fn quit_from_outside_ends_unbounded_sweep_cleanly() {
    let cfg = ControlConfig { stability_mode: false, ..Default::default() };
    let sink = MemorySink::new();
    let (tx, rx) = mpsc::channel();
    // No frame limit: only an outside Quit ends this run.
    let source = SweepSource { fps: 200.0, pose_secs: 0.05, ..SweepSource::default() };
    assert_eq!(source.frames, None);
    start_landmark_source(source, tx.clone());

    // Stands in for the Ctrl-C handler: quit as soon as a key is down.
    let watched = sink.clone();
    let interrupt = thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(10);
        while watched.down().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        let _ = tx.send(SourceEvent::Quit);
    });

    let summary = run_on_channel(&cfg, &rx, sink.clone(), frame_clock(5));
    interrupt.join().unwrap();
    drop(rx);

    assert!(summary.presses > 0);
    assert!(sink.down().is_empty(), "keys left down: {:?}", sink.down());
}

#[test]
fn config_snapshot_round_trips_through_file() {
    let dir = std::env::temp_dir().join(format!("gesture_drive_it_{}", std::process::id()));
    let path = dir.join("controls.json");

    let mut cfg = ControlConfig::default();
    cfg.apply_profile("racing".parse().unwrap());
    cfg.keybindings.insert(gesture_drive::Gesture::SteerLeft, "left".to_string());
    cfg.save(&path).unwrap();

    let loaded = ControlConfig::load(&path).unwrap();
    assert_eq!(loaded, cfg);

    let mut ctl = GestureController::new(&loaded, MemorySink::new());
    assert_eq!(ctl.arbiter().max_concurrent(), 4);
    assert_eq!(ctl.update_config(&ControlConfig { max_concurrent: 2, ..loaded }), 0);
    assert_eq!(ctl.arbiter().max_concurrent(), 2);

    let _ = std::fs::remove_dir_all(&dir);
}
