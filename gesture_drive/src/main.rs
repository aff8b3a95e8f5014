//! gesture_drive: command-line entry point.

use gesture_drive::app::{init_tracing, run, AppConfig, AppError};

fn main() {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        Gesture Drive — hand-pose to keyboard controller      ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    #[cfg(feature = "midi")]
    println!("  Output: MIDI available (--midi)");
    #[cfg(not(feature = "midi"))]
    println!("  Output: key log  (use --features midi for MIDI output)");
    println!("  Input:  synthetic two-hand sweep (Ctrl-C to stop)");
    println!();

    if let Err(e) = init_tracing() {
        eprintln!("Warning: {}", e);
    }

    let cfg = match AppConfig::from_args(std::env::args().skip(1)) {
        Ok(cfg) => cfg,
        Err(AppError::Usage(msg)) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if cfg.dump_config {
        match cfg.control.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    println!(
        "  Budget {} keys, debounce {:.0} ms, {} steering",
        cfg.control.max_concurrent,
        cfg.control.thresholds.stability_delay * 1000.0,
        if cfg.control.steering_policy().is_graded() { "progressive" } else { "threshold" },
    );
    println!();

    match run(cfg) {
        Ok(summary) => {
            println!();
            println!(
                "  {} frames, {} presses, {} refused, peak {} keys held",
                summary.frames, summary.presses, summary.refused, summary.max_held
            );
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
