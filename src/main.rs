use pulselab::analysis::{Recording, TimeNormalized};
use pulselab::layout::{ChannelKind, Slot};
use pulselab::statuslog::StatusLog;
use std::path::Path;
use std::process::ExitCode;

/// Headless inspection of a finished recording directory: prints the
/// per-participant statistics and the event overlays a chart front-end
/// would render.
fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(dir) = std::env::args().nth(1) else {
        eprintln!("usage: pulselab <recording-dir>");
        return ExitCode::from(2);
    };
    inspect(Path::new(&dir))
}

fn inspect(dir: &Path) -> ExitCode {
    let notices = StatusLog::new();
    let recording = Recording::load(dir, &notices);
    let normalized = match TimeNormalized::build(&recording) {
        Ok(normalized) => normalized,
        Err(e) => {
            eprintln!("{}: {}", dir.display(), e);
            return ExitCode::FAILURE;
        }
    };

    for slot in Slot::ALL {
        let mut printed_header = false;
        for channel in ChannelKind::ALL {
            let Some(stats) = normalized.stats(slot, channel) else {
                continue;
            };
            if !printed_header {
                println!("{}", slot.dir_name());
                printed_header = true;
            }
            println!("  {}:", channel.title());
            println!("    Min: {} {}", stats.min, channel.unit());
            println!("    Max: {} {}", stats.max, channel.unit());
            println!("    Avg: {} {}", stats.mean, channel.unit());
        }
    }

    let markers = normalized.markers();
    for at in &markers.points {
        println!("mark @ {:.1}s", at);
    }
    for window in &markers.intervals {
        println!(
            "interval {} @ {:.1}s..{:.1}s",
            window.color_index + 1,
            window.start_s,
            window.end_s
        );
    }

    for error in recording.load_errors() {
        eprintln!("warning: {}", error);
    }

    ExitCode::SUCCESS
}
