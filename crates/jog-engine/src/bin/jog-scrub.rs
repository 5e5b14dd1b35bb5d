//! jog-scrub: interactive frame-scrub driver.
//!
//! Reads frame indices from stdin and plays one video frame of audio per
//! line, the way a host timeline would drive the engine.

use std::io::{self, BufRead};
use std::path::PathBuf;

use clap::Parser;

use jog_engine::{Channel, ScrubConfig, ScrubController};

#[derive(Parser)]
#[command(name = "jog-scrub", about = "Frame-synchronous audio scrubbing", version)]
struct Cli {
    /// Audio file to scrub (WAV, FLAC, MP3, OGG)
    file: Option<PathBuf>,

    /// Video frame rate for frame-to-sample math
    #[arg(long, default_value_t = 25.0)]
    fps: f64,

    /// Print an ASCII waveform at this pixel width after loading
    #[arg(long)]
    waveform: Option<usize>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if cli.list_devices {
        for name in jog_audio::output_device_names() {
            println!("{name}");
        }
        return;
    }

    let Some(file) = cli.file else {
        eprintln!("Error: no audio file given (try --help)");
        std::process::exit(2);
    };

    let controller = ScrubController::with_config(ScrubConfig {
        eager_init: true,
        ..ScrubConfig::default()
    });

    if !controller.load_file(&file, cli.fps) {
        eprintln!("Error: could not load {}", file.display());
        std::process::exit(1);
    }

    println!(
        "{}: {} Hz, {} ch, {} frames @ {} fps",
        file.display(),
        controller.sample_rate(),
        controller.channel_count(),
        controller.file_length_in_frames(),
        controller.fps()
    );

    if let Some(width) = cli.waveform {
        controller.generate_waveform(width);
        print_waveform(&controller.waveform_channel(Channel::Left));
    }

    println!("Enter a frame number to scrub, 's' to stop, 'q' to quit.");
    for line in io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        let input = line.trim();
        match input {
            "" => continue,
            "q" => break,
            "s" => controller.stop(),
            _ => match input.parse::<i64>() {
                Ok(frame) => controller.play_at_frame(frame),
                Err(_) => eprintln!("Not a frame number: {input}"),
            },
        }
    }
}

const LEVELS: &[char] = &[' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

fn print_waveform(peaks: &[f32]) {
    let mut line = String::with_capacity(peaks.len() * 3);
    for peak in peaks {
        let idx = ((peak * (LEVELS.len() - 1) as f32).round() as usize).min(LEVELS.len() - 1);
        line.push(LEVELS[idx]);
    }
    println!("{line}");
}
