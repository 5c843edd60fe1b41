//! CLI entry point for frame_sync.
//!
//! Provides a `demo` subcommand that records simulated camera frames against
//! a simulated acquisition sample clock, exercising the full pipeline:
//! capture thread -> frame queue -> writer thread, with block anchors
//! supplied by a separate acquisition thread.
//!
//! # Usage
//!
//! ```bash
//! frame_sync demo --seconds 3 --fps 30
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use frame_sync::capabilities::{Clock, FixedPathProvider, SystemClock};
use frame_sync::config::Settings;
use frame_sync::frame::Frame;
use frame_sync::logging;
use frame_sync::pipeline::FramePipeline;
use rand::Rng;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "frame_sync")]
#[command(about = "Camera frame recording aligned to an acquisition sample clock", long_about = None)]
struct Cli {
    /// Configuration name under config/ (without extension)
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record simulated frames against a simulated acquisition clock
    Demo {
        /// Output parent directory (defaults to the configured base path)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Recording duration in seconds
        #[arg(long, default_value = "3")]
        seconds: u64,

        /// Simulated camera frame rate
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Simulated acquisition sample rate in Hz
        #[arg(long, default_value = "30000")]
        sample_rate: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match cli.config.as_deref() {
        Some(name) => Settings::new(Some(name))
            .with_context(|| format!("failed to load config '{name}'"))?,
        None => Settings::new(None).unwrap_or_default(),
    };
    logging::init(&settings)?;

    match cli.command {
        Commands::Demo {
            output,
            seconds,
            fps,
            sample_rate,
        } => run_demo(settings, output, seconds, fps, sample_rate),
    }
}

fn run_demo(
    settings: Settings,
    output: Option<PathBuf>,
    seconds: u64,
    fps: u32,
    sample_rate: u32,
) -> Result<()> {
    let parent = output
        .unwrap_or_else(|| PathBuf::from(&settings.recording.base_path))
        .join(format!(
            "demo_{}",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ));

    let clock = Arc::new(SystemClock::new());
    let pipeline = Arc::new(FramePipeline::new(
        &settings,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(FixedPathProvider::new(&parent)),
    )?);

    pipeline.start_recording(1, 1, true)?;
    tracing::info!(parent = %parent.display(), seconds, fps, sample_rate, "Demo recording started");

    let running = Arc::new(AtomicBool::new(true));

    // Acquisition thread: one anchor per 20 ms processing block.
    let block_ms: u64 = 20;
    let samples_per_block = i64::from(sample_rate) * block_ms as i64 / 1000;
    let acquisition = {
        let pipeline = Arc::clone(&pipeline);
        let clock = Arc::clone(&clock);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut sample_number: i64 = 0;
            while running.load(Ordering::Acquire) {
                pipeline.on_block_processed(sample_number, clock.now_ms());
                sample_number += samples_per_block;
                thread::sleep(Duration::from_millis(block_ms));
            }
        })
    };

    // Capture thread: synthetic frames at the requested rate.
    let frame_interval = Duration::from_millis(1000 / u64::from(fps.max(1)));
    let capture = {
        let pipeline = Arc::clone(&pipeline);
        let clock = Arc::clone(&clock);
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut frame_number: u32 = 0;
            while running.load(Ordering::Acquire) {
                let frame = synthetic_frame(320, 240, frame_number, &mut rng);
                pipeline.on_frame_received(frame, clock.now_ms());
                frame_number = frame_number.wrapping_add(1);
                thread::sleep(frame_interval);
            }
        })
    };

    thread::sleep(Duration::from_secs(seconds));
    running.store(false, Ordering::Release);
    let _ = acquisition.join();
    let _ = capture.join();

    // Let the writer catch up on the tail of the queue.
    thread::sleep(Duration::from_millis(200));
    pipeline.stop_recording();

    println!(
        "Recorded {} of {} captured frames under {}",
        pipeline.written_frame_count(),
        pipeline.frames_received(),
        parent.display()
    );

    pipeline.shutdown();
    Ok(())
}

/// Gradient test pattern with a little noise, shifted per frame.
fn synthetic_frame<R: Rng>(width: u32, height: u32, frame_number: u32, rng: &mut R) -> Frame {
    let mut data = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let base = ((x + y + frame_number) % 256) as u8;
            let noise: u8 = rng.gen_range(0..16);
            data.push(base.saturating_add(noise));
        }
    }
    Frame::gray(width, height, data)
}
