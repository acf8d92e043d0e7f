//! Baryon - audio-reactive particle field
//!
//! Headless driver: runs the frame loop at a fixed rate, logs diagnostics
//! and optionally dumps the particle texture as PNG frames.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use baryon::audio::{list_input_devices, SourceState};
use baryon::cli::Args;
use baryon::compute::{readback, GpuContext, StateKind};
use baryon::params::{Config, RecordingConfig};
use baryon::{Result, Session};

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Baryon stopped");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

fn run(args: &Args) -> Result<()> {
    if args.list_devices {
        for name in list_input_devices()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = args.resolve_config()?;
    let recording = args.create_recording_config()?;

    let ctx = Arc::new(GpuContext::new_blocking()?);
    let mut session = Session::new(Arc::clone(&ctx), &config)?;

    if let Some(path) = &args.file {
        if let Err(e) = session.start(path) {
            tracing::warn!(error = %e, "Continuing without file source");
        }
    }
    if let Some(device) = args.capture_device() {
        if let Err(e) = session.toggle_capture(device) {
            tracing::warn!(error = %e, "Continuing without capture");
        }
    }

    frame_loop(&mut session, &ctx, &config, args, recording.as_ref());

    session.stop();
    let diag = session.diagnostics();
    tracing::info!(
        frames = diag.frame,
        dropped_records = diag.dropped_records,
        "Session finished"
    );
    Ok(())
}

fn frame_loop(
    session: &mut Session,
    ctx: &GpuContext,
    config: &Config,
    args: &Args,
    recording: Option<&RecordingConfig>,
) {
    let interval = Duration::from_secs_f64(config.run.frame_interval_s());
    let total_frames = config.run.total_frames();
    let follow_file = args.file.is_some() && args.capture.is_none();

    let start = Instant::now();
    let mut previous = start;
    let mut last_randomize = 0.0;
    let mut frame: u64 = 0;

    loop {
        let now = Instant::now();
        let elapsed = now.duration_since(start).as_secs_f64();
        let delta = now.duration_since(previous).as_secs_f64();
        previous = now;

        let time = session.tick(elapsed, delta);

        if let Some(every) = args.randomize_every {
            if elapsed - last_randomize >= every as f64 {
                last_randomize = elapsed;
                if let Err(e) = session.randomize_waves() {
                    tracing::warn!(error = %e, "Wave randomization failed");
                }
            }
        }

        let interval_frames = config.run.diagnostics_interval as u64;
        if interval_frames > 0 && frame % interval_frames == 0 {
            let diag = session.diagnostics();
            tracing::info!(
                frame,
                time = time.time,
                dt = time.delta,
                clock = ?time.source,
                sources = ?diag.sources,
                amplitude = diag.average_amplitude,
                dropped_records = diag.dropped_records,
                particles = diag.particle_count,
                "Frame"
            );
        }

        if let Some(rec) = recording {
            if rec.should_dump(frame) {
                dump_frame(session, ctx, rec, frame);
            }
        }

        frame += 1;
        if total_frames.is_some_and(|n| frame >= n as u64) {
            break;
        }
        if follow_file && frame > 1 && session.diagnostics().sources == SourceState::Neither {
            tracing::info!("File finished");
            break;
        }

        if let Some(wait) = interval.checked_sub(now.elapsed()) {
            std::thread::sleep(wait);
        }
    }
}

fn dump_frame(session: &Session, ctx: &GpuContext, rec: &RecordingConfig, frame: u64) {
    let mut targets = vec![(session.output_texture(), rec.frame_path(frame))];
    if rec.all_stages {
        for kind in StateKind::ALL.into_iter().filter(|k| *k != StateKind::Particles) {
            targets.push((session.pipeline().state_texture(kind), rec.stage_path(kind.name(), frame)));
        }
    }

    for (texture, path) in targets {
        if let Err(e) = readback::save_png(ctx, texture, &path) {
            tracing::warn!(error = %e, frame, path = %path, "Frame dump failed");
        }
    }
}
