mod audio;
mod cli;
mod config;
mod encode;
mod player;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use audio::graph::GraphConfig;
use cli::Cli;
use encode::ffmpeg::{self, FfmpegEncoder, VideoSettings};
use encode::snapshots::{SnapshotDump, SnapshotRecord};
use player::state::{format_time, PlaybackState, PlayerEvent, PlayerState};
use player::Player;
use render::surface::LayoutSize;
use render::text::TextOverlay;

/// Scripted pause window on the output timeline.
#[derive(Clone, Copy, PartialEq)]
enum PauseScript {
    Pending,
    Paused,
    Done,
}

struct Overlays {
    text: TextOverlay,
    labels: bool,
    show_time: bool,
    margin: i32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Explicit --config path, or auto-detect dualband.toml / global config
    let config_path = cli.config.clone().or_else(config::discover_config);
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.width == 768 { cli.width = cfg.output.width; }
            if cli.height == 320 { cli.height = cfg.output.height; }
            if cli.fps == 60 { cli.fps = cfg.output.fps; }
            if cli.crf == 18 { cli.crf = cfg.output.crf; }
            if cli.codec == "libx264" { cli.codec = cfg.output.codec; }
            if cli.cutoff == 2000.0 { cli.cutoff = cfg.analysis.cutoff_hz; }
            if cli.q == 0.7 { cli.q = cfg.analysis.q; }
            if cli.fft_size == 256 { cli.fft_size = cfg.analysis.fft_size; }
            if cli.smoothing == 0.85 { cli.smoothing = cfg.analysis.smoothing; }
            if cli.volume == 0.8 { cli.volume = cfg.playback.volume; }
            if !cli.labels { cli.labels = cfg.overlay.labels; }
            if !cli.show_time { cli.show_time = cfg.overlay.show_time; }
            if cli.font.is_none() { cli.font = cfg.overlay.font; }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let input = cli.input.clone().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    if cli.width == 0 || cli.height == 0 {
        anyhow::bail!("Resolution must be non-zero, got {}x{}", cli.width, cli.height);
    }
    if cli.fps == 0 {
        anyhow::bail!("Frame rate must be non-zero");
    }
    if let (Some(pause), Some(resume)) = (cli.pause_at, cli.resume_at) {
        if resume <= pause {
            anyhow::bail!("--resume-at ({resume}s) must come after --pause-at ({pause}s)");
        }
    }

    log::info!("dualband - dual-band spectrum visualizer");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", cli.output.display());
    log::info!("Resolution: {}x{} @ {}fps", cli.width, cli.height, cli.fps);
    log::info!(
        "Crossover: {} Hz (Q {}), FFT size {}, smoothing {}",
        cli.cutoff, cli.q, cli.fft_size, cli.smoothing
    );

    // 1. Decode audio
    log::info!("Decoding audio...");
    let audio_data = audio::decode::decode_audio(&input)?;
    let sample_rate = audio_data.sample_rate;
    let duration = audio_data.duration();

    // 2. Player setup: layout, volume, media, start position
    let container = LayoutSize::new(cli.width, cli.height);
    let graph_config = GraphConfig::split(cli.cutoff, cli.q, cli.fft_size, cli.smoothing);
    let mut player = Player::new(graph_config, container);
    player.dispatch(PlayerEvent::Resize(container))?;
    player.dispatch(PlayerEvent::VolumeChange(cli.volume))?;
    player.dispatch(PlayerEvent::FileSelected(audio_data))?;
    if cli.start > 0.0 {
        player.dispatch(PlayerEvent::Seek(cli.start))?;
    }
    player.dispatch(PlayerEvent::Play)?;
    if !player.visualization_available() {
        log::warn!("Visualization unavailable, the video will stay blank");
    }

    // 3. Text overlays
    let overlays = if cli.labels || cli.show_time {
        load_overlays(&cli)
    } else {
        None
    };

    // 4. Start FFmpeg encoder (video only, audio is muxed afterwards)
    let scratch = std::env::temp_dir();
    let video_path = scratch.join(format!("dualband-{}-video.mkv", std::process::id()));
    let audio_path = scratch.join(format!("dualband-{}-audio.wav", std::process::id()));

    log::info!("Starting FFmpeg encoder...");
    let mut encoder = FfmpegEncoder::new(
        &video_path,
        &VideoSettings {
            width: cli.width,
            height: cli.height,
            fps: cli.fps,
            codec: &cli.codec,
            pix_fmt: &cli.pix_fmt,
            crf: cli.crf,
            bitrate: cli.bitrate.as_deref(),
        },
    )?;

    let mut dump = cli
        .dump_snapshots
        .as_deref()
        .map(SnapshotDump::create)
        .transpose()?;

    // 5. Frame loop: advance the media clock one refresh interval, then tick
    let remaining = (duration - cli.start.max(0.0)).max(0.0);
    let paused_span = match (cli.pause_at, cli.resume_at) {
        (Some(pause), Some(resume)) if pause < remaining => resume - pause,
        _ => 0.0,
    };
    let estimated_frames = ((remaining + paused_span) * cli.fps as f64).ceil() as u64;

    let pb = ProgressBar::new(estimated_frames);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let mut pixels: Vec<u8> = Vec::new();
    let mut script = PauseScript::Pending;
    let mut frame_idx: u64 = 0;
    let mut painted = player.render_loop().frames_painted();
    let (mut high_waveform, mut low_waveform) = (Vec::new(), Vec::new());

    loop {
        let t = frame_idx as f64 / cli.fps as f64;

        if let Some(pause_at) = cli.pause_at {
            if script == PauseScript::Pending && t >= pause_at && player.state() == PlayerState::Playing {
                player.dispatch(PlayerEvent::Pause)?;
                script = PauseScript::Paused;
            }
        }
        if let Some(resume_at) = cli.resume_at {
            if script == PauseScript::Paused && t >= resume_at {
                player.dispatch(PlayerEvent::TogglePlay)?;
                script = PauseScript::Done;
            }
        }

        let block = frame_boundary(frame_idx + 1, sample_rate, cli.fps)
            - frame_boundary(frame_idx, sample_rate, cli.fps);
        let state = player.advance(block)?;
        player.dispatch(PlayerEvent::Frame)?;

        pixels.clear();
        pixels.extend_from_slice(player.surface().pixels());
        if let Some(ref overlays) = overlays {
            draw_overlays(&mut pixels, cli.width, cli.height, overlays, player.playback());
        }
        encoder.write_frame(&pixels)?;

        let now_painted = player.render_loop().frames_painted();
        if now_painted != painted {
            painted = now_painted;
            if let (Some(dump), Some(graph)) = (dump.as_mut(), player.graph()) {
                graph.time_domain(&mut high_waveform, &mut low_waveform);
                let (high, low) = player.render_loop().last_snapshots();
                dump.write(&SnapshotRecord {
                    frame: frame_idx,
                    time: t,
                    high,
                    low,
                    high_waveform: &high_waveform,
                    low_waveform: &low_waveform,
                })?;
            }
        }

        frame_idx += 1;
        pb.set_position(frame_idx);

        if state == PlayerState::Ended {
            break;
        }
        if script == PauseScript::Paused && cli.resume_at.is_none() {
            log::info!("Paused with no resume point, stopping");
            break;
        }
    }

    pb.finish_with_message("Rendering complete");
    log::info!("Rendered {} frames ({} painted)", frame_idx, painted);

    // 6. Finish encoding and mux the recorded output
    log::info!("Finishing encoding...");
    encoder.finish()?;

    if let Some(dump) = dump {
        let records = dump.finish()?;
        log::info!("Wrote {} snapshot records", records);
    }

    let output = player.output().context("No audio output was recorded")?;
    log::info!(
        "Recorded {:.1}s of audio output",
        output.frames_written() as f64 / sample_rate as f64
    );
    output.write_wav(&audio_path)?;
    ffmpeg::mux(&video_path, &audio_path, &cli.output)?;

    std::fs::remove_file(&video_path).ok();
    std::fs::remove_file(&audio_path).ok();
    player.teardown();

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}

/// First sample frame of video frame `idx`.
fn frame_boundary(idx: u64, sample_rate: u32, fps: u32) -> usize {
    (idx * sample_rate as u64 / fps as u64) as usize
}

fn load_overlays(cli: &Cli) -> Option<Overlays> {
    let font_path: Option<PathBuf> = cli.font.clone().or_else(render::text::find_system_font);
    let Some(font_path) = font_path else {
        log::warn!("No font available for text overlays, pass --font");
        return None;
    };

    let shorter = cli.width.min(cli.height) as f32;
    let font_size = (shorter * 0.04).max(12.0);
    match TextOverlay::from_file(&font_path, font_size) {
        Ok(text) => Some(Overlays {
            text,
            labels: cli.labels,
            show_time: cli.show_time,
            margin: (shorter * 0.04) as i32,
        }),
        Err(err) => {
            log::warn!("Text overlays disabled: {:#}", err);
            None
        }
    }
}

fn draw_overlays(
    pixels: &mut [u8],
    width: u32,
    height: u32,
    overlays: &Overlays,
    playback: &PlaybackState,
) {
    let text = &overlays.text;
    let margin = overlays.margin;
    let bottom = height as i32 - margin - text.line_height() as i32;

    if overlays.labels {
        let label = [255u8, 255, 255, 102];
        text.composite(pixels, width, height, "VOCALS", margin, margin, label);
        text.composite(pixels, width, height, "INSTRUMENTS", margin, bottom, label);

        if !playback.file_name.is_empty() {
            let tw = text.measure_width(&playback.file_name) as i32;
            let tx = width as i32 - margin - tw;
            text.composite(pixels, width, height, &playback.file_name, tx, margin, [255, 255, 255, 153]);
        }
    }

    if overlays.show_time {
        let time_str = format!(
            "{} / {}",
            format_time(playback.current_time),
            format_time(playback.duration)
        );
        let tw = text.measure_width(&time_str) as i32;
        let tx = width as i32 - margin - tw;
        text.composite(pixels, width, height, &time_str, tx, bottom, [255, 255, 255, 128]);
    }
}
