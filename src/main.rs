mod align;
mod anim;
mod audio;
mod cli;
mod config;
mod effects;
mod encode;
mod error;
mod render;
mod timecode;

use anyhow::{Context, Result};
use clap::Parser;

use anim::{create_animation, AnimationRequest, VisualizerSettings};
use cli::Cli;
use effects::EffectParams;
use render::source::is_video_path;
use render::visualizer::parse_hex_color;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let mut effect_params = EffectParams::default();
    let mut recurrence = !cli.no_recurrence;
    let mut color = "#ab20fd".to_string();

    // Explicit --config path, or auto-detect dancing-art.toml / global config
    let config_path = cli.config.clone().or_else(config::find_config);
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.fps == 30.0 { cli.fps = cfg.output.fps; }
            if cli.codec == "libx264" { cli.codec = cfg.output.codec; }
            if cli.preset == "medium" { cli.preset = cfg.output.preset; }
            if cli.threads.is_none() { cli.threads = cfg.output.threads; }
            if cli.frame_smoothing == 4.0 { cli.frame_smoothing = cfg.audio.frame_smoothing; }
            if !cli.no_recurrence { recurrence = cfg.audio.recurrence; }
            if !cli.visualizer { cli.visualizer = cfg.visualizer.enabled; }
            if cli.bars == 64 { cli.bars = cfg.visualizer.bars; }
            if cli.effects.is_empty() && !cfg.effects.is_empty() {
                cli.effects = cfg.effects;
            }
            color = cfg.visualizer.color;
            effect_params = cfg.effect_params;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let input = cli.input.as_ref().context("Input image or video is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let (image, video) = if is_video_path(input) {
        (None, Some(input.clone()))
    } else {
        (Some(input.clone()), None)
    };

    let start_time = timecode::parse_time("start_time", &cli.start)?;
    let end_time = cli
        .end
        .as_deref()
        .map(|e| timecode::parse_time("end_time", e))
        .transpose()?;

    let visualizer = if cli.visualizer {
        Some(VisualizerSettings {
            bars: cli.bars,
            color: parse_hex_color(&color)?,
        })
    } else {
        None
    };

    let threads = cli.threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });

    log::info!("dancing-art - audio-driven image animation");
    log::info!("Input: {}", input.display());
    if let Some(ref audio) = cli.audio {
        log::info!("Audio: {}", audio.display());
    }
    log::info!("Output: {}", cli.output.display());

    let request = AnimationRequest {
        image,
        video,
        audio: cli.audio.clone(),
        output: cli.output.clone(),
        start_time,
        end_time,
        frame_rate: cli.fps,
        frame_smoothing: cli.frame_smoothing,
        recurrence,
        visualizer,
        effects: cli.effects.clone(),
        effect_params,
        codec: cli.codec.clone(),
        preset: cli.preset.clone(),
        threads,
    };

    let summary = create_animation(&request)
        .with_context(|| format!("Failed to render {}", cli.output.display()))?;
    log::info!(
        "Rendered {} frames ({}x{} @ {:.3}fps, {:.2}s)",
        summary.frames,
        summary.width,
        summary.height,
        summary.fps,
        summary.duration
    );
    Ok(())
}
