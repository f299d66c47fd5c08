use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::effects::EffectParams;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub visualizer: VisualizerConfig,
    #[serde(default)]
    pub effects: Vec<String>,
    #[serde(default)]
    pub effect_params: EffectParams,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_preset")]
    pub preset: String,
    #[serde(default)]
    pub threads: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_frame_smoothing")]
    pub frame_smoothing: f64,
    #[serde(default = "default_recurrence")]
    pub recurrence: bool,
}

#[derive(Debug, Deserialize)]
pub struct VisualizerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bars")]
    pub bars: usize,
    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            codec: default_codec(),
            preset: default_preset(),
            threads: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            frame_smoothing: default_frame_smoothing(),
            recurrence: default_recurrence(),
        }
    }
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bars: default_bars(),
            color: default_color(),
        }
    }
}

fn default_fps() -> f64 { 30.0 }
fn default_codec() -> String { "libx264".into() }
fn default_preset() -> String { "medium".into() }
fn default_frame_smoothing() -> f64 { 4.0 }
fn default_recurrence() -> bool { true }
fn default_bars() -> usize { 64 }
fn default_color() -> String { "#ab20fd".into() }

/// `dancing-art.toml` in the working directory, then the user config dirs.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("dancing-art.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("dancing-art").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("dancing-art").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.output.fps, 30.0);
        assert_eq!(cfg.output.preset, "medium");
        assert!(cfg.audio.recurrence);
        assert!(!cfg.visualizer.enabled);
        assert_eq!(cfg.visualizer.color, "#ab20fd");
        assert_eq!(cfg.effect_params, EffectParams::default());
    }

    #[test]
    fn sections_parse() {
        let cfg: Config = toml::from_str(
            r##"
            effects = ["all"]

            [output]
            fps = 24
            threads = 2

            [audio]
            frame_smoothing = 6
            recurrence = false

            [visualizer]
            enabled = true
            bars = 32
            color = "#00ff00"

            [effect_params]
            zoom_max = 0.25
            sort_reverse = false
            "##,
        )
        .unwrap();
        assert_eq!(cfg.effects, vec!["all"]);
        assert_eq!(cfg.output.fps, 24.0);
        assert_eq!(cfg.output.threads, Some(2));
        assert_eq!(cfg.audio.frame_smoothing, 6.0);
        assert!(!cfg.audio.recurrence);
        assert_eq!(cfg.visualizer.bars, 32);
        assert_eq!(cfg.effect_params.zoom_max, 0.25);
        assert!(!cfg.effect_params.sort_reverse);
        assert_eq!(cfg.effect_params.wave_mag, 10.0);
    }

    #[test]
    fn broken_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[output\nfps = ").unwrap();
        assert!(load_config(&path).is_none());
        assert!(load_config(&dir.path().join("missing.toml")).is_none());
    }
}
