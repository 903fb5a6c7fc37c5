use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::graph::{DEFAULT_CUTOFF_HZ, DEFAULT_FFT_SIZE, DEFAULT_Q, DEFAULT_SMOOTHING};
use crate::player::state::DEFAULT_VOLUME;

pub const CONFIG_FILE_NAME: &str = "dualband.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_cutoff")]
    pub cutoff_hz: f32,
    #[serde(default = "default_q")]
    pub q: f32,
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_volume")]
    pub volume: f32,
}

#[derive(Debug, Default, Deserialize)]
pub struct OverlayConfig {
    #[serde(default)]
    pub font: Option<PathBuf>,
    #[serde(default)]
    pub labels: bool,
    #[serde(default)]
    pub show_time: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cutoff_hz: default_cutoff(),
            q: default_q(),
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
        }
    }
}

pub fn default_width() -> u32 { 768 }
pub fn default_height() -> u32 { 320 }
pub fn default_fps() -> u32 { 60 }
pub fn default_crf() -> u32 { 18 }
pub fn default_codec() -> String { "libx264".into() }
pub fn default_cutoff() -> f32 { DEFAULT_CUTOFF_HZ }
pub fn default_q() -> f32 { DEFAULT_Q }
pub fn default_fft_size() -> usize { DEFAULT_FFT_SIZE }
pub fn default_smoothing() -> f32 { DEFAULT_SMOOTHING }
pub fn default_volume() -> f32 { DEFAULT_VOLUME }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// `./dualband.toml`, then `~/.config/dualband/config.toml`, then the
/// platform config directory.
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("dualband").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("dualband").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
