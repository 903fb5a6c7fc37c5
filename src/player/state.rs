use crate::audio::decode::AudioData;
use crate::render::surface::LayoutSize;

pub const DEFAULT_VOLUME: f32 = 0.8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    /// No media selected yet.
    Idle,
    Loaded,
    Playing,
    Paused,
    Ended,
}

/// Everything that can happen to the player, from the user or the media.
#[derive(Debug)]
pub enum PlayerEvent {
    FileSelected(AudioData),
    Play,
    Pause,
    /// Play/pause button.
    TogglePlay,
    Seek(f64),
    VolumeChange(f32),
    Resize(LayoutSize),
    LoadedMetadata,
    TimeUpdate,
    Ended,
    /// Display refresh tick.
    Frame,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f32,
    pub file_name: String,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_time: 0.0,
            duration: 0.0,
            volume: DEFAULT_VOLUME,
            file_name: String::new(),
        }
    }
}

/// `m:ss`, minutes unbounded.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
