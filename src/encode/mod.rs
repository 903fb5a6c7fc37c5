pub mod ffmpeg;
pub mod snapshots;
