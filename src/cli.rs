use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dualband", about = "Dual-band spectrum visualizer video generator")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: Option<PathBuf>,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Config file (defaults to ./dualband.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Surface width in pixels
    #[arg(long, default_value_t = 768)]
    pub width: u32,

    /// Surface height in pixels
    #[arg(long, default_value_t = 320)]
    pub height: u32,

    /// Frames per second (the display refresh rate being simulated)
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long, default_value_t = 18)]
    pub crf: u32,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, default_value = "yuv420p")]
    pub pix_fmt: String,

    /// Crossover frequency between the two bands, in Hz
    #[arg(long, default_value_t = 2000.0)]
    pub cutoff: f32,

    /// Filter resonance (dB)
    #[arg(long, default_value_t = 0.7)]
    pub q: f32,

    /// Analyser FFT size (power of two)
    #[arg(long, default_value_t = 256)]
    pub fft_size: usize,

    /// Analyser smoothing time constant (0.0-1.0, exclusive)
    #[arg(long, default_value_t = 0.85)]
    pub smoothing: f32,

    /// Output volume (0.0-1.0)
    #[arg(long, default_value_t = 0.8)]
    pub volume: f32,

    /// Start position in seconds
    #[arg(long, default_value_t = 0.0)]
    pub start: f64,

    /// Pause playback at this point of the output timeline (seconds)
    #[arg(long)]
    pub pause_at: Option<f64>,

    /// Resume playback at this point of the output timeline (seconds)
    #[arg(long, requires = "pause_at")]
    pub resume_at: Option<f64>,

    /// Draw the band labels and file name
    #[arg(long)]
    pub labels: bool,

    /// Show position / duration
    #[arg(long)]
    pub show_time: bool,

    /// TTF/OTF font used for the text overlays
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Write per-frame byte snapshots as JSON lines
    #[arg(long)]
    pub dump_snapshots: Option<PathBuf>,
}
