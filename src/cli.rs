use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dancing-art", about = "Make an image or video dance to music")]
pub struct Cli {
    /// Input image (PNG, JPEG, ...) or video (MP4, MOV, MKV, WEBM, ...)
    pub input: Option<PathBuf>,

    /// Audio file driving the effects. Defaults to the video's own track.
    #[arg(short, long)]
    pub audio: Option<PathBuf>,

    /// Output video file
    #[arg(short, long, default_value = "dancing art.mp4")]
    pub output: PathBuf,

    /// Start of the audio window (seconds or m:ss)
    #[arg(long, default_value = "0")]
    pub start: String,

    /// End of the audio window (seconds or m:ss). Defaults to the end of the audio.
    #[arg(long)]
    pub end: Option<String>,

    /// Frames per second for image input
    #[arg(long, default_value_t = 30.0)]
    pub fps: f64,

    /// Analysis window length, in frames
    #[arg(long, default_value_t = 4.0)]
    pub frame_smoothing: f64,

    /// Overlay a spectrum bar chart
    #[arg(long)]
    pub visualizer: bool,

    /// Number of visualizer bars
    #[arg(long, default_value_t = 64)]
    pub bars: usize,

    /// Effects (comma-separated names or preset: default, all, none)
    #[arg(long, value_delimiter = ',')]
    pub effects: Vec<String>,

    /// Skip recurrence smoothing of the spectrogram
    #[arg(long)]
    pub no_recurrence: bool,

    /// FFmpeg video codec
    #[arg(long, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg encoder preset
    #[arg(long, default_value = "medium")]
    pub preset: String,

    /// FFmpeg encoder threads (default: all cores)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Config file (default: dancing-art.toml, then ~/.config/dancing-art/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
