use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;

use serde::Deserialize;

use crate::error::{AnimError, Result};

use super::frame::Frame;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "mkv", "webm", "avi", "mpg", "mpeg", "flv", "wmv"];

/// Whether a path names a video container (by extension).
pub fn is_video_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Anything that yields RGB frames in presentation order.
pub trait FrameSource {
    fn dimensions(&self) -> (u32, u32);

    /// `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// One image held for the whole clip.
pub struct StillImage {
    frame: Frame,
}

impl StillImage {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AnimError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "image not found"),
            ));
        }
        let img = image::open(path).map_err(|e| match e {
            image::ImageError::IoError(io) => AnimError::io(path, io),
            other => AnimError::decode(format!("image {}", path.display()), other),
        })?;
        let frame = Frame::from_rgb_image(img.to_rgb8());
        log::info!("Image: {} ({}x{})", path.display(), frame.width, frame.height);
        Ok(Self { frame })
    }
}

impl FrameSource for StillImage {
    fn dimensions(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(Some(self.frame.clone()))
    }
}

/// Stream facts read from `ffprobe`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration: f64,
    pub has_audio: bool,
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// "30000/1001" or "25" → frames per second. "0/0" is rejected.
fn parse_rate(rate: &str) -> Option<f64> {
    let fps = match rate.split_once('/') {
        Some((n, d)) => {
            let d: f64 = d.trim().parse().ok()?;
            if d == 0.0 {
                return None;
            }
            n.trim().parse::<f64>().ok()? / d
        }
        None => rate.trim().parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

pub fn parse_probe(json: &str) -> Result<VideoInfo> {
    let probe: ProbeOutput =
        serde_json::from_str(json).map_err(|e| AnimError::decode("ffprobe output", e))?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| AnimError::decode("video", "no video stream"))?;
    let has_audio = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(AnimError::decode("video", "missing frame size")),
    };
    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| AnimError::decode("video", "unknown frame rate"))?;
    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| AnimError::decode("video", "unknown duration"))?;

    Ok(VideoInfo {
        width,
        height,
        fps,
        duration,
        has_audio,
    })
}

pub fn probe_video(path: &Path) -> Result<VideoInfo> {
    if !path.exists() {
        return Err(AnimError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "video not found"),
        ));
    }
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json"])
        .args([
            "-show_entries",
            "stream=codec_type,width,height,avg_frame_rate,r_frame_rate,duration:format=duration",
        ])
        .arg(path)
        .output()
        .map_err(|e| AnimError::decode("video", format!("failed to run ffprobe ({}). Is ffmpeg installed?", e)))?;
    if !output.status.success() {
        return Err(AnimError::decode(
            format!("video {}", path.display()),
            String::from_utf8_lossy(&output.stderr).trim(),
        ));
    }
    parse_probe(&String::from_utf8_lossy(&output.stdout))
}

/// Frames of a video file, decoded to rgb24 by an `ffmpeg` child process.
///
/// When the decoder ends cleanly one frame short of the timeline, the last
/// frame is held once; after that the source reports exhaustion. A decoder
/// that exits with an error is a `Decode` error carrying its stderr.
pub struct VideoSource {
    path: PathBuf,
    info: VideoInfo,
    child: Option<Child>,
    stderr: Option<JoinHandle<String>>,
    last: Option<Frame>,
    decoded: usize,
    held: bool,
}

impl VideoSource {
    /// Decode `duration` seconds starting at `start`, using stream facts from [`probe_video`].
    pub fn open(path: &Path, info: VideoInfo, start: f64, duration: f64) -> Result<Self> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-nostdin"])
            .args(["-ss", &format!("{:.6}", start)])
            .arg("-i")
            .arg(path)
            .args(["-t", &format!("{:.6}", duration)])
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"]);

        log::info!(
            "Video: {} ({}x{} @ {:.3}fps, {:.2}s)",
            path.display(),
            info.width,
            info.height,
            info.fps,
            info.duration
        );
        Self::spawn(path, info, cmd)
    }

    fn spawn(path: &Path, info: VideoInfo, mut cmd: Command) -> Result<Self> {
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AnimError::decode("video", format!("failed to spawn ffmpeg ({}). Is ffmpeg installed?", e)))?;

        // Drained on its own thread so a chatty decoder never blocks on a full pipe.
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut text = String::new();
                if let Err(e) = pipe.read_to_string(&mut text) {
                    log::debug!("ffmpeg stderr unreadable: {}", e);
                }
                text
            })
        });

        Ok(Self {
            path: path.to_path_buf(),
            info,
            child: Some(child),
            stderr,
            last: None,
            decoded: 0,
            held: false,
        })
    }

    /// Reap the decoder after its output ends.
    fn finish_decoder(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().map_err(|e| AnimError::io(&self.path, e))?;
        let stderr = self
            .stderr
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(AnimError::decode(
                format!("video {}", self.path.display()),
                format!("ffmpeg exited with {} after {} frames: {}", status, self.decoded, stderr.trim()),
            ));
        }
        log::debug!("{}: decoder finished after {} frames", self.path.display(), self.decoded);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let Some(stdout) = self.child.as_mut().and_then(|c| c.stdout.as_mut()) else {
            return Ok(None);
        };
        let mut buf = vec![0u8; self.info.width as usize * self.info.height as usize * 3];
        match stdout.read_exact(&mut buf) {
            Ok(()) => Frame::new(self.info.width, self.info.height, 3, buf).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finish_decoder()?;
                Ok(None)
            }
            Err(e) => Err(AnimError::io(&self.path, e)),
        }
    }
}

impl FrameSource for VideoSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.info.width, self.info.height)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.read_frame()? {
            self.decoded += 1;
            self.last = Some(frame.clone());
            return Ok(Some(frame));
        }
        if self.decoded == 0 {
            return Err(AnimError::decode(
                format!("video {}", self.path.display()),
                "no frames in the requested window",
            ));
        }
        if self.held {
            return Ok(None);
        }
        self.held = true;
        Ok(self.last.take())
    }
}

impl Drop for VideoSource {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if child.kill().is_ok() {
                let _ = child.wait();
            }
        }
    }
}
