use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use tempfile::NamedTempFile;

use crate::error::{AnimError, Result};
use crate::render::frame::Frame;

use super::FrameSink;

/// Audio muxed under the rendered frames: a slice of a file's first audio track.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub start: f64,
    pub duration: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    pub preset: String,
    pub threads: usize,
    pub audio: Option<AudioTrack>,
}

/// ffmpeg arguments writing to `target`.
pub fn build_args(settings: &EncoderSettings, target: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(), "error".into(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgb24".into(),
        "-video_size".into(), format!("{}x{}", settings.width, settings.height),
        "-framerate".into(), format!("{}", settings.fps),
        "-i".into(), "pipe:0".into(),
    ];

    if let Some(audio) = &settings.audio {
        args.extend([
            "-ss".into(), format!("{:.6}", audio.start),
            "-t".into(), format!("{:.6}", audio.duration),
            "-i".into(), audio.path.to_string_lossy().into_owned(),
            "-map".into(), "0:v:0".into(),
            "-map".into(), "1:a:0".into(),
        ]);
    }

    // yuv420p needs even dimensions
    if settings.width % 2 == 1 || settings.height % 2 == 1 {
        args.extend(["-vf".into(), "pad=ceil(iw/2)*2:ceil(ih/2)*2".into()]);
    }

    args.extend([
        "-c:v".into(), settings.codec.clone(),
        "-preset".into(), settings.preset.clone(),
        "-bf".into(), "2".into(),
        "-b_strategy".into(), "2".into(),
        "-threads".into(), settings.threads.to_string(),
        "-pix_fmt".into(), "yuv420p".into(),
    ]);
    if settings.audio.is_some() {
        args.extend(["-c:a".into(), "aac".into(), "-shortest".into()]);
    }
    args.push(target.to_string_lossy().into_owned());
    args
}

/// Streams rgb24 frames into an `ffmpeg` child. The video is written next to
/// the destination under a temporary name and only renamed over it once
/// ffmpeg exits cleanly.
pub struct FfmpegEncoder {
    child: Option<Child>,
    staging: Option<NamedTempFile>,
    output: PathBuf,
    frame_bytes: usize,
    frames: usize,
}

impl FfmpegEncoder {
    pub fn new(output: &Path, settings: &EncoderSettings) -> Result<Self> {
        let dir = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let suffix = output
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| ".mp4".to_string());
        let staging = tempfile::Builder::new()
            .prefix(".dancing-art-")
            .suffix(&suffix)
            .tempfile_in(&dir)
            .map_err(|e| AnimError::io(&dir, e))?;

        let args = build_args(settings, staging.path());
        log::debug!("ffmpeg {}", args.join(" "));

        let mut cmd = Command::new("ffmpeg");
        cmd.args(&args);
        let encoder = Self::spawn(cmd, staging, output, settings.width as usize * settings.height as usize * 3)?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}, preset={}",
            settings.width,
            settings.height,
            settings.fps,
            settings.codec,
            settings.preset
        );
        Ok(encoder)
    }

    fn spawn(mut cmd: Command, staging: NamedTempFile, output: &Path, frame_bytes: usize) -> Result<Self> {
        let child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AnimError::Encode(format!("failed to spawn ffmpeg ({}). Is ffmpeg installed?", e)))?;

        Ok(Self {
            child: Some(child),
            staging: Some(staging),
            output: output.to_path_buf(),
            frame_bytes,
            frames: 0,
        })
    }
}

/// Close stdin, wait for ffmpeg and return its exit status and stderr.
fn reap(mut child: Child) -> Result<(ExitStatus, String)> {
    drop(child.stdin.take());
    let output = child
        .wait_with_output()
        .map_err(|e| AnimError::Encode(format!("failed to wait for ffmpeg: {}", e)))?;
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Ok((output.status, stderr))
}

impl FrameSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.channels != 3 || frame.data.len() != self.frame_bytes {
            return Err(AnimError::Alignment {
                what: "encoded frame bytes",
                expected: self.frame_bytes,
                got: frame.data.len(),
            });
        }
        let stdin = self
            .child
            .as_mut()
            .and_then(|c| c.stdin.as_mut())
            .ok_or_else(|| AnimError::Encode("ffmpeg stdin not available".into()))?;
        if let Err(e) = stdin.write_all(&frame.data) {
            // ffmpeg usually died first; its stderr says why.
            let reason = match self.child.take().map(reap).transpose()? {
                Some((status, stderr)) => format!("ffmpeg exited with {}:\n{}", status, stderr),
                None => String::new(),
            };
            return Err(AnimError::Encode(format!(
                "failed to write frame {} to ffmpeg: {}. {}",
                self.frames, e, reason
            )));
        }
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let child = self
            .child
            .take()
            .ok_or_else(|| AnimError::Encode("encoder already finished".into()))?;
        let (status, stderr) = reap(child)?;
        if !status.success() {
            return Err(AnimError::Encode(format!("ffmpeg exited with {}:\n{}", status, stderr)));
        }

        let staging = self
            .staging
            .take()
            .ok_or_else(|| AnimError::Encode("staging file missing".into()))?;
        staging
            .persist(&self.output)
            .map_err(|e| AnimError::io(&self.output, e.error))?;

        log::info!("FFmpeg encoding complete: {} frames", self.frames);
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        // Unfinished: stop ffmpeg; the staging file deletes itself.
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
