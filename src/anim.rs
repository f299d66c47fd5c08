use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};

use crate::align::{align, FrameTimestamps};
use crate::audio::analysis::{extract_signals, ExtractOptions};
use crate::audio::decode::{decode_audio, AudioSignal};
use crate::audio::stft::StftParams;
use crate::effects::{resolve_effects, EffectParams};
use crate::encode::ffmpeg::{AudioTrack, EncoderSettings, FfmpegEncoder};
use crate::encode::FrameSink;
use crate::error::{AnimError, Result};
use crate::render::pipeline::EffectPipeline;
use crate::render::source::{probe_video, FrameSource, StillImage, VideoInfo, VideoSource};
use crate::render::visualizer::{composite, Visualizer, DEFAULT_BARS, DEFAULT_COLOR};
use crate::timecode::format_time;

#[derive(Clone, Debug, PartialEq)]
pub struct VisualizerSettings {
    pub bars: usize,
    pub color: [u8; 3],
}

impl Default for VisualizerSettings {
    fn default() -> Self {
        Self {
            bars: DEFAULT_BARS,
            color: DEFAULT_COLOR,
        }
    }
}

/// Everything `create_animation` needs. Exactly one of `image`/`video` is the
/// picture; the audio comes from `audio`, or from the video when absent.
#[derive(Clone, Debug)]
pub struct AnimationRequest {
    pub image: Option<PathBuf>,
    pub video: Option<PathBuf>,
    pub audio: Option<PathBuf>,
    pub output: PathBuf,
    pub start_time: f64,
    pub end_time: Option<f64>,
    /// Ignored for video input, which keeps its own rate
    pub frame_rate: f64,
    pub frame_smoothing: f64,
    pub recurrence: bool,
    pub visualizer: Option<VisualizerSettings>,
    pub effects: Vec<String>,
    pub effect_params: EffectParams,
    pub codec: String,
    pub preset: String,
    pub threads: usize,
}

impl Default for AnimationRequest {
    fn default() -> Self {
        Self {
            image: None,
            video: None,
            audio: None,
            output: PathBuf::from("dancing art.mp4"),
            start_time: 0.0,
            end_time: None,
            frame_rate: 30.0,
            frame_smoothing: 4.0,
            recurrence: true,
            visualizer: None,
            effects: Vec::new(),
            effect_params: EffectParams::default(),
            codec: "libx264".into(),
            preset: "medium".into(),
            threads: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderSummary {
    pub frames: usize,
    pub fps: f64,
    pub duration: f64,
    pub width: u32,
    pub height: u32,
}

/// A validated, analysed render, ready to stream frames into a sink.
pub struct Animation {
    source: Box<dyn FrameSource>,
    pipeline: EffectPipeline,
    visualizer: Option<Visualizer>,
    timestamps: FrameTimestamps,
    fps: f64,
    start: f64,
    duration: f64,
    audio_path: PathBuf,
}

/// `[start, end)` within a source of length `total`; `end` is clamped.
fn resolve_window(start: f64, end: Option<f64>, total: f64) -> Result<(f64, f64)> {
    if !start.is_finite() || start < 0.0 {
        return Err(AnimError::config("start_time", format!("{} is negative", start)));
    }
    if let Some(end) = end {
        if !(end > start) {
            return Err(AnimError::config(
                "end_time",
                format!("{} must be after start_time {}", format_time(end), format_time(start)),
            ));
        }
    }
    let end = end.unwrap_or(total).min(total);
    if start >= end {
        return Err(AnimError::config(
            "start_time",
            format!("{} is past the end of the audio ({})", format_time(start), format_time(total)),
        ));
    }
    Ok((start, end))
}

/// Playable length: a video input never runs past its own last frame.
fn clip_length(audio: f64, video: Option<&VideoInfo>) -> f64 {
    video.map_or(audio, |info| audio.min(info.duration))
}

impl Animation {
    pub fn prepare(req: &AnimationRequest) -> Result<Self> {
        let video = match (&req.image, &req.video) {
            (_, Some(video)) => Some((video.clone(), probe_video(video)?)),
            (Some(_), None) => None,
            (None, None) => return Err(AnimError::config("img", "an image or a video is required")),
        };

        let audio_path = match (&req.audio, &video) {
            (Some(audio), _) => audio.clone(),
            (None, Some((path, info))) if info.has_audio => path.clone(),
            (None, Some(_)) => return Err(AnimError::config("audio", "the video has no audio track; pass an audio file")),
            (None, None) => return Err(AnimError::config("audio", "an audio file is required for image input")),
        };

        log::info!("Decoding audio...");
        let full = decode_audio(&audio_path)?;
        let total = clip_length(full.duration(), video.as_ref().map(|(_, info)| info));
        let (start, end) = resolve_window(req.start_time, req.end_time, total)?;
        let duration = end - start;
        let audio = full.window(start, end);
        log::info!("Window: {} - {} ({:.2}s)", format_time(start), format_time(end), duration);

        let (source, fps) = match video {
            Some((path, info)) => {
                let fps = info.fps;
                let clip: Box<dyn FrameSource> = Box::new(VideoSource::open(&path, info, start, duration)?);
                (clip, fps)
            }
            None => {
                let image = req.image.as_deref().ok_or_else(|| AnimError::config("img", "missing"))?;
                let clip: Box<dyn FrameSource> = Box::new(StillImage::open(image)?);
                (clip, req.frame_rate)
            }
        };

        Self::build(source, &audio, req, fps, start, duration, audio_path)
    }

    fn build(
        source: Box<dyn FrameSource>,
        audio: &AudioSignal,
        req: &AnimationRequest,
        fps: f64,
        start: f64,
        duration: f64,
        audio_path: PathBuf,
    ) -> Result<Self> {
        let effects = resolve_effects(&req.effects, &req.effect_params)?;

        log::info!("Analyzing audio...");
        let opts = ExtractOptions {
            frame_rate: fps,
            frame_smoothing: req.frame_smoothing,
            recurrence: req.recurrence,
        };
        let signals = extract_signals(audio, &opts)?;

        let timestamps = FrameTimestamps::new(duration, fps);
        let low = align(&signals.low, &timestamps);
        let high = align(&signals.high, &timestamps);
        log::info!("Total frames: {}, Duration: {:.2}s", timestamps.len(), duration);

        let pipeline = EffectPipeline::from_bands(effects, &low, &high)?;
        if !pipeline.stages().is_empty() {
            let names: Vec<&str> = pipeline.stages().iter().map(|s| s.effect.name()).collect();
            log::info!("Effects: {}", names.join(", "));
        }

        let visualizer = match &req.visualizer {
            Some(vis) => {
                let params = StftParams::derive(audio.sample_rate, fps, req.frame_smoothing)?;
                Some(Visualizer::analyze(audio, &params, vis.bars, vis.color)?)
            }
            None => None,
        };

        Ok(Self {
            source,
            pipeline,
            visualizer,
            timestamps,
            fps,
            start,
            duration,
            audio_path,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn encoder_settings(&self, req: &AnimationRequest) -> EncoderSettings {
        let (width, height) = self.source.dimensions();
        EncoderSettings {
            width,
            height,
            fps: self.fps,
            codec: req.codec.clone(),
            preset: req.preset.clone(),
            threads: req.threads.max(1),
            audio: Some(AudioTrack {
                path: self.audio_path.clone(),
                start: self.start,
                duration: self.duration,
            }),
        }
    }

    /// Pull, process and push every frame, then finish the sink.
    pub fn render(&mut self, sink: &mut dyn FrameSink) -> Result<RenderSummary> {
        let total = self.timestamps.len();
        let (width, height) = self.source.dimensions();
        let overlay = self.visualizer.as_ref().map(|v| v.schedule(&self.timestamps));
        if let Some(clip) = &overlay {
            if clip.len() != total {
                return Err(AnimError::Alignment {
                    what: "visualizer frames",
                    expected: total,
                    got: clip.len(),
                });
            }
        }

        let pb = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
        {
            pb.set_style(style.progress_chars("=>-"));
        }

        for index in 0..total {
            let base = self.source.next_frame()?.ok_or(AnimError::Alignment {
                what: "source frames",
                expected: total,
                got: index,
            })?;
            let mut frame = self.pipeline.process(index, base)?;
            if let Some(clip) = &overlay {
                frame = composite(&frame, &clip.frame(index, frame.width, frame.height)?)?;
            }
            sink.write_frame(&frame)?;
            pb.set_position(index as u64 + 1);
        }
        pb.finish_with_message("Rendering complete");

        sink.finish()?;
        Ok(RenderSummary {
            frames: total,
            fps: self.fps,
            duration: self.duration,
            width,
            height,
        })
    }
}

/// Render `req` to its output file. Either the whole video is published or
/// nothing is.
pub fn create_animation(req: &AnimationRequest) -> Result<RenderSummary> {
    check_output(&req.output)?;
    let mut animation = Animation::prepare(req)?;
    if animation.frame_count() == 0 {
        return Err(AnimError::config(
            "end_time",
            format!("the window is shorter than one frame at {}fps", animation.fps()),
        ));
    }

    log::info!("Starting FFmpeg encoder...");
    let mut encoder = FfmpegEncoder::new(&req.output, &animation.encoder_settings(req))?;
    let summary = animation.render(&mut encoder)?;
    log::info!("Done! Output: {}", req.output.display());
    Ok(summary)
}

fn check_output(output: &Path) -> Result<()> {
    if output.as_os_str().is_empty() || output.is_dir() {
        return Err(AnimError::config(
            "output",
            format!("'{}' is not a file path", output.display()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::pcm16_wav;
    use crate::render::frame::Frame;

    #[derive(Default)]
    struct Collect {
        frames: Vec<Frame>,
        finished: bool,
    }

    impl FrameSink for Collect {
        fn write_frame(&mut self, frame: &Frame) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        image: PathBuf,
        audio: PathBuf,
    }

    fn fixture(samples: &[i16], sample_rate: u32) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("still.png");
        image::RgbImage::from_fn(24, 16, |x, y| image::Rgb([(x * 10) as u8, (y * 15) as u8, 90]))
            .save(&image)
            .unwrap();
        let audio = dir.path().join("track.wav");
        std::fs::write(&audio, pcm16_wav(samples, sample_rate)).unwrap();
        Fixture { dir, image, audio }
    }

    fn request(f: &Fixture) -> AnimationRequest {
        AnimationRequest {
            image: Some(f.image.clone()),
            audio: Some(f.audio.clone()),
            output: f.dir.path().join("out.mp4"),
            frame_rate: 10.0,
            frame_smoothing: 2.0,
            ..AnimationRequest::default()
        }
    }

    fn clicks(sample_rate: u32, seconds: u32) -> Vec<i16> {
        (0..sample_rate * seconds)
            .map(|i| match i % 2000 {
                0..=40 => if i % 2 == 0 { 20000 } else { -20000 },
                _ => ((i as f32 * 0.05).sin() * 3000.0) as i16,
            })
            .collect()
    }

    #[test]
    fn silent_audio_leaves_image_untouched() {
        let sr = 8000;
        let f = fixture(&vec![0i16; sr as usize], sr);
        let mut anim = Animation::prepare(&request(&f)).unwrap();
        let mut sink = Collect::default();
        let summary = anim.render(&mut sink).unwrap();

        assert_eq!(summary.frames, 10);
        assert_eq!(sink.frames.len(), 10);
        assert!(sink.finished);
        let original = Frame::from_rgb_image(image::open(&f.image).unwrap().to_rgb8());
        assert!(sink.frames.iter().all(|fr| *fr == original));
    }

    #[test]
    fn subclip_window_sets_frame_count() {
        let sr = 4000;
        let f = fixture(&clicks(sr, 20), sr);
        let req = AnimationRequest {
            start_time: 5.0,
            end_time: Some(10.0),
            frame_rate: 30.0,
            effects: vec!["none".into()],
            ..request(&f)
        };
        let anim = Animation::prepare(&req).unwrap();
        assert!((anim.frame_count() as i64 - 150).abs() <= 1);

        let settings = anim.encoder_settings(&req);
        let track = settings.audio.unwrap();
        assert_eq!((track.start, track.duration), (5.0, 5.0));
        assert_eq!((settings.width, settings.height), (24, 16));
    }

    #[test]
    fn visualizer_overlay_keeps_size_and_count() {
        let sr = 8000;
        let f = fixture(&clicks(sr, 2), sr);
        let req = AnimationRequest {
            visualizer: Some(VisualizerSettings::default()),
            effects: vec!["all".into()],
            ..request(&f)
        };
        let mut anim = Animation::prepare(&req).unwrap();
        let mut sink = Collect::default();
        anim.render(&mut sink).unwrap();
        assert_eq!(sink.frames.len(), 20);
        assert!(sink.frames.iter().all(|fr| fr.shape() == (24, 16, 3)));
    }

    #[test]
    fn missing_inputs_are_configuration_errors() {
        let f = fixture(&[0; 800], 8000);
        let no_picture = AnimationRequest {
            image: None,
            ..request(&f)
        };
        assert!(matches!(
            Animation::prepare(&no_picture),
            Err(AnimError::Configuration { .. })
        ));

        let no_audio = AnimationRequest {
            audio: None,
            ..request(&f)
        };
        assert!(matches!(
            Animation::prepare(&no_audio),
            Err(AnimError::Configuration { .. })
        ));
    }

    #[test]
    fn missing_audio_file_is_io_error() {
        let f = fixture(&[0; 800], 8000);
        let req = AnimationRequest {
            audio: Some(f.dir.path().join("gone.wav")),
            ..request(&f)
        };
        assert!(matches!(Animation::prepare(&req), Err(AnimError::Io { .. })));
    }

    #[test]
    fn window_validation() {
        assert_eq!(resolve_window(0.0, None, 12.0).unwrap(), (0.0, 12.0));
        assert_eq!(resolve_window(2.0, Some(40.0), 12.0).unwrap(), (2.0, 12.0));
        assert!(resolve_window(-1.0, None, 12.0).is_err());
        assert!(resolve_window(5.0, Some(5.0), 12.0).is_err());
        assert!(resolve_window(13.0, None, 12.0).is_err());
    }

    #[test]
    fn video_shorter_than_audio_bounds_the_window() {
        let info = VideoInfo {
            width: 8,
            height: 8,
            fps: 25.0,
            duration: 4.0,
            has_audio: true,
        };
        assert_eq!(clip_length(10.0, Some(&info)), 4.0);
        assert_eq!(clip_length(3.0, Some(&info)), 3.0);
        assert_eq!(clip_length(10.0, None), 10.0);
        let total = clip_length(10.0, Some(&info));
        assert_eq!(resolve_window(1.0, Some(9.0), total).unwrap(), (1.0, 4.0));
    }

    struct Truncated {
        left: usize,
    }

    impl FrameSource for Truncated {
        fn dimensions(&self) -> (u32, u32) {
            (4, 4)
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.left == 0 {
                return Ok(None);
            }
            self.left -= 1;
            Ok(Some(Frame::blank(4, 4, 3)))
        }
    }

    #[test]
    fn short_source_is_alignment_error() {
        let timestamps = FrameTimestamps::new(1.0, 10.0);
        let mut anim = Animation {
            source: Box::new(Truncated { left: 6 }),
            pipeline: EffectPipeline::new(timestamps.len()),
            visualizer: None,
            timestamps,
            fps: 10.0,
            start: 0.0,
            duration: 1.0,
            audio_path: PathBuf::from("track.wav"),
        };
        let mut sink = Collect::default();
        match anim.render(&mut sink) {
            Err(AnimError::Alignment { expected, got, .. }) => assert_eq!((expected, got), (10, 6)),
            other => panic!("expected alignment error, got {:?}", other.map(|s| s.frames)),
        }
        assert_eq!(sink.frames.len(), 6);
        assert!(!sink.finished);
    }

    #[test]
    fn unknown_effect_fails_before_rendering() {
        let f = fixture(&[0; 8000], 8000);
        let req = AnimationRequest {
            effects: vec!["sparkle".into()],
            ..request(&f)
        };
        assert!(matches!(
            Animation::prepare(&req),
            Err(AnimError::Configuration { .. })
        ));
    }

    #[test]
    fn failed_render_publishes_nothing() {
        let f = fixture(&[0; 8000], 8000);
        let req = AnimationRequest {
            output: f.dir.path().to_path_buf(),
            ..request(&f)
        };
        assert!(create_animation(&req).is_err());
        let entries: Vec<_> = std::fs::read_dir(f.dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert!(!entries.iter().any(|n| n.starts_with(".dancing-art-")));
    }
}
