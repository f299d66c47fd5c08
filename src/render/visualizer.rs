use crate::align::{nearest_index, FrameTimestamps};
use crate::audio::decode::AudioSignal;
use crate::audio::features::normalize;
use crate::audio::mel;
use crate::audio::stft::{StftParams, WindowKind};
use crate::error::{AnimError, Result};

use super::frame::Frame;

pub const DEFAULT_BARS: usize = 64;
pub const DEFAULT_COLOR: [u8; 3] = [0xab, 0x20, 0xfd];

const BAR_FILL: f32 = 0.8;
const BAR_SCALE: f32 = 0.2;
const POWER: f32 = 0.5;

/// Bar-chart overlay driven by a mel spectrogram of the unseparated audio.
pub struct Visualizer {
    /// One column of `bars` values in [0, 1] per analysis frame
    columns: Vec<Vec<f32>>,
    times: Vec<f64>,
    color: [u8; 3],
}

impl Visualizer {
    pub fn analyze(audio: &AudioSignal, params: &StftParams, bars: usize, color: [u8; 3]) -> Result<Self> {
        if bars == 0 {
            return Err(AnimError::config("bars", "must be at least 1"));
        }

        let columns = mel::melspectrogram(
            &audio.samples,
            audio.sample_rate,
            params,
            WindowKind::Blackman,
            true,
            POWER,
            bars,
        );

        // One global min/max over the whole spectrogram.
        let mut flat: Vec<f32> = columns.iter().flatten().copied().collect();
        normalize(&mut flat);
        let columns: Vec<Vec<f32>> = flat.chunks(bars).map(|c| c.to_vec()).collect();

        let times = (0..columns.len())
            .map(|j| (j * params.hop_length) as f64 / audio.sample_rate as f64)
            .collect();

        log::info!("Visualizer: {} columns of {} bars", columns.len(), bars);
        Ok(Self {
            columns,
            times,
            color,
        })
    }

    /// Column index shown at each output frame.
    pub fn schedule(&self, frames: &FrameTimestamps) -> VisualizerClip<'_> {
        let picks = frames
            .as_slice()
            .iter()
            .map(|&t| nearest_index(&self.times, t))
            .collect();
        VisualizerClip { vis: self, picks }
    }

    /// Transparent RGBA frame with one bar per value, growing up from the bottom.
    pub fn draw(&self, values: &[f32], width: u32, height: u32) -> Frame {
        let mut frame = Frame::blank(width, height, 4);
        if values.is_empty() || width == 0 || height == 0 {
            return frame;
        }

        let slot = width as f32 / values.len() as f32;
        let stride = frame.row_bytes();
        for (i, &v) in values.iter().enumerate() {
            let bar_h = (v.clamp(0.0, 1.0) * BAR_SCALE * height as f32).round() as u32;
            if bar_h == 0 {
                continue;
            }
            let margin = slot * (1.0 - BAR_FILL) / 2.0;
            let x0 = (i as f32 * slot + margin).round() as u32;
            let x1 = ((i as f32 + 1.0) * slot - margin).round().max(x0 as f32 + 1.0) as u32;
            let x1 = x1.min(width);
            for y in height - bar_h.min(height)..height {
                for x in x0..x1 {
                    let idx = y as usize * stride + x as usize * 4;
                    frame.data[idx..idx + 4].copy_from_slice(&[self.color[0], self.color[1], self.color[2], 255]);
                }
            }
        }
        frame
    }
}

/// The overlay as a clip: exactly one pick per output frame.
pub struct VisualizerClip<'a> {
    vis: &'a Visualizer,
    picks: Vec<Option<usize>>,
}

impl VisualizerClip<'_> {
    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn frame(&self, index: usize, width: u32, height: u32) -> Result<Frame> {
        let pick = self.picks.get(index).ok_or(AnimError::Alignment {
            what: "visualizer frames",
            expected: index + 1,
            got: self.picks.len(),
        })?;
        let values = pick.map_or(&[][..], |c| self.vis.columns[c].as_slice());
        Ok(self.vis.draw(values, width, height))
    }
}

/// Source-over blend of an RGBA overlay onto an RGB frame of the same size.
pub fn composite(base: &Frame, overlay: &Frame) -> Result<Frame> {
    base.ensure_rgb("composite")?;
    if overlay.channels != 4 {
        return Err(AnimError::effect(
            "composite",
            format!("overlay needs 4 channels, got {}", overlay.channels),
        ));
    }
    if (base.width, base.height) != (overlay.width, overlay.height) {
        return Err(AnimError::Alignment {
            what: "overlay pixels",
            expected: base.width as usize * base.height as usize,
            got: overlay.width as usize * overlay.height as usize,
        });
    }

    let mut out = base.clone();
    for (dst, src) in out.data.chunks_exact_mut(3).zip(overlay.data.chunks_exact(4)) {
        let a = src[3] as u32;
        if a == 0 {
            continue;
        }
        for c in 0..3 {
            dst[c] = ((src[c] as u32 * a + dst[c] as u32 * (255 - a) + 127) / 255) as u8;
        }
    }
    Ok(out)
}

/// Parse "#rrggbb" (leading '#' optional).
pub fn parse_hex_color(s: &str) -> Result<[u8; 3]> {
    let hex = s.trim().trim_start_matches('#');
    let bad = || AnimError::config("visualizer.color", format!("'{}' is not a #rrggbb colour", s));
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(bad());
    }
    let mut rgb = [0u8; 3];
    for (i, c) in rgb.iter_mut().enumerate() {
        *c = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| bad())?;
    }
    Ok(rgb)
}
