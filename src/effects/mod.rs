pub mod chroma;
pub mod noise;
pub mod sort;
pub mod wave;
pub mod zoom;

use serde::Deserialize;

use crate::error::{AnimError, Result};
use crate::render::frame::Frame;

/// Which decomposed signal drives an effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Band {
    Low,
    High,
}

/// Tunable magnitudes, read from the `[effect_params]` config table.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EffectParams {
    pub wave_mag: f32,
    pub wave_freq: f32,
    pub chroma_mag: f32,
    pub zoom_max: f32,
    pub noise_mag: f32,
    pub sort_multiplier: f32,
    pub sort_reverse: bool,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            wave_mag: 10.0,
            wave_freq: 20.0,
            chroma_mag: 10.0,
            zoom_max: 0.10,
            noise_mag: 5.0,
            sort_multiplier: 2.0,
            sort_reverse: true,
        }
    }
}

/// A frame transform `(Frame, signal) -> Frame` of identical shape.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    ChromaticAberration { mag: f32 },
    SinWave { mag: f32, freq: f32 },
    Zoom { max_zoom: f32 },
    NoiseBands { mag: f32 },
    PixelSort { multiplier: f32, reverse: bool },
}

impl Effect {
    pub fn from_name(name: &str, params: &EffectParams) -> Result<Self> {
        Ok(match name {
            "chromatic_aberration" => Effect::ChromaticAberration {
                mag: params.chroma_mag,
            },
            "sin_wave" => Effect::SinWave {
                mag: params.wave_mag,
                freq: params.wave_freq,
            },
            "zoom" => Effect::Zoom {
                max_zoom: params.zoom_max,
            },
            "noise_bands" => Effect::NoiseBands {
                mag: params.noise_mag,
            },
            "pixel_sort" => Effect::PixelSort {
                multiplier: params.sort_multiplier,
                reverse: params.sort_reverse,
            },
            other => {
                return Err(AnimError::config(
                    "effects",
                    format!(
                        "unknown effect '{}' (known: chromatic_aberration, sin_wave, zoom, noise_bands, pixel_sort)",
                        other
                    ),
                ))
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Effect::ChromaticAberration { .. } => "chromatic_aberration",
            Effect::SinWave { .. } => "sin_wave",
            Effect::Zoom { .. } => "zoom",
            Effect::NoiseBands { .. } => "noise_bands",
            Effect::PixelSort { .. } => "pixel_sort",
        }
    }

    /// Zoom follows the low band; everything else follows the high band.
    pub fn band(&self) -> Band {
        match self {
            Effect::Zoom { .. } => Band::Low,
            _ => Band::High,
        }
    }

    pub fn apply(&self, frame: &Frame, signal: f32) -> Result<Frame> {
        match *self {
            Effect::ChromaticAberration { mag } => chroma::chromatic_aberration(frame, signal, mag),
            Effect::SinWave { mag, freq } => wave::sin_wave_distortion(frame, signal, mag, freq),
            Effect::Zoom { max_zoom } => zoom::zoom(frame, signal, max_zoom),
            Effect::NoiseBands { mag } => noise::noise_bands(frame, signal, mag),
            Effect::PixelSort {
                multiplier,
                reverse,
            } => sort::pixel_sort(frame, signal, multiplier, reverse),
        }
    }
}

/// Expand presets into effect names, keeping declared order.
pub fn expand_effects(effects: &[String]) -> Vec<String> {
    let mut result = Vec::new();
    for e in effects {
        match e.trim() {
            "none" => return Vec::new(),
            "default" => {
                result.extend_from_slice(&[
                    "chromatic_aberration".into(),
                    "sin_wave".into(),
                    "zoom".into(),
                ]);
            }
            "all" => {
                result.extend_from_slice(&[
                    "chromatic_aberration".into(),
                    "sin_wave".into(),
                    "noise_bands".into(),
                    "pixel_sort".into(),
                    "zoom".into(),
                ]);
            }
            "" => {}
            other => result.push(other.to_string()),
        }
    }
    result
}

/// Resolve a list of names/presets into effects. An empty list means `default`.
pub fn resolve_effects(names: &[String], params: &EffectParams) -> Result<Vec<Effect>> {
    let names = if names.is_empty() {
        vec!["default".to_string()]
    } else {
        names.to_vec()
    };
    expand_effects(&names)
        .iter()
        .map(|n| Effect::from_name(n, params))
        .collect()
}
