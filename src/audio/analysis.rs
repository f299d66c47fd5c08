use super::decode::AudioSignal;
use super::features::{Signals, TimeSeries};
use super::stft::{self, StftParams, WindowKind};
use super::{hpss, mel, nmf, recurrence};
use crate::error::Result;

const N_MELS: usize = 128;
const HPSS_MARGIN: f32 = 1.0;

#[derive(Clone, Copy, Debug)]
pub struct ExtractOptions {
    pub frame_rate: f64,
    pub frame_smoothing: f64,
    /// Smooth the spectrogram with the recurrence filter before decomposing
    pub recurrence: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            frame_rate: 30.0,
            frame_smoothing: 4.0,
            recurrence: true,
        }
    }
}

/// Decompose `audio` into normalised "low" and "high" activation series.
///
/// 1. percussive part by harmonic/percussive separation
/// 2. mel spectrogram (magnitude, blackman window, uncentred frames)
/// 3. optional recurrence smoothing
/// 4. two-factor NMF, activations min-max normalised
pub fn extract_signals(audio: &AudioSignal, opts: &ExtractOptions) -> Result<Signals> {
    let sr = audio.sample_rate;
    let params = StftParams::derive(sr, opts.frame_rate, opts.frame_smoothing)?;
    log::info!(
        "STFT: hop={} win={} n_fft={} ({} bins, {:.2} fps, smoothing {})",
        params.hop_length,
        params.win_length,
        params.n_fft,
        params.n_bins(),
        opts.frame_rate,
        opts.frame_smoothing
    );

    if audio.samples.is_empty() {
        log::warn!("Audio window is empty, all signals will be zero");
        return Ok(Signals::default());
    }

    log::info!("Pass 1: Harmonic/percussive separation...");
    let percussive = hpss::percussive(&audio.samples, HPSS_MARGIN);

    log::info!("Pass 2: Mel spectrogram...");
    let mut spec = mel::melspectrogram(
        &percussive,
        sr,
        &params,
        WindowKind::Blackman,
        false,
        1.0,
        N_MELS,
    );

    if opts.recurrence {
        log::info!("Pass 3: Recurrence smoothing ({} frames)...", spec.len());
        spec = recurrence::smooth(&spec);
    }

    log::info!("Pass 4: Decomposition...");
    let decomposition = nmf::decompose(&spec, 2);
    let peaks: Vec<usize> = decomposition.components.iter().map(|c| peak_band(c)).collect();
    log::debug!("Component peak mel bands (low, high): {:?}", peaks);
    let times = stft::frame_times(spec.len(), params.hop_length, params.n_fft, sr);

    let mut activations = decomposition.activations.into_iter();
    let mut low = TimeSeries::new(times.clone(), activations.next().unwrap_or_default());
    let mut high = TimeSeries::new(times, activations.next().unwrap_or_default());
    low.normalize();
    high.normalize();

    log::info!("Signals: {} analysis frames", low.len());
    Ok(Signals { low, high })
}

fn peak_band(component: &[f32]) -> usize {
    component
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}
