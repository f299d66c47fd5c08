use rayon::prelude::*;

use super::stft::{self, StftParams, WindowKind};

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filterbank over `[0, sr / 2]`, area-normalised.
/// Returns `n_mels` rows of `n_fft / 2 + 1` weights.
pub fn filterbank(sample_rate: u32, n_fft: usize, n_mels: usize) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let nyquist = sample_rate as f64 / 2.0;
    let fft_freqs: Vec<f64> = (0..n_bins)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let max_mel = hz_to_mel(nyquist);
    let mel_f: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(max_mel * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|i| {
            let lower_width = mel_f[i + 1] - mel_f[i];
            let upper_width = mel_f[i + 2] - mel_f[i + 1];
            let enorm = 2.0 / (mel_f[i + 2] - mel_f[i]);
            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - mel_f[i]) / lower_width;
                    let upper = (mel_f[i + 2] - f) / upper_width;
                    (lower.min(upper).max(0.0) * enorm) as f32
                })
                .collect()
        })
        .collect()
}

/// Mel spectrogram: `filterbank · |STFT|^power`, one `n_mels` vector per frame.
pub fn melspectrogram(
    samples: &[f32],
    sample_rate: u32,
    params: &StftParams,
    window: WindowKind,
    center: bool,
    power: f32,
    n_mels: usize,
) -> Vec<Vec<f32>> {
    let w = stft::window(window, params.win_length, params.n_fft);
    let spectrum = stft::stft(samples, params.n_fft, params.hop_length, &w, center);
    let bank = filterbank(sample_rate, params.n_fft, n_mels);

    spectrum
        .par_iter()
        .map(|frame| {
            let mags: Vec<f32> = frame.iter().map(|c| c.norm().powf(power)).collect();
            bank.iter()
                .map(|weights| weights.iter().zip(&mags).map(|(w, m)| w * m).sum())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_scale_round_trips() {
        for hz in [0.0, 440.0, 1000.0, 4000.0, 11025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn filterbank_shape_and_non_negative() {
        let bank = filterbank(22050, 2048, 128);
        assert_eq!(bank.len(), 128);
        assert!(bank.iter().all(|row| row.len() == 1025));
        assert!(bank.iter().flatten().all(|&w| w >= 0.0));
        // every filter covers at least one bin except possibly the narrowest low ones
        let covered = bank.iter().filter(|row| row.iter().any(|&w| w > 0.0)).count();
        assert!(covered > 100);
    }

    #[test]
    fn tone_lands_in_matching_band() {
        let sr = 22050;
        let samples: Vec<f32> = (0..sr)
            .map(|i| (2.0 * std::f32::consts::PI * 3000.0 * i as f32 / sr as f32).sin())
            .collect();
        let params = StftParams::derive(sr as u32, 30.0, 4.0).unwrap();
        let mel = melspectrogram(&samples, sr as u32, &params, WindowKind::Blackman, false, 1.0, 64);
        assert!(!mel.is_empty());
        let frame = &mel[mel.len() / 2];
        let peak = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let max_mel = hz_to_mel(11025.0);
        let centre_hz = mel_to_hz(max_mel * (peak + 1) as f64 / 65.0);
        assert!((centre_hz - 3000.0).abs() < 400.0, "peak band centred at {}", centre_hz);
    }
}
