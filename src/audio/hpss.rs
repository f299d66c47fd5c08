use rayon::prelude::*;
use rustfft::num_complex::Complex;

use super::stft::{self, WindowKind};

const N_FFT: usize = 2048;
const HOP: usize = 512;
const KERNEL: usize = 31;
const POWER: i32 = 2;

/// Percussive part of `samples` by median-filtering harmonic/percussive separation.
///
/// Harmonic energy is the median across time of each frequency row, percussive
/// energy the median across frequency of each frame. Soft masks with the given
/// margin select the percussive share of the complex spectrum, which is then
/// resynthesised at the input length.
pub fn percussive(samples: &[f32], margin: f32) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let window = stft::window(WindowKind::Hann, N_FFT, N_FFT);
    let spectrum = stft::stft(samples, N_FFT, HOP, &window, true);
    let n_frames = spectrum.len();
    let n_bins = N_FFT / 2 + 1;

    let mags: Vec<Vec<f32>> = spectrum
        .iter()
        .map(|frame| frame.iter().map(|c| c.norm()).collect())
        .collect();

    // Across time, per frequency bin. Stored bin-major, transposed back below.
    let harmonic_by_bin: Vec<Vec<f32>> = (0..n_bins)
        .into_par_iter()
        .map(|k| {
            let row: Vec<f32> = mags.iter().map(|frame| frame[k]).collect();
            median_filter(&row, KERNEL)
        })
        .collect();

    // Across frequency, per frame.
    let percussive_mags: Vec<Vec<f32>> = mags
        .par_iter()
        .map(|frame| median_filter(frame, KERNEL))
        .collect();

    let split_zeros = margin == 1.0;

    let masked: Vec<Vec<Complex<f32>>> = (0..n_frames)
        .into_par_iter()
        .map(|j| {
            (0..n_bins)
                .map(|k| {
                    let p = percussive_mags[j][k];
                    let h = harmonic_by_bin[k][j] * margin;
                    spectrum[j][k] * softmask(p, h, split_zeros)
                })
                .collect()
        })
        .collect();

    log::debug!("HPSS: {} frames, margin {}", n_frames, margin);

    stft::istft(&masked, N_FFT, HOP, &window, samples.len())
}

/// Share of `x` in `x + x_ref`, after raising both to `POWER`.
fn softmask(x: f32, x_ref: f32, split_zeros: bool) -> f32 {
    let z = x.max(x_ref);
    if z < f32::MIN_POSITIVE {
        return if split_zeros { 0.5 } else { 0.0 };
    }
    let m = (x / z).powi(POWER);
    let r = (x_ref / z).powi(POWER);
    m / (m + r)
}

/// Sliding median with half-sample symmetric reflection at the edges.
pub fn median_filter(values: &[f32], size: usize) -> Vec<f32> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let half = (size / 2) as isize;
    let mut scratch = vec![0.0f32; size];
    (0..n as isize)
        .map(|i| {
            for (s, offset) in scratch.iter_mut().zip(-half..=half) {
                *s = values[reflect_index(i + offset, n)];
            }
            let mid = size / 2;
            let (_, median, _) = scratch.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
            *median
        })
        .collect()
}

fn reflect_index(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    (if m < n { m } else { period - 1 - m }) as usize
}
