use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;

use crate::error::{AnimError, Result};

/// Analysis sizes derived from the sample rate, the video frame rate and the
/// frame smoothing factor. The hop is tied to the video frame duration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StftParams {
    pub hop_length: usize,
    pub win_length: usize,
    pub n_fft: usize,
}

impl StftParams {
    pub fn derive(sample_rate: u32, frame_rate: f64, frame_smoothing: f64) -> Result<Self> {
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(AnimError::config(
                "frame_rate",
                format!("must be a positive number, got {}", frame_rate),
            ));
        }
        if !frame_smoothing.is_finite() || frame_smoothing <= 0.0 {
            return Err(AnimError::config(
                "frame_smoothing",
                format!("must be a positive number, got {}", frame_smoothing),
            ));
        }

        let hop = (sample_rate as f64 / frame_rate).round();
        if hop < 1.0 {
            return Err(AnimError::config(
                "frame_rate",
                format!(
                    "{} fps at {}Hz gives a hop length below one sample",
                    frame_rate, sample_rate
                ),
            ));
        }
        let hop_length = hop as usize;

        let win = (frame_smoothing * sample_rate as f64 / frame_rate).round();
        if win < 1.0 {
            return Err(AnimError::config(
                "frame_smoothing",
                format!("{} gives a window shorter than one sample", frame_smoothing),
            ));
        }
        let win_length = win as usize;
        let n_fft = win_length.next_power_of_two();

        Ok(Self {
            hop_length,
            win_length,
            n_fft,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowKind {
    Hann,
    Blackman,
}

/// Periodic window of `win_length` samples, zero-padded and centred in `n_fft`.
pub fn window(kind: WindowKind, win_length: usize, n_fft: usize) -> Vec<f32> {
    let n = win_length as f32;
    let w: Vec<f32> = (0..win_length)
        .map(|i| {
            let x = 2.0 * PI * i as f32 / n;
            match kind {
                WindowKind::Hann => 0.5 - 0.5 * x.cos(),
                WindowKind::Blackman => 0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
            }
        })
        .collect();

    let mut padded = vec![0.0f32; n_fft];
    let lpad = (n_fft - win_length.min(n_fft)) / 2;
    for (i, v) in w.into_iter().take(n_fft).enumerate() {
        padded[lpad + i] = v;
    }
    padded
}

/// Short-time Fourier transform. Returns one `n_fft / 2 + 1` bin vector per frame.
///
/// With `center == false`, frame `j` covers samples `[j * hop, j * hop + n_fft)`.
/// A signal shorter than one window is zero-padded to a single frame.
/// With `center == true` the signal is reflect-padded by `n_fft / 2` first.
pub fn stft(
    samples: &[f32],
    n_fft: usize,
    hop_length: usize,
    window: &[f32],
    center: bool,
) -> Vec<Vec<Complex<f32>>> {
    if samples.is_empty() {
        return Vec::new();
    }

    let padded: Vec<f32>;
    let signal: &[f32] = if center {
        padded = reflect_pad(samples, n_fft / 2);
        &padded
    } else if samples.len() < n_fft {
        let mut p = samples.to_vec();
        p.resize(n_fft, 0.0);
        padded = p;
        &padded
    } else {
        samples
    };

    let n_frames = 1 + (signal.len() - n_fft) / hop_length;
    let n_bins = n_fft / 2 + 1;

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);

    (0..n_frames)
        .into_par_iter()
        .map(|j| {
            let start = j * hop_length;
            let mut buffer: Vec<Complex<f32>> = signal[start..start + n_fft]
                .iter()
                .zip(window)
                .map(|(&s, &w)| Complex::new(s * w, 0.0))
                .collect();
            fft.process(&mut buffer);
            buffer.truncate(n_bins);
            buffer
        })
        .collect()
}

/// Inverse of a centred `stft`, by windowed overlap-add. Output is cut or
/// zero-extended to exactly `length` samples.
pub fn istft(
    frames: &[Vec<Complex<f32>>],
    n_fft: usize,
    hop_length: usize,
    window: &[f32],
    length: usize,
) -> Vec<f32> {
    if frames.is_empty() {
        return vec![0.0; length];
    }

    let mut planner = FftPlanner::<f32>::new();
    let ifft = planner.plan_fft_inverse(n_fft);

    let expected_len = n_fft + hop_length * (frames.len() - 1);
    let mut y = vec![0.0f32; expected_len];
    let mut win_sum = vec![0.0f32; expected_len];
    let scale = 1.0 / n_fft as f32;

    for (j, frame) in frames.iter().enumerate() {
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        for (k, c) in frame.iter().enumerate().take(n_fft / 2 + 1) {
            buffer[k] = *c;
            if k > 0 && k < n_fft - k {
                buffer[n_fft - k] = c.conj();
            }
        }
        ifft.process(&mut buffer);

        let start = j * hop_length;
        for i in 0..n_fft {
            y[start + i] += buffer[i].re * scale * window[i];
            win_sum[start + i] += window[i] * window[i];
        }
    }

    for (v, w) in y.iter_mut().zip(&win_sum) {
        if *w > f32::MIN_POSITIVE {
            *v /= *w;
        }
    }

    let offset = n_fft / 2;
    let mut out: Vec<f32> = y.into_iter().skip(offset).take(length).collect();
    out.resize(length, 0.0);
    out
}

/// Timestamp of each analysis frame: the sample at the middle of its window.
pub fn frame_times(n_frames: usize, hop_length: usize, n_fft: usize, sample_rate: u32) -> Vec<f64> {
    let offset = n_fft / 2;
    (0..n_frames)
        .map(|j| (j * hop_length + offset) as f64 / sample_rate as f64)
        .collect()
}

fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    let n = samples.len();
    let mut out = Vec::with_capacity(n + 2 * pad);
    let at = |i: isize| -> f32 {
        if n == 1 {
            return samples[0];
        }
        let period = 2 * (n as isize - 1);
        let mut m = i.rem_euclid(period);
        if m >= n as isize {
            m = period - m;
        }
        samples[m as usize]
    };
    for i in -(pad as isize)..(n + pad) as isize {
        out.push(at(i));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_sizes_from_frame_rate() {
        let p = StftParams::derive(44100, 30.0, 4.0).unwrap();
        assert_eq!(p.hop_length, 1470);
        assert_eq!(p.win_length, 5880);
        assert_eq!(p.n_fft, 8192);
        assert!(p.n_fft >= p.win_length);
    }

    #[test]
    fn rejects_sub_sample_hop() {
        let err = StftParams::derive(100, 1000.0, 4.0).unwrap_err();
        assert!(matches!(err, AnimError::Configuration { ref param, .. } if param == "frame_rate"));
        assert!(StftParams::derive(44100, 0.0, 4.0).is_err());
        assert!(StftParams::derive(44100, 30.0, 0.0).is_err());
    }

    #[test]
    fn blackman_window_is_centred() {
        let w = window(WindowKind::Blackman, 6, 8);
        assert_eq!(w.len(), 8);
        assert_eq!(w[0], 0.0);
        assert_eq!(w[7], 0.0);
        assert!(w[1].abs() < 1e-6); // periodic blackman starts at ~0
        assert!(w[4] > 0.9);
    }

    #[test]
    fn uncentred_frames_start_at_hop_multiples() {
        let samples: Vec<f32> = (0..100).map(|i| if i == 40 { 1.0 } else { 0.0 }).collect();
        let w = vec![1.0; 16];
        let frames = stft(&samples, 16, 10, &w, false);
        assert_eq!(frames.len(), 1 + (100 - 16) / 10);
        // The impulse at 40 is seen by frames 3 and 4 only (start 30 and 40)
        let energy: Vec<f32> = frames.iter().map(|f| f[0].norm()).collect();
        assert_eq!(energy[2], 0.0);
        assert!(energy[3] > 0.0);
        assert!(energy[4] > 0.0);
        assert_eq!(energy[5], 0.0);
    }

    #[test]
    fn short_signal_gives_one_frame() {
        let w = window(WindowKind::Blackman, 64, 64);
        let frames = stft(&[0.5; 10], 64, 16, &w, false);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 33);
    }

    #[test]
    fn istft_reconstructs_signal() {
        let n_fft = 256;
        let hop = 64;
        let w = window(WindowKind::Hann, n_fft, n_fft);
        let samples: Vec<f32> = (0..2000).map(|i| (i as f32 * 0.05).sin()).collect();
        let frames = stft(&samples, n_fft, hop, &w, true);
        let back = istft(&frames, n_fft, hop, &w, samples.len());
        assert_eq!(back.len(), samples.len());
        for i in 200..1800 {
            assert!((back[i] - samples[i]).abs() < 1e-3, "sample {}", i);
        }
    }

    #[test]
    fn frame_times_use_window_middle() {
        let t = frame_times(3, 1470, 8192, 44100);
        assert!((t[0] - 4096.0 / 44100.0).abs() < 1e-12);
        assert!((t[2] - (2940.0 + 4096.0) / 44100.0).abs() < 1e-12);
    }
}
