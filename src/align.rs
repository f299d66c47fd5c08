use crate::audio::features::{normalize, TimeSeries};

/// Timestamps (seconds from the window start) at which output frames are sampled.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameTimestamps {
    times: Vec<f64>,
}

impl FrameTimestamps {
    /// `floor(duration * fps)` frames at `i / fps`. A tiny tolerance keeps
    /// e.g. 5s at 30fps from losing its last frame to rounding.
    pub fn new(duration: f64, fps: f64) -> Self {
        if !(duration > 0.0) || !(fps > 0.0) {
            return Self { times: Vec::new() };
        }
        let count = (duration * fps + 1e-6).floor() as usize;
        Self {
            times: (0..count).map(|i| i as f64 / fps).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.times
    }
}

/// One value per output frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AlignedSignal {
    values: Vec<f32>,
}

impl AlignedSignal {
    pub fn from_values(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value for frame `i`; frames past the end read as silence.
    pub fn at(&self, i: usize) -> f32 {
        self.values.get(i).copied().unwrap_or(0.0)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Index of the entry in sorted `times` nearest to `t`. Equidistant entries
/// resolve to the earlier one.
pub fn nearest_index(times: &[f64], t: f64) -> Option<usize> {
    if times.is_empty() {
        return None;
    }
    let idx = times.partition_point(|&x| x < t);
    if idx == 0 {
        return Some(0);
    }
    if idx == times.len() {
        return Some(times.len() - 1);
    }
    let before = t - times[idx - 1];
    let after = times[idx] - t;
    Some(if after < before { idx } else { idx - 1 })
}

/// Resample `series` onto the frame timestamps by nearest lookup, then min-max
/// normalise again over the frames actually shown.
pub fn align(series: &TimeSeries, frames: &FrameTimestamps) -> AlignedSignal {
    let mut values: Vec<f32> = frames
        .as_slice()
        .iter()
        .map(|&t| nearest_index(&series.times, t).map_or(0.0, |i| series.values[i]))
        .collect();
    normalize(&mut values);
    AlignedSignal { values }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_follows_duration() {
        assert_eq!(FrameTimestamps::new(1.0, 30.0).len(), 30);
        assert_eq!(FrameTimestamps::new(5.0, 30.0).len(), 150);
        assert_eq!(FrameTimestamps::new(0.01, 30.0).len(), 0);
        assert_eq!(FrameTimestamps::new(0.05, 30.0).len(), 1);
        assert_eq!(FrameTimestamps::new(2.0, 29.97).len(), 59);
        let ts = FrameTimestamps::new(1.0, 4.0);
        assert_eq!(ts.as_slice(), &[0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn nearest_breaks_ties_toward_earlier() {
        let times = [0.0, 1.0, 2.0];
        assert_eq!(nearest_index(&times, 0.5), Some(0));
        assert_eq!(nearest_index(&times, 0.51), Some(1));
        assert_eq!(nearest_index(&times, 1.5), Some(1));
        assert_eq!(nearest_index(&times, -3.0), Some(0));
        assert_eq!(nearest_index(&times, 9.0), Some(2));
        assert_eq!(nearest_index(&times, 2.0), Some(2));
        assert_eq!(nearest_index(&[], 1.0), None);
    }

    #[test]
    fn aligned_length_matches_frames() {
        let series = TimeSeries::new(vec![0.1, 0.2], vec![0.0, 1.0]);
        for duration in [0.04, 0.5, 3.0] {
            let frames = FrameTimestamps::new(duration, 30.0);
            assert_eq!(align(&series, &frames).len(), frames.len());
        }
    }

    #[test]
    fn renormalizes_after_resampling() {
        let series = TimeSeries::new(
            vec![0.0, 0.5, 1.0, 1.5],
            vec![0.0, 0.2, 0.6, 1.0],
        );
        // Frames only see the middle of the series.
        let frames = FrameTimestamps {
            times: vec![0.5, 1.0],
        };
        let aligned = align(&series, &frames);
        assert_eq!(aligned.values(), &[0.0, 1.0]);
    }

    #[test]
    fn empty_series_reads_as_silence() {
        let frames = FrameTimestamps::new(1.0, 10.0);
        let aligned = align(&TimeSeries::default(), &frames);
        assert_eq!(aligned.len(), 10);
        assert!(aligned.values().iter().all(|&v| v == 0.0));
        assert_eq!(aligned.at(99), 0.0);
    }

    #[test]
    fn empty_frames_give_empty_signal() {
        let series = TimeSeries::new(vec![0.0], vec![1.0]);
        let aligned = align(&series, &FrameTimestamps::new(0.0, 30.0));
        assert!(aligned.is_empty());
    }
}
