/// A scalar per timestamp. Timestamps are seconds, strictly increasing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeries {
    pub times: Vec<f64>,
    pub values: Vec<f32>,
}

impl TimeSeries {
    pub fn new(times: Vec<f64>, values: Vec<f32>) -> Self {
        debug_assert_eq!(times.len(), values.len());
        Self { times, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Min-max scale the values into [0, 1] in place.
    pub fn normalize(&mut self) {
        normalize(&mut self.values);
    }
}

/// The two activation series decomposed from the percussive spectrogram.
#[derive(Clone, Debug, Default)]
pub struct Signals {
    pub low: TimeSeries,
    pub high: TimeSeries,
}

/// Min-max scale into [0, 1]. A constant (or empty) series becomes all zeros.
/// Non-finite entries are treated as zero.
pub fn normalize(values: &mut [f32]) {
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }

    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;

    if !(range > 0.0) || !range.is_finite() {
        values.iter_mut().for_each(|v| *v = 0.0);
        return;
    }

    for v in values.iter_mut() {
        *v = ((*v - min) / range).clamp(0.0, 1.0);
    }
}
