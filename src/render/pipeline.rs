use crate::align::AlignedSignal;
use crate::effects::{Band, Effect};
use crate::error::{AnimError, Result};

use super::frame::Frame;

/// An effect and the per-frame signal that gates it.
#[derive(Clone, Debug)]
pub struct EffectSpec {
    pub effect: Effect,
    pub signal: AlignedSignal,
}

/// Ordered, signal-gated effect chain. Stage order is the order of `push`.
#[derive(Clone, Debug)]
pub struct EffectPipeline {
    stages: Vec<EffectSpec>,
    frame_count: usize,
}

impl EffectPipeline {
    pub fn new(frame_count: usize) -> Self {
        Self {
            stages: Vec::new(),
            frame_count,
        }
    }

    /// Build a pipeline feeding each effect the band it follows.
    pub fn from_bands(effects: Vec<Effect>, low: &AlignedSignal, high: &AlignedSignal) -> Result<Self> {
        let mut pipeline = Self::new(low.len());
        for effect in effects {
            let signal = match effect.band() {
                Band::Low => low.clone(),
                Band::High => high.clone(),
            };
            pipeline.push(effect, signal)?;
        }
        Ok(pipeline)
    }

    pub fn push(&mut self, effect: Effect, signal: AlignedSignal) -> Result<()> {
        if signal.len() != self.frame_count {
            return Err(AnimError::Alignment {
                what: "effect signal",
                expected: self.frame_count,
                got: signal.len(),
            });
        }
        self.stages.push(EffectSpec { effect, signal });
        Ok(())
    }

    pub fn stages(&self) -> &[EffectSpec] {
        &self.stages
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Run frame `index` through every stage in order. A stage whose signal is
    /// exactly zero for this frame passes the frame through untouched.
    pub fn process(&self, index: usize, base: Frame) -> Result<Frame> {
        let mut frame = base;
        for stage in &self.stages {
            let signal = stage.signal.at(index);
            if signal == 0.0 {
                continue;
            }
            frame = stage.effect.apply(&frame, signal)?;
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectParams;

    fn frame() -> Frame {
        let data = (0..32 * 24 * 3).map(|i| (i * 13 % 256) as u8).collect();
        Frame::new(32, 24, 3, data).unwrap()
    }

    fn effect(name: &str) -> Effect {
        Effect::from_name(name, &EffectParams::default()).unwrap()
    }

    #[test]
    fn zero_signal_passes_through() {
        let mut p = EffectPipeline::new(3);
        p.push(effect("chromatic_aberration"), AlignedSignal::from_values(vec![0.0, 1.0, 0.0]))
            .unwrap();
        p.push(effect("zoom"), AlignedSignal::from_values(vec![0.0, 0.0, 0.0]))
            .unwrap();

        let base = frame();
        assert_eq!(p.process(0, base.clone()).unwrap(), base);
        assert_ne!(p.process(1, base.clone()).unwrap(), base);
        assert_eq!(p.process(2, base.clone()).unwrap(), base);
    }

    #[test]
    fn order_is_preserved() {
        let signal = AlignedSignal::from_values(vec![1.0]);
        let mut ab = EffectPipeline::new(1);
        ab.push(effect("chromatic_aberration"), signal.clone()).unwrap();
        ab.push(effect("zoom"), signal.clone()).unwrap();
        let mut ba = EffectPipeline::new(1);
        ba.push(effect("zoom"), signal.clone()).unwrap();
        ba.push(effect("chromatic_aberration"), signal).unwrap();

        let names: Vec<&str> = ab.stages().iter().map(|s| s.effect.name()).collect();
        assert_eq!(names, vec!["chromatic_aberration", "zoom"]);

        let base = frame();
        let expected = effect("zoom")
            .apply(&effect("chromatic_aberration").apply(&base, 1.0).unwrap(), 1.0)
            .unwrap();
        assert_eq!(ab.process(0, base.clone()).unwrap(), expected);
        assert_ne!(ab.process(0, base.clone()).unwrap(), ba.process(0, base).unwrap());
    }

    #[test]
    fn mismatched_signal_length_is_alignment_error() {
        let mut p = EffectPipeline::new(4);
        let err = p
            .push(effect("zoom"), AlignedSignal::from_values(vec![0.5; 3]))
            .unwrap_err();
        assert!(matches!(err, AnimError::Alignment { expected: 4, got: 3, .. }));
    }

    #[test]
    fn bands_route_to_effects() {
        let low = AlignedSignal::from_values(vec![0.0, 1.0]);
        let high = AlignedSignal::from_values(vec![1.0, 0.0]);
        let p = EffectPipeline::from_bands(
            vec![effect("chromatic_aberration"), effect("zoom")],
            &low,
            &high,
        )
        .unwrap();
        assert_eq!(p.stages()[0].signal, high);
        assert_eq!(p.stages()[1].signal, low);
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let p = EffectPipeline::new(0);
        let base = frame();
        assert_eq!(p.process(5, base.clone()).unwrap(), base);
    }
}
