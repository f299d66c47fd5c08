use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{AnimError, Result};

/// Mono waveform plus its sample rate.
#[derive(Clone, Debug)]
pub struct AudioSignal {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioSignal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AnimError::decode("audio", "sample rate is 0"));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Copy out `[start, end)` seconds. `end` past the last sample is clamped.
    pub fn window(&self, start: f64, end: f64) -> AudioSignal {
        let sr = self.sample_rate as f64;
        let len = self.samples.len();
        let lo = ((start * sr) as usize).min(len);
        let hi = ((end * sr) as usize).clamp(lo, len);
        AudioSignal {
            samples: self.samples[lo..hi].to_vec(),
            sample_rate: self.sample_rate,
        }
    }
}

/// Decode the first audio track of `path` (audio file or video container) to mono.
pub fn decode_audio(path: &Path) -> Result<AudioSignal> {
    let file = std::fs::File::open(path).map_err(|e| AnimError::io(path, e))?;
    let what = path.display().to_string();

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut format = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AnimError::decode(what.clone(), format!("unsupported format: {}", e)))?
        .format;

    // Containers may list video tracks first; only audio tracks carry a rate.
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .ok_or_else(|| AnimError::decode(what.clone(), "no audio tracks found"))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AnimError::decode(what.clone(), "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AnimError::decode(what.clone(), e))?;

    let mut mono: Vec<f32> = Vec::new();
    let mut skipped = 0usize;
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(_)) => {
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        downmix(buf.samples(), spec.channels.count(), &mut mono);
    }

    if skipped > 0 {
        log::warn!("{}: skipped {} undecodable packets", what, skipped);
    }
    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.1}s",
        mono.len(),
        sample_rate,
        mono.len() as f64 / sample_rate as f64
    );

    AudioSignal::new(mono, sample_rate)
}

/// Average interleaved channels into `out`.
fn downmix(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// Mono 16-bit PCM WAV bytes, for tests that need a real file on disk.
#[cfg(test)]
pub(crate) fn pcm16_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVEfmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn window_slices_and_clamps() {
        let audio = AudioSignal::new((0..100).map(|i| i as f32).collect(), 10).unwrap();
        assert_eq!(audio.duration(), 10.0);

        let w = audio.window(2.0, 4.0);
        assert_eq!(w.samples.len(), 20);
        assert_eq!(w.samples[0], 20.0);

        let tail = audio.window(8.0, 50.0);
        assert_eq!(tail.samples.len(), 20);

        let empty = audio.window(20.0, 30.0);
        assert!(empty.samples.is_empty());
    }

    #[test]
    fn downmix_averages_channels() {
        let mut out = Vec::new();
        downmix(&[1.0, 3.0, -2.0, 2.0], 2, &mut out);
        assert_eq!(out, vec![2.0, 0.0]);
        downmix(&[0.5], 1, &mut out);
        assert_eq!(out, vec![2.0, 0.0, 0.5]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = decode_audio(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, AnimError::Io { .. }));
    }

    #[test]
    fn garbage_file_is_decode_error() {
        let mut file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        file.write_all(b"this is not a riff header at all").unwrap();
        let err = decode_audio(file.path()).unwrap_err();
        assert!(matches!(err, AnimError::Decode { .. }));
    }

    #[test]
    fn decodes_pcm_wav() {
        let sr = 8000u32;
        let samples: Vec<i16> = (0..sr).map(|i| ((i % 50) as i16 - 25) * 100).collect();
        let bytes = pcm16_wav(&samples, sr);

        let mut file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        file.write_all(&bytes).unwrap();

        let audio = decode_audio(file.path()).unwrap();
        assert_eq!(audio.sample_rate, sr);
        assert_eq!(audio.samples.len(), sr as usize);
    }
}
