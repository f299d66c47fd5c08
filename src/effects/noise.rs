use crate::error::Result;
use crate::render::frame::Frame;

const MAX_LUMINOSITY: f32 = 0.75;

/// Overlay `trunc(mag * signal)` full-width bands of grey noise.
///
/// Each band starts at a pseudo-random row, is `1..=thickness` rows tall, and is
/// blended at half opacity using the lighter of the pixel and the noise value.
/// The random stream is seeded from the signal value, so a given input always
/// produces the same output.
pub fn noise_bands(frame: &Frame, signal: f32, mag: f32) -> Result<Frame> {
    frame.ensure_rgb("noise_bands")?;

    let count = (mag * signal) as i64;
    let thickness = count.max(1) as usize;
    let (width, height) = (frame.width as usize, frame.height as usize);
    if count <= 0 || height == 0 || width == 0 {
        return Ok(frame.clone());
    }

    let mut rng = fastrand::Rng::with_seed(signal.to_bits() as u64 ^ 0x9e37_79b9_7f4a_7c15);
    let mut out = frame.clone();
    let stride = frame.row_bytes();

    for _ in 0..count {
        let top = rng.usize(..height);
        let band = rng.usize(1..=thickness);
        for y in top..(top + band).min(height) {
            let row = &mut out.data[y * stride..(y + 1) * stride];
            for px in row.chunks_exact_mut(3) {
                let grey = (rng.f32() * MAX_LUMINOSITY * 255.0).round() as u16;
                for c in px.iter_mut() {
                    let lighter = (*c as u16).max(grey);
                    // alpha 128 over the source pixel
                    *c = ((lighter * 128 + *c as u16 * 127) / 255) as u8;
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_below_one_band() {
        let frame = Frame::new(8, 8, 3, vec![90; 192]).unwrap();
        assert_eq!(noise_bands(&frame, 0.0, 5.0).unwrap(), frame);
        assert_eq!(noise_bands(&frame, 0.1, 5.0).unwrap(), frame);
    }

    #[test]
    fn bands_only_brighten_and_keep_shape() {
        let frame = Frame::new(16, 32, 3, vec![10; 16 * 32 * 3]).unwrap();
        let out = noise_bands(&frame, 1.0, 5.0).unwrap();
        assert_eq!(out.shape(), frame.shape());
        assert!(out.data.iter().all(|&v| v >= 10));
        assert_ne!(out, frame);
        // Deterministic for the same input
        assert_eq!(noise_bands(&frame, 1.0, 5.0).unwrap(), out);
    }

    #[test]
    fn seed_follows_signal() {
        let frame = Frame::new(16, 64, 3, vec![10; 16 * 64 * 3]).unwrap();
        let a = noise_bands(&frame, 0.8, 5.0).unwrap();
        let b = noise_bands(&frame, 0.9, 5.0).unwrap();
        assert_ne!(a, b);
        assert_eq!(noise_bands(&frame, 0.8, 5.0).unwrap(), a);
    }
}
