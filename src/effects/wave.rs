use std::f32::consts::PI;

use crate::error::Result;
use crate::render::frame::Frame;

/// Shift each row horizontally (with wrap-around) by a sine of the row position.
///
/// Amplitude is `mag * signal`, phase `-2π * signal`, and `freq` full cycles
/// span the frame height. Offsets truncate toward zero, so `signal == 0` and
/// `mag == 0` leave the frame untouched.
pub fn sin_wave_distortion(frame: &Frame, signal: f32, mag: f32, freq: f32) -> Result<Frame> {
    frame.ensure_rgb("sin_wave")?;

    let height = frame.height as usize;
    let width = frame.width as usize;
    let amplitude = mag * signal;
    let phase = -2.0 * PI * signal;

    let mut out = frame.clone();
    if width == 0 {
        return Ok(out);
    }

    let stride = frame.row_bytes();
    for y in 0..height {
        let offset = row_offset(y, height, amplitude, freq, phase);
        let shift = offset.rem_euclid(width as i64) as usize;
        if shift == 0 {
            continue;
        }
        let row = &mut out.data[y * stride..(y + 1) * stride];
        row.rotate_right(shift * frame.channels);
    }
    Ok(out)
}

fn row_offset(y: usize, height: usize, amplitude: f32, freq: f32, phase: f32) -> i64 {
    let pos = y as f32 / height as f32;
    (amplitude * (2.0 * PI * freq * pos + phase).sin()) as i64
}
