use crate::error::Result;
use crate::render::frame::Frame;

/// Offset the red plane left and the blue plane right by `trunc(mag * signal)`
/// pixels. Each plane rolls as one flat sequence, so pixels pushed off one row
/// re-enter on the neighbouring row. Green is untouched.
pub fn chromatic_aberration(frame: &Frame, signal: f32, mag: f32) -> Result<Frame> {
    frame.ensure_rgb("chromatic_aberration")?;

    let offset = (mag * signal) as i64;
    let n = frame.width as usize * frame.height as usize;
    if offset == 0 || n == 0 {
        return Ok(frame.clone());
    }

    let shift = offset.rem_euclid(n as i64) as usize;
    let mut out = frame.clone();
    for i in 0..n {
        // red: out[i] = in[i + offset]; blue: out[i] = in[i - offset]
        let from_right = (i + shift) % n;
        let from_left = (i + n - shift) % n;
        out.data[i * 3] = frame.data[from_right * 3];
        out.data[i * 3 + 2] = frame.data[from_left * 3 + 2];
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_at_zero() {
        let frame = Frame::new(3, 2, 3, (0..18).collect()).unwrap();
        assert_eq!(chromatic_aberration(&frame, 0.0, 10.0).unwrap(), frame);
        assert_eq!(chromatic_aberration(&frame, 0.7, 0.0).unwrap(), frame);
        // 10 * 0.05 truncates to 0
        assert_eq!(chromatic_aberration(&frame, 0.05, 10.0).unwrap(), frame);
    }

    #[test]
    fn red_left_blue_right_green_fixed() {
        // 4x1 frame, channel values encode pixel index
        let data = vec![0, 10, 20, 1, 11, 21, 2, 12, 22, 3, 13, 23];
        let frame = Frame::new(4, 1, 3, data).unwrap();
        let out = chromatic_aberration(&frame, 0.1, 10.0).unwrap();
        let red: Vec<u8> = (0..4).map(|x| out.pixel(x, 0)[0]).collect();
        let green: Vec<u8> = (0..4).map(|x| out.pixel(x, 0)[1]).collect();
        let blue: Vec<u8> = (0..4).map(|x| out.pixel(x, 0)[2]).collect();
        assert_eq!(red, vec![1, 2, 3, 0]);
        assert_eq!(green, vec![10, 11, 12, 13]);
        assert_eq!(blue, vec![23, 20, 21, 22]);
    }

    #[test]
    fn wraps_across_rows() {
        // 2x2: red plane [0,1,2,3] rolled left by one → [1,2,3,0]
        let mut data = vec![0u8; 12];
        for i in 0..4 {
            data[i * 3] = i as u8;
        }
        let frame = Frame::new(2, 2, 3, data).unwrap();
        let out = chromatic_aberration(&frame, 1.0, 1.0).unwrap();
        assert_eq!(out.pixel(1, 0)[0], 2);
        assert_eq!(out.pixel(1, 1)[0], 0);
    }
}
