use image::imageops::{self, FilterType};

use crate::error::{AnimError, Result};
use crate::render::frame::Frame;

/// Scale about the centre by `1 + max_zoom * signal`, keeping the frame size.
///
/// Zooming in crops the centred region that will remain visible and resizes it
/// up to the full frame. Zooming out resizes the whole frame down and pads it
/// with black, centred.
pub fn zoom(frame: &Frame, signal: f32, max_zoom: f32) -> Result<Frame> {
    frame.ensure_rgb("zoom")?;

    let zoom_factor = 1.0 + max_zoom as f64 * signal as f64;
    if zoom_factor == 1.0 || frame.width == 0 || frame.height == 0 {
        return Ok(frame.clone());
    }
    if !(zoom_factor > 0.0) || !zoom_factor.is_finite() {
        return Err(AnimError::effect(
            "zoom",
            format!("zoom factor {} is not positive", zoom_factor),
        ));
    }

    let (width, height) = (frame.width, frame.height);
    let new_w = ((width as f64 * zoom_factor) as u32).max(1);
    let new_h = ((height as f64 * zoom_factor) as u32).max(1);

    // Visible box in scaled coordinates, mapped back to source pixels.
    let x1 = new_w.saturating_sub(width) / 2;
    let y1 = new_h.saturating_sub(height) / 2;
    let to_src = |v: u32, limit: u32| ((v as f64 / zoom_factor) as u32).min(limit);
    let (sx1, sy1) = (to_src(x1, width - 1), to_src(y1, height - 1));
    let sx2 = to_src(x1 + width, width).max(sx1 + 1);
    let sy2 = to_src(y1 + height, height).max(sy1 + 1);

    let source = frame.to_rgb_image("zoom")?;
    let cropped = imageops::crop_imm(&source, sx1, sy1, sx2 - sx1, sy2 - sy1).to_image();

    let resize_w = new_w.min(width);
    let resize_h = new_h.min(height);
    let resized = imageops::resize(&cropped, resize_w, resize_h, FilterType::Triangle);

    let pad_left = (width - resize_w) / 2;
    let pad_top = (height - resize_h) / 2;

    let mut out = Frame::blank(width, height, 3);
    let dst_stride = out.row_bytes();
    let src_stride = resize_w as usize * 3;
    let raw = resized.as_raw();
    for y in 0..resize_h as usize {
        let dst = (y + pad_top as usize) * dst_stride + pad_left as usize * 3;
        out.data[dst..dst + src_stride].copy_from_slice(&raw[y * src_stride..(y + 1) * src_stride]);
    }

    if out.shape() != frame.shape() {
        return Err(AnimError::effect(
            "zoom",
            format!(
                "output {}x{} differs from input {}x{}",
                out.width, out.height, frame.width, frame.height
            ),
        ));
    }
    Ok(out)
}
