use image::{ImageBuffer, Rgb, RgbImage};

use crate::error::{AnimError, Result};

/// Interleaved 8-bit pixels, row-major. Effects expect 3 channels (RGB);
/// overlays use 4 (RGBA).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, channels: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * channels;
        if data.len() != expected {
            return Err(AnimError::decode(
                "frame",
                format!(
                    "{}x{}x{} needs {} bytes, got {}",
                    width,
                    height,
                    channels,
                    expected,
                    data.len()
                ),
            ));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Fully transparent (or black, for RGB) frame.
    pub fn blank(width: u32, height: u32, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0; width as usize * height as usize * channels],
        }
    }

    pub fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            channels: 3,
            data: img.into_raw(),
        }
    }

    pub fn shape(&self) -> (u32, u32, usize) {
        (self.width, self.height, self.channels)
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.channels
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let stride = self.row_bytes();
        &self.data[y * stride..(y + 1) * stride]
    }

    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let idx = (y * self.width as usize + x) * self.channels;
        &self.data[idx..idx + self.channels]
    }

    /// Fail with an `EffectError` unless this is a 3-channel frame.
    pub fn ensure_rgb(&self, effect: &'static str) -> Result<()> {
        if self.channels != 3 {
            return Err(AnimError::effect(
                effect,
                format!("expected 3 channels (RGB), got {}", self.channels),
            ));
        }
        if self.data.len() != self.width as usize * self.height as usize * 3 {
            return Err(AnimError::effect(
                effect,
                format!(
                    "buffer of {} bytes does not match {}x{}",
                    self.data.len(),
                    self.width,
                    self.height
                ),
            ));
        }
        Ok(())
    }

    pub fn to_rgb_image(&self, effect: &'static str) -> Result<RgbImage> {
        self.ensure_rgb(effect)?;
        ImageBuffer::<Rgb<u8>, _>::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| AnimError::effect(effect, "frame buffer too small"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_buffer_length() {
        assert!(Frame::new(2, 2, 3, vec![0; 11]).is_err());
        assert!(Frame::new(2, 2, 3, vec![0; 12]).is_ok());
    }

    #[test]
    fn ensure_rgb_flags_channel_count() {
        let rgba = Frame::blank(4, 4, 4);
        let err = rgba.ensure_rgb("zoom").unwrap_err();
        assert!(matches!(err, AnimError::Effect { effect: "zoom", .. }));
        assert!(Frame::blank(4, 4, 3).ensure_rgb("zoom").is_ok());
    }

    #[test]
    fn pixel_and_row_access() {
        let data: Vec<u8> = (0..18).collect();
        let frame = Frame::new(3, 2, 3, data).unwrap();
        assert_eq!(frame.pixel(1, 1), &[12, 13, 14]);
        assert_eq!(frame.row(1).len(), 9);
        let img = frame.to_rgb_image("test").unwrap();
        assert_eq!(Frame::from_rgb_image(img), frame);
    }
}
