pub mod ffmpeg;

use crate::error::Result;
use crate::render::frame::Frame;

/// Destination for rendered frames.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and publish the output. Called once, after the last frame.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
