use std::path::Path;

use crate::foundation::core::Frame;
use crate::foundation::error::ChromaResult;
use crate::source::FrameSource;

/// A source that keeps handing out one frame until it is replaced or cleared.
///
/// Used for still-image inputs and as a controllable stand-in for live sources.
#[derive(Clone, Debug, Default)]
pub struct StillSource {
    frame: Frame,
}

impl StillSource {
    /// A source with nothing loaded (reports `0x0`).
    pub fn new() -> Self {
        Self::default()
    }

    /// A source that serves `frame`.
    pub fn from_frame(frame: Frame) -> Self {
        Self { frame }
    }

    /// Decode an image file and serve it.
    pub fn open(path: &Path) -> ChromaResult<Self> {
        Ok(Self::from_frame(Frame::load_image(path)?))
    }

    /// Replace the served frame.
    pub fn set_frame(&mut self, frame: Frame) {
        self.frame = frame;
    }

    /// Drop the frame so the source reports not ready.
    pub fn clear(&mut self) {
        self.frame = Frame::empty();
    }
}

impl FrameSource for StillSource {
    fn current_frame(&mut self) -> &Frame {
        &self.frame
    }

    fn native_width(&self) -> u32 {
        self.frame.width
    }

    fn native_height(&self) -> u32 {
        self.frame.height
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/still.rs"]
mod tests;
