//! Presentation surfaces: where each composited frame ends up.

use crate::foundation::core::Frame;
use crate::foundation::error::ChromaResult;

/// A raster target that displays full frames and can be read back.
///
/// `write_frame` receives a borrowed buffer; implementations copy what they keep, so the
/// compositor retains exclusive ownership of its composite buffer.
pub trait PresentationSurface {
    /// Size the surface before a frame of `width`x`height` is written.
    fn set_size(&mut self, width: u32, height: u32);

    /// Display one full frame.
    fn write_frame(&mut self, frame: &Frame) -> ChromaResult<()>;

    /// Copy of what is currently displayed.
    fn read_back(&self) -> Frame;
}

/// In-memory surface for tests, snapshots and headless runs.
#[derive(Debug, Default)]
pub struct MemorySurface {
    width: u32,
    height: u32,
    frame: Frame,
    frames_written: u64,
}

impl MemorySurface {
    /// Create an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last size requested through [`PresentationSurface::set_size`].
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Borrow the displayed frame without copying.
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl PresentationSurface for MemorySurface {
    fn set_size(&mut self, width: u32, height: u32) {
        if (self.width, self.height) != (width, height) {
            self.width = width;
            self.height = height;
            self.frame.reset(width, height);
        }
    }

    fn write_frame(&mut self, frame: &Frame) -> ChromaResult<()> {
        self.frame.clone_from(frame);
        self.width = frame.width;
        self.height = frame.height;
        self.frames_written += 1;
        Ok(())
    }

    fn read_back(&self) -> Frame {
        self.frame.clone()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/present/memory.rs"]
mod tests;
