//! Frame sources: the two inputs the compositor reads every tick.

pub(crate) mod camera;
pub(crate) mod media;
pub(crate) mod still;

use crate::foundation::core::{Frame, SourceGeometry};

/// A provider of sequential raster frames with a known native size.
///
/// Implementations must be cheap to query repeatedly. A source that is not loaded or not active
/// reports `0x0` and hands out an empty frame; the compositor treats that as "not ready" rather
/// than as an error.
pub trait FrameSource {
    /// Most recently available frame, or an empty frame when not ready.
    fn current_frame(&mut self) -> &Frame;

    /// Native width in pixels, `0` when not ready.
    fn native_width(&self) -> u32;

    /// Native height in pixels, `0` when not ready.
    fn native_height(&self) -> u32;

    /// Native geometry as reported right now.
    fn geometry(&self) -> SourceGeometry {
        SourceGeometry::new(self.native_width(), self.native_height())
    }

    /// `true` when the source has non-zero dimensions.
    fn is_ready(&self) -> bool {
        !self.geometry().is_empty()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn current_frame(&mut self) -> &Frame {
        (**self).current_frame()
    }

    fn native_width(&self) -> u32 {
        (**self).native_width()
    }

    fn native_height(&self) -> u32 {
        (**self).native_height()
    }
}
