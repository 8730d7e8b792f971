use crate::foundation::core::Frame;
use crate::foundation::error::{ChromaError, ChromaResult};
use crate::source::FrameSource;

/// Foreground capture session wrapper.
///
/// The feed is inactive until [`CameraFeed::begin`] opens a session; while inactive it reports
/// `0x0`, which is all the compositor ever observes of a denied or stopped camera.
#[derive(Debug)]
pub struct CameraFeed<S> {
    session: Option<S>,
    empty: Frame,
}

impl<S: FrameSource> CameraFeed<S> {
    /// An inactive feed.
    pub fn new() -> Self {
        Self {
            session: None,
            empty: Frame::empty(),
        }
    }

    /// Open a capture session with `open`. No-op when already active.
    ///
    /// Any failure from `open` is reported as [`ChromaError::CaptureAccessDenied`] and leaves the
    /// feed inactive.
    pub fn begin<F>(&mut self, open: F) -> ChromaResult<()>
    where
        F: FnOnce() -> ChromaResult<S>,
    {
        if self.session.is_some() {
            return Ok(());
        }
        match open() {
            Ok(session) => {
                tracing::debug!("capture session started");
                self.session = Some(session);
                Ok(())
            }
            Err(ChromaError::CaptureAccessDenied(msg)) => {
                tracing::warn!(%msg, "capture access denied");
                Err(ChromaError::CaptureAccessDenied(msg))
            }
            Err(err) => {
                tracing::warn!(error = %err, "capture access denied");
                Err(ChromaError::capture_denied(err.to_string()))
            }
        }
    }

    /// Stop the session, releasing the underlying stream. No-op when inactive.
    pub fn end(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!("capture session stopped");
        }
    }

    /// `true` while a session is open.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Borrow the live session, if any.
    pub fn session_mut(&mut self) -> Option<&mut S> {
        self.session.as_mut()
    }
}

impl<S: FrameSource> Default for CameraFeed<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: FrameSource> FrameSource for CameraFeed<S> {
    fn current_frame(&mut self) -> &Frame {
        match self.session.as_mut() {
            Some(s) => s.current_frame(),
            None => &self.empty,
        }
    }

    fn native_width(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.native_width())
    }

    fn native_height(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.native_height())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/source/camera.rs"]
mod tests;
