use std::fmt;

/// Convenience result alias used throughout the crate.
pub type ChromaResult<T> = Result<T, ChromaError>;

/// Which of the two compositor inputs an error or skip refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceRole {
    /// The file-backed video keyed by color.
    Background,
    /// The live feed shown through the keyed regions.
    Foreground,
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Background => f.write_str("background"),
            Self::Foreground => f.write_str("foreground"),
        }
    }
}

/// Top-level error type for chromakey APIs.
#[derive(thiserror::Error, Debug)]
pub enum ChromaError {
    /// Invalid user input or invariant violation.
    #[error("validation error: {0}")]
    Validation(String),

    /// A source had no frame (0x0) when the loop was asked to start.
    #[error("source unavailable: {0} source is not ready")]
    SourceUnavailable(SourceRole),

    /// The capture device refused to open.
    #[error("capture access denied: {0}")]
    CaptureAccessDenied(String),

    /// Decoding or probing media (ffmpeg, image files) failed.
    #[error("media error: {0}")]
    Media(String),

    /// Any other error (IO, decode context, ...).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChromaError {
    /// Build [`ChromaError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build [`ChromaError::Media`].
    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    /// Build [`ChromaError::CaptureAccessDenied`].
    pub fn capture_denied(msg: impl Into<String>) -> Self {
        Self::CaptureAccessDenied(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
