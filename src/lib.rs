//! Chromakey composites a live foreground feed over a background video wherever the
//! background is predominantly green.
//!
//! The crate is built around one loop, [`FrameCompositor`], wired to four collaborators:
//!
//! - a background [`FrameSource`] (typically a [`VideoFileSource`])
//! - a foreground [`FrameSource`] (typically a [`CameraFeed`])
//! - a [`PresentationSurface`] receiving each composited frame
//! - a [`Scheduler`] deciding when the next tick runs
//!
//! Every tick draws the background at its native size, contain-fits and mirrors the foreground
//! into a scratch buffer of the same size, and replaces each pixel whose green channel exceeds
//! red and blue by more than the key threshold with the scratch pixel at the same position.
//!
//! Everything runs on the caller's thread on CPU-resident RGBA8 buffers.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;
mod key;
mod session;

/// Presentation surfaces.
pub mod present;
/// Tick schedulers.
pub mod schedule;
/// Frame sources.
pub mod source;

pub use crate::foundation::core::{
    Affine, Fps, Frame, Point, Rect, Rgba8, SourceGeometry, TRANSPARENT,
};
pub use crate::foundation::error::{ChromaError, ChromaResult, SourceRole};
pub use crate::key::chroma::ChromaKey;
pub use crate::key::fit::contain_fit;
pub use crate::key::raster::{Sampling, draw_transformed, placement, stretch_into};
pub use crate::present::{MemorySurface, PresentationSurface};
pub use crate::schedule::{IntervalScheduler, ManualScheduler, Scheduler, TickToken};
pub use crate::session::compositor::{
    CompositorOpts, CompositorStats, FrameCompositor, RunHandle, RunState, SkipReason,
    TickOutcome,
};
pub use crate::session::controls::ControlState;
pub use crate::source::FrameSource;
pub use crate::source::camera::CameraFeed;
pub use crate::source::media::{VideoFileSource, VideoInfo};
pub use crate::source::still::StillSource;
