use std::cell::Cell;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::rc::Rc;

use anyhow::Context as _;

use crate::foundation::core::{Frame, SourceGeometry};
use crate::foundation::error::{ChromaError, ChromaResult, SourceRole};
use crate::key::chroma::ChromaKey;
use crate::key::fit::contain_fit;
use crate::key::raster::{Sampling, draw_transformed, placement, stretch_into};
use crate::present::PresentationSurface;
use crate::schedule::{Scheduler, TickToken};
use crate::session::controls::ControlState;
use crate::source::FrameSource;

/// Options controlling how each tick composites.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositorOpts {
    /// Which background pixels are replaced.
    pub key: ChromaKey,
    /// Flip the foreground left-right (selfie view).
    pub mirror_foreground: bool,
    /// Filter used when sources are drawn at a different size.
    pub sampling: Sampling,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        Self {
            key: ChromaKey::default(),
            mirror_foreground: true,
            sampling: Sampling::Bilinear,
        }
    }
}

impl CompositorOpts {
    /// Read options from a JSON file. Missing fields take their defaults.
    pub fn from_json_path(path: &Path) -> ChromaResult<Self> {
        let f = File::open(path)
            .with_context(|| format!("open compositor config '{}'", path.display()))?;
        let opts = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse compositor config '{}'", path.display()))?;
        Ok(opts)
    }
}

/// Whether the compositing loop is armed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    /// Not compositing; no tick is pending.
    Idle,
    /// Compositing once per scheduled tick.
    Running,
}

/// Shared view of the run flag.
///
/// Clones observe and can disarm the same loop, e.g. from a UI callback that fires while a tick
/// is in flight. Disarming through a handle never cancels a pending tick by itself; the pending
/// tick fires as a no-op and the loop ends.
#[derive(Clone, Debug, Default)]
pub struct RunHandle(Rc<Cell<bool>>);

impl RunHandle {
    /// `true` while the loop is armed.
    pub fn is_armed(&self) -> bool {
        self.0.get()
    }

    /// Disarm the loop. The tick in progress, if any, still completes.
    pub fn stop(&self) {
        self.0.set(false);
    }

    fn arm(&self) {
        self.0.set(true);
    }
}

/// Why a tick produced no frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// A source reported `0x0` at tick time.
    SourceNotReady(SourceRole),
    /// The presentation surface rejected the frame.
    SurfaceWrite,
    /// Composite and scratch buffers disagreed in size.
    BufferMismatch,
}

/// Result of one call to [`FrameCompositor::tick`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was composited and written to the surface.
    Composited {
        /// Background pixels replaced by foreground pixels.
        keyed_pixels: usize,
    },
    /// The pass was skipped; the loop keeps going.
    Skipped(SkipReason),
    /// The loop was not armed, nothing happened.
    Inactive,
}

/// Counters observable while the loop runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompositorStats {
    /// Ticks that wrote a frame.
    pub ticks_composited: u64,
    /// Ticks skipped because a source was not ready or the surface failed.
    pub ticks_skipped: u64,
    /// Keyed pixels in the most recent composited frame.
    pub last_keyed_pixels: usize,
    /// Size of the most recent composited frame.
    pub output: SourceGeometry,
}

/// Chroma-key compositor driving one background, one foreground, one surface and one scheduler.
///
/// Each tick draws the background at its native size, draws the foreground contain-fitted and
/// (by default) mirrored into a scratch buffer of the same size, replaces every green-dominant
/// background pixel with the scratch pixel at the same position, and writes the result to the
/// surface. The composite buffer follows the background's native size on every tick.
///
/// Dropping the compositor stops it and cancels any pending tick.
pub struct FrameCompositor<B, F, P, S>
where
    B: FrameSource,
    F: FrameSource,
    P: PresentationSurface,
    S: Scheduler,
{
    background: B,
    foreground: F,
    surface: P,
    scheduler: S,
    opts: CompositorOpts,

    run: RunHandle,
    pending: Option<TickToken>,
    composite: Frame,
    scratch: Frame,
    stats: CompositorStats,
    last_skip: Option<SkipReason>,
}

impl<B, F, P, S> FrameCompositor<B, F, P, S>
where
    B: FrameSource,
    F: FrameSource,
    P: PresentationSurface,
    S: Scheduler,
{
    /// Create an idle compositor.
    pub fn new(background: B, foreground: F, surface: P, scheduler: S, opts: CompositorOpts) -> Self {
        Self {
            background,
            foreground,
            surface,
            scheduler,
            opts,
            run: RunHandle::default(),
            pending: None,
            composite: Frame::empty(),
            scratch: Frame::empty(),
            stats: CompositorStats::default(),
            last_skip: None,
        }
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        if self.run.is_armed() {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    /// Handle sharing this compositor's run flag.
    pub fn run_handle(&self) -> RunHandle {
        self.run.clone()
    }

    /// Counters since construction.
    pub fn stats(&self) -> CompositorStats {
        self.stats
    }

    /// Active options.
    pub fn opts(&self) -> CompositorOpts {
        self.opts
    }

    /// Replace the options; takes effect on the next tick.
    pub fn set_opts(&mut self, opts: CompositorOpts) {
        self.opts = opts;
    }

    /// Token of the tick currently requested from the scheduler, if any.
    pub fn pending_tick(&self) -> Option<TickToken> {
        self.pending
    }

    /// Button enablement for a UI, given whether the foreground capture is active.
    pub fn controls(&self, capture_active: bool) -> ControlState {
        ControlState::derive(self.state(), capture_active)
    }

    /// Borrow the background source.
    pub fn background(&self) -> &B {
        &self.background
    }

    /// Mutably borrow the background source (e.g. to load another file).
    pub fn background_mut(&mut self) -> &mut B {
        &mut self.background
    }

    /// Borrow the foreground source.
    pub fn foreground(&self) -> &F {
        &self.foreground
    }

    /// Mutably borrow the foreground source (e.g. to begin or end capture).
    pub fn foreground_mut(&mut self) -> &mut F {
        &mut self.foreground
    }

    /// Borrow the presentation surface.
    pub fn surface(&self) -> &P {
        &self.surface
    }

    /// Mutably borrow the presentation surface.
    pub fn surface_mut(&mut self) -> &mut P {
        &mut self.surface
    }

    /// Borrow the scheduler.
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Arm the loop, composite one frame immediately and request the next tick.
    ///
    /// Fails with [`ChromaError::SourceUnavailable`] without touching the run state or the
    /// scheduler when either source reports `0x0`. Starting a running loop is a no-op.
    #[tracing::instrument(skip(self))]
    pub fn start(&mut self) -> ChromaResult<()> {
        if self.run.is_armed() {
            tracing::debug!("start ignored: already running");
            return Ok(());
        }
        if !self.background.is_ready() {
            return Err(ChromaError::SourceUnavailable(SourceRole::Background));
        }
        if !self.foreground.is_ready() {
            return Err(ChromaError::SourceUnavailable(SourceRole::Foreground));
        }

        self.run.arm();
        self.last_skip = None;
        tracing::debug!("compositor running");
        self.tick();
        Ok(())
    }

    /// Disarm the loop and cancel the pending tick. Idempotent.
    pub fn stop(&mut self) {
        if !self.run.is_armed() && self.pending.is_none() {
            return;
        }
        self.run.stop();
        if let Some(token) = self.pending.take() {
            self.scheduler.cancel(token);
        }
        tracing::debug!(stats = ?self.stats, "compositor stopped");
    }

    /// Run one compositing pass now, then request the next tick if still armed.
    ///
    /// A tick already requested from the scheduler is superseded and cancelled, so at most one
    /// tick is ever outstanding. Drivers servicing a due token use [`FrameCompositor::fire`].
    pub fn tick(&mut self) -> TickOutcome {
        if let Some(superseded) = self.pending.take() {
            self.scheduler.cancel(superseded);
        }
        self.service()
    }

    /// Service `token` reported due by the scheduler. Returns `None` for a token that is no
    /// longer the pending one.
    pub fn fire(&mut self, token: TickToken) -> Option<TickOutcome> {
        if self.pending != Some(token) {
            tracing::trace!(?token, "ignoring stale tick");
            return None;
        }
        self.pending = None;
        Some(self.service())
    }

    /// Drive ticks from the scheduler until the loop is disarmed, nothing is pending, or `limit`
    /// ticks have run. Returns the number of ticks run.
    pub fn run(&mut self, limit: Option<u64>) -> u64 {
        let mut ran = 0u64;
        while self.run.is_armed() {
            if limit.is_some_and(|l| ran >= l) {
                break;
            }
            let Some(token) = self.scheduler.wait_next() else {
                break;
            };
            if self.fire(token).is_some() {
                ran += 1;
            }
        }
        ran
    }

    fn service(&mut self) -> TickOutcome {
        if !self.run.is_armed() {
            return TickOutcome::Inactive;
        }

        let outcome = self.composite_once();

        if self.run.is_armed() {
            self.pending = Some(self.scheduler.request_next_tick());
        } else {
            tracing::debug!("disarmed during tick; not rescheduling");
        }
        outcome
    }

    fn composite_once(&mut self) -> TickOutcome {
        let bg = self.background.geometry();
        if bg.is_empty() {
            return self.skip(SkipReason::SourceNotReady(SourceRole::Background));
        }
        let fg = self.foreground.geometry();
        let Some(fit) = contain_fit(fg, bg) else {
            // Keep a playing background moving while the camera is off.
            self.background.current_frame();
            return self.skip(SkipReason::SourceNotReady(SourceRole::Foreground));
        };

        if self.composite.geometry() != bg {
            tracing::debug!(width = bg.width, height = bg.height, "composite buffer resized");
        }
        self.composite.reset(bg.width, bg.height);
        self.surface.set_size(bg.width, bg.height);
        stretch_into(
            &mut self.composite,
            self.background.current_frame(),
            self.opts.sampling,
        );

        self.scratch.reset(bg.width, bg.height);
        let fg_frame = self.foreground.current_frame();
        if !fg_frame.geometry().is_empty() {
            let xf = placement(fg_frame, fit, bg.width, self.opts.mirror_foreground);
            draw_transformed(&mut self.scratch, fg_frame, xf, self.opts.sampling);
        }

        // The composite buffer is its own background snapshot: each pixel is classified before
        // it is overwritten and no pixel reads another.
        let keyed = match self
            .opts
            .key
            .key_in_place(&mut self.composite.data, &self.scratch.data)
        {
            Ok(n) => n,
            Err(err) => {
                tracing::warn!(error = %err, "chroma pass failed");
                return self.skip(SkipReason::BufferMismatch);
            }
        };

        if let Err(err) = self.surface.write_frame(&self.composite) {
            tracing::warn!(error = %err, "presentation surface rejected frame");
            return self.skip(SkipReason::SurfaceWrite);
        }

        self.stats.ticks_composited += 1;
        self.stats.last_keyed_pixels = keyed;
        self.stats.output = bg;
        self.last_skip = None;
        tracing::trace!(keyed, width = bg.width, height = bg.height, "frame composited");
        TickOutcome::Composited {
            keyed_pixels: keyed,
        }
    }

    fn skip(&mut self, reason: SkipReason) -> TickOutcome {
        self.stats.ticks_skipped += 1;
        if self.last_skip != Some(reason) {
            tracing::debug!(?reason, "tick skipped");
            self.last_skip = Some(reason);
        }
        TickOutcome::Skipped(reason)
    }
}

impl<B, F, P, S> Drop for FrameCompositor<B, F, P, S>
where
    B: FrameSource,
    F: FrameSource,
    P: PresentationSurface,
    S: Scheduler,
{
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/compositor.rs"]
mod tests;
