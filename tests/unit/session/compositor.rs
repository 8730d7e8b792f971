use std::cell::RefCell;

use super::*;
use crate::present::MemorySurface;
use crate::schedule::ManualScheduler;
use crate::source::still::StillSource;

type TestCompositor = FrameCompositor<StillSource, StillSource, MemorySurface, ManualScheduler>;

const GREEN: [u8; 4] = [0, 255, 0, 255];
const RED: [u8; 4] = [255, 0, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn exact_opts() -> CompositorOpts {
    CompositorOpts {
        sampling: Sampling::Nearest,
        ..CompositorOpts::default()
    }
}

fn compositor(bg: Frame, fg: Frame, opts: CompositorOpts) -> TestCompositor {
    FrameCompositor::new(
        StillSource::from_frame(bg),
        StillSource::from_frame(fg),
        MemorySurface::new(),
        ManualScheduler::new(),
        opts,
    )
}

fn noise(w: u32, h: u32, seed: u32) -> Frame {
    let mut state = seed;
    let mut data = Vec::with_capacity((w * h * 4) as usize);
    for _ in 0..w * h * 4 {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        data.push((state >> 24) as u8);
    }
    Frame::from_rgba8(w, h, data).unwrap()
}

#[test]
fn solid_green_background_takes_foreground_everywhere() {
    let fg = Frame::filled(100, 100, [255, 0, 0, 200]);
    let mut c = compositor(Frame::filled(100, 100, GREEN), fg, CompositorOpts::default());
    c.start().unwrap();

    let out = c.surface().read_back();
    assert_eq!(out.geometry(), SourceGeometry::new(100, 100));
    assert!(out.data.chunks_exact(4).all(|px| px == [255, 0, 0, 200]));
    assert_eq!(c.stats().last_keyed_pixels, 100 * 100);
}

#[test]
fn solid_blue_background_is_unchanged() {
    let bg = Frame::filled(64, 48, BLUE);
    let mut c = compositor(bg.clone(), Frame::filled(64, 48, RED), exact_opts());
    c.start().unwrap();
    assert_eq!(c.surface().read_back(), bg);
    assert_eq!(c.stats().last_keyed_pixels, 0);
}

#[test]
fn keyed_pixels_take_mirrored_foreground_and_others_keep_background() {
    let (w, h) = (16, 9);
    let bg = noise(w, h, 7);
    let fg = noise(w, h, 99);
    let mut c = compositor(bg.clone(), fg.clone(), exact_opts());
    c.start().unwrap();
    let out = c.surface().read_back();

    let key = ChromaKey::default();
    for y in 0..h {
        for x in 0..w {
            let b = bg.pixel(x, y).unwrap();
            let expected = if key.is_key(b) {
                fg.pixel(w - 1 - x, y).unwrap()
            } else {
                b
            };
            assert_eq!(out.pixel(x, y).unwrap(), expected, "pixel ({x},{y})");
        }
    }
}

#[test]
fn keyed_pixel_copies_alpha_too() {
    let mut bg = Frame::filled(2, 1, BLUE);
    bg.set_pixel(0, 0, [10, 200, 10, 255]);
    let fg = Frame::filled(2, 1, [1, 2, 3, 4]);
    let mut c = compositor(bg, fg, exact_opts());
    c.start().unwrap();
    let out = c.surface().read_back();
    assert_eq!(out.pixel(0, 0), Some([1, 2, 3, 4]));
    assert_eq!(out.pixel(1, 0), Some(BLUE));
}

#[test]
fn green_outside_letterbox_becomes_transparent() {
    let mut c = compositor(
        Frame::filled(8, 6, GREEN),
        Frame::filled(8, 2, RED),
        exact_opts(),
    );
    c.start().unwrap();
    let out = c.surface().read_back();
    for x in 0..8 {
        assert_eq!(out.pixel(x, 0), Some([0, 0, 0, 0]));
        assert_eq!(out.pixel(x, 1), Some([0, 0, 0, 0]));
        assert_eq!(out.pixel(x, 2), Some(RED));
        assert_eq!(out.pixel(x, 3), Some(RED));
        assert_eq!(out.pixel(x, 4), Some([0, 0, 0, 0]));
    }
}

#[test]
fn start_without_foreground_touches_nothing() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::empty(), exact_opts());
    let err = c.start().unwrap_err();
    assert!(matches!(
        err,
        ChromaError::SourceUnavailable(SourceRole::Foreground)
    ));
    assert_eq!(c.state(), RunState::Idle);
    assert_eq!(c.scheduler().requests(), 0);
    assert!(c.scheduler().cancellations().is_empty());
    assert_eq!(c.surface().frames_written(), 0);
}

#[test]
fn start_without_background_is_rejected() {
    let mut c = compositor(Frame::empty(), Frame::filled(4, 4, RED), exact_opts());
    assert!(matches!(
        c.start(),
        Err(ChromaError::SourceUnavailable(SourceRole::Background))
    ));
    assert_eq!(c.state(), RunState::Idle);
}

#[test]
fn start_composites_immediately_and_requests_one_tick() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::filled(4, 4, RED), exact_opts());
    c.start().unwrap();
    assert_eq!(c.state(), RunState::Running);
    assert_eq!(c.surface().frames_written(), 1);
    assert_eq!(c.scheduler().requests(), 1);
    assert!(c.pending_tick().is_some());
}

#[test]
fn start_while_running_is_a_noop() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::filled(4, 4, RED), exact_opts());
    c.start().unwrap();
    c.start().unwrap();
    assert_eq!(c.surface().frames_written(), 1);
    assert_eq!(c.scheduler().requests(), 1);
}

#[test]
fn stop_twice_cancels_once() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::filled(4, 4, RED), exact_opts());
    c.start().unwrap();
    let pending = c.pending_tick().unwrap();
    c.stop();
    c.stop();
    assert_eq!(c.state(), RunState::Idle);
    assert_eq!(c.scheduler().cancellations(), &[pending]);
    assert!(c.pending_tick().is_none());
}

#[test]
fn stop_when_idle_never_cancels() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::filled(4, 4, RED), exact_opts());
    c.stop();
    assert!(c.scheduler().cancellations().is_empty());
}

#[test]
fn run_drives_ticks_until_limit() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::filled(4, 4, RED), exact_opts());
    c.start().unwrap();
    assert_eq!(c.run(Some(5)), 5);
    assert_eq!(c.surface().frames_written(), 6);
    assert_eq!(c.stats().ticks_composited, 6);
    assert_eq!(c.scheduler().requests(), 6);
    assert_eq!(c.state(), RunState::Running);
}

#[test]
fn run_on_idle_compositor_does_nothing() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::filled(4, 4, RED), exact_opts());
    assert_eq!(c.run(Some(3)), 0);
    assert_eq!(c.tick(), TickOutcome::Inactive);
    assert_eq!(c.scheduler().requests(), 0);
}

#[test]
fn unready_source_skips_but_keeps_scheduling() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::filled(4, 4, RED), exact_opts());
    c.start().unwrap();

    c.foreground_mut().clear();
    assert_eq!(
        c.tick(),
        TickOutcome::Skipped(SkipReason::SourceNotReady(SourceRole::Foreground))
    );
    assert_eq!(c.state(), RunState::Running);
    assert!(c.pending_tick().is_some());

    c.background_mut().clear();
    assert_eq!(
        c.tick(),
        TickOutcome::Skipped(SkipReason::SourceNotReady(SourceRole::Background))
    );

    c.foreground_mut().set_frame(Frame::filled(4, 4, RED));
    c.background_mut().set_frame(Frame::filled(4, 4, GREEN));
    assert_eq!(c.tick(), TickOutcome::Composited { keyed_pixels: 16 });
    assert_eq!(c.stats().ticks_skipped, 2);
    assert_eq!(c.stats().ticks_composited, 2);
}

#[test]
fn composite_buffer_follows_background_resize() {
    let mut c = compositor(Frame::filled(4, 4, BLUE), Frame::filled(4, 4, RED), exact_opts());
    c.start().unwrap();
    assert_eq!(c.surface().size(), (4, 4));

    c.background_mut().set_frame(Frame::filled(10, 2, GREEN));
    c.tick();
    assert_eq!(c.surface().size(), (10, 2));
    assert_eq!(c.stats().output, SourceGeometry::new(10, 2));
    let out = c.surface().read_back();
    assert_eq!(out.pixel(4, 0), Some(RED));
    assert_eq!(out.pixel(0, 0), Some([0, 0, 0, 0]));
}

#[test]
fn configured_threshold_changes_classification() {
    let bg = Frame::filled(2, 2, [0, 60, 0, 255]);
    let mut c = compositor(bg.clone(), Frame::filled(2, 2, RED), exact_opts());
    c.start().unwrap();
    assert_eq!(c.surface().read_back(), bg);

    c.set_opts(CompositorOpts {
        key: ChromaKey::with_threshold(50),
        ..exact_opts()
    });
    assert_eq!(c.tick(), TickOutcome::Composited { keyed_pixels: 4 });
}

#[test]
fn unmirrored_option_keeps_orientation() {
    let mut fg = Frame::filled(2, 1, RED);
    fg.set_pixel(1, 0, BLUE);
    let opts = CompositorOpts {
        mirror_foreground: false,
        ..exact_opts()
    };
    let mut c = compositor(Frame::filled(2, 1, GREEN), fg.clone(), opts);
    c.start().unwrap();
    assert_eq!(c.surface().read_back(), fg);
}

struct StoppingSurface {
    inner: MemorySurface,
    handle: Option<RunHandle>,
}

impl PresentationSurface for StoppingSurface {
    fn set_size(&mut self, width: u32, height: u32) {
        self.inner.set_size(width, height);
    }

    fn write_frame(&mut self, frame: &Frame) -> ChromaResult<()> {
        if let Some(h) = &self.handle {
            h.stop();
        }
        self.inner.write_frame(frame)
    }

    fn read_back(&self) -> Frame {
        self.inner.read_back()
    }
}

#[test]
fn disarm_during_tick_requests_nothing() {
    let mut c = FrameCompositor::new(
        StillSource::from_frame(Frame::filled(4, 4, GREEN)),
        StillSource::from_frame(Frame::filled(4, 4, RED)),
        StoppingSurface {
            inner: MemorySurface::new(),
            handle: None,
        },
        ManualScheduler::new(),
        exact_opts(),
    );
    c.start().unwrap();
    assert_eq!(c.scheduler().requests(), 1);

    let handle = c.run_handle();
    c.surface_mut().handle = Some(handle);
    assert_eq!(c.run(None), 1);
    assert_eq!(c.state(), RunState::Idle);
    assert_eq!(c.scheduler().requests(), 1);
    assert_eq!(c.surface().inner.frames_written(), 2);
}

#[test]
fn handle_stop_between_ticks_ends_run() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::filled(4, 4, RED), exact_opts());
    c.start().unwrap();
    c.run_handle().stop();
    assert_eq!(c.run(None), 0);
    assert_eq!(c.state(), RunState::Idle);

    c.stop();
    assert_eq!(c.scheduler().cancellations().len(), 1);
}

#[test]
fn restart_after_handle_stop_keeps_one_tick_outstanding() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::filled(4, 4, RED), exact_opts());
    c.start().unwrap();
    let first = c.pending_tick().unwrap();
    c.run_handle().stop();
    c.start().unwrap();

    assert_eq!(c.state(), RunState::Running);
    assert_eq!(c.scheduler().cancellations(), &[first]);
    assert_eq!(c.scheduler().pending().len(), 1);
    assert_eq!(c.pending_tick(), c.scheduler().pending().first().copied());
}

#[test]
fn direct_tick_supersedes_pending_tick() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::filled(4, 4, RED), exact_opts());
    c.start().unwrap();
    let first = c.pending_tick().unwrap();
    c.tick();
    c.tick();

    assert_eq!(c.scheduler().pending().len(), 1);
    assert_eq!(c.scheduler().cancellations().len(), 2);
    assert_eq!(c.scheduler().cancellations()[0], first);
    assert_eq!(c.fire(first), None);
    assert_eq!(c.surface().frames_written(), 3);
}

#[test]
fn fire_services_the_pending_token() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::filled(4, 4, RED), exact_opts());
    c.start().unwrap();
    let due = c.scheduler.wait_next().unwrap();
    assert_eq!(
        c.fire(due),
        Some(TickOutcome::Composited { keyed_pixels: 16 })
    );
    assert!(c.scheduler().cancellations().is_empty());
    assert_eq!(c.scheduler().pending().len(), 1);
}

/// Still background that counts frame reads, standing in for a playing video.
struct CountingSource {
    inner: StillSource,
    reads: usize,
}

impl FrameSource for CountingSource {
    fn current_frame(&mut self) -> &Frame {
        self.reads += 1;
        self.inner.current_frame()
    }

    fn native_width(&self) -> u32 {
        self.inner.native_width()
    }

    fn native_height(&self) -> u32 {
        self.inner.native_height()
    }
}

#[test]
fn background_keeps_advancing_while_foreground_is_unready() {
    let mut c = FrameCompositor::new(
        CountingSource {
            inner: StillSource::from_frame(Frame::filled(4, 4, GREEN)),
            reads: 0,
        },
        StillSource::from_frame(Frame::filled(4, 4, RED)),
        MemorySurface::new(),
        ManualScheduler::new(),
        exact_opts(),
    );
    c.start().unwrap();
    assert_eq!(c.background().reads, 1);

    c.foreground_mut().clear();
    assert_eq!(c.run(Some(3)), 3);
    assert_eq!(c.stats().ticks_skipped, 3);
    assert_eq!(c.background().reads, 4);
    assert_eq!(c.surface().frames_written(), 1);
}

struct FailingSurface;

impl PresentationSurface for FailingSurface {
    fn set_size(&mut self, _width: u32, _height: u32) {}

    fn write_frame(&mut self, _frame: &Frame) -> ChromaResult<()> {
        Err(ChromaError::validation("display gone"))
    }

    fn read_back(&self) -> Frame {
        Frame::empty()
    }
}

#[test]
fn surface_failure_is_skipped_not_fatal() {
    let mut c = FrameCompositor::new(
        StillSource::from_frame(Frame::filled(4, 4, GREEN)),
        StillSource::from_frame(Frame::filled(4, 4, RED)),
        FailingSurface,
        ManualScheduler::new(),
        exact_opts(),
    );
    c.start().unwrap();
    assert_eq!(c.state(), RunState::Running);
    assert_eq!(c.stats().ticks_skipped, 1);
    assert_eq!(c.tick(), TickOutcome::Skipped(SkipReason::SurfaceWrite));
}

#[derive(Default)]
struct SharedLog {
    requested: Vec<TickToken>,
    cancelled: Vec<TickToken>,
}

struct LoggingScheduler {
    inner: ManualScheduler,
    log: Rc<RefCell<SharedLog>>,
}

impl Scheduler for LoggingScheduler {
    fn request_next_tick(&mut self) -> TickToken {
        let t = self.inner.request_next_tick();
        self.log.borrow_mut().requested.push(t);
        t
    }

    fn cancel(&mut self, token: TickToken) {
        self.log.borrow_mut().cancelled.push(token);
        self.inner.cancel(token);
    }

    fn wait_next(&mut self) -> Option<TickToken> {
        self.inner.wait_next()
    }
}

#[test]
fn drop_cancels_pending_tick() {
    let log = Rc::new(RefCell::new(SharedLog::default()));
    {
        let mut c = FrameCompositor::new(
            StillSource::from_frame(Frame::filled(4, 4, GREEN)),
            StillSource::from_frame(Frame::filled(4, 4, RED)),
            MemorySurface::new(),
            LoggingScheduler {
                inner: ManualScheduler::new(),
                log: Rc::clone(&log),
            },
            exact_opts(),
        );
        c.start().unwrap();
    }
    let log = log.borrow();
    assert_eq!(log.requested.len(), 1);
    assert_eq!(log.cancelled, log.requested);
}

#[test]
fn controls_follow_run_state() {
    let mut c = compositor(Frame::filled(4, 4, GREEN), Frame::filled(4, 4, RED), exact_opts());
    assert!(c.controls(true).can_start_overlay);
    assert!(!c.controls(false).can_start_overlay);
    c.start().unwrap();
    let ctl = c.controls(true);
    assert!(!ctl.can_start_overlay);
    assert!(ctl.can_stop_overlay);
}

#[test]
fn opts_load_from_json_with_defaults() {
    let dir = std::path::PathBuf::from("target").join("unit_compositor_opts");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("opts.json");
    std::fs::write(&path, r#"{ "key": { "threshold": 80 }, "sampling": "nearest" }"#).unwrap();

    let opts = CompositorOpts::from_json_path(&path).unwrap();
    assert_eq!(opts.key.threshold, 80);
    assert_eq!(opts.sampling, Sampling::Nearest);
    assert!(opts.mirror_foreground);

    assert!(CompositorOpts::from_json_path(&dir.join("missing.json")).is_err());
}
