use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use chromakey::{
    CameraFeed, CompositorOpts, Fps, FrameCompositor, FrameSource, IntervalScheduler,
    ManualScheduler, MemorySurface, PresentationSurface as _, StillSource, VideoFileSource,
};

#[derive(Parser, Debug)]
#[command(name = "chromakey", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a single frame from two still images and write it as a PNG.
    Frame(FrameArgs),
    /// Drive the compositing loop at a fixed refresh rate and write the last frame as a PNG.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Background image keyed by green.
    #[arg(long)]
    background: PathBuf,

    /// Foreground image shown through the keyed regions.
    #[arg(long)]
    foreground: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Compositor options JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Background image or video (videos need the `media-ffmpeg` feature).
    #[arg(long)]
    background: PathBuf,

    /// Foreground image or video standing in for the camera.
    #[arg(long)]
    foreground: PathBuf,

    /// Number of ticks to run, including the first one.
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Refresh rate in frames per second. Defaults to the background video's rate, else 60.
    #[arg(long)]
    fps: Option<u32>,

    /// Restart the background video when it ends.
    #[arg(long, default_value_t = false)]
    loop_background: bool,

    /// Output PNG path for the last composited frame.
    #[arg(long)]
    out: PathBuf,

    /// Compositor options JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Run(args) => cmd_run(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_opts(path: Option<&Path>) -> anyhow::Result<CompositorOpts> {
    match path {
        Some(p) => Ok(CompositorOpts::from_json_path(p)?),
        None => Ok(CompositorOpts::default()),
    }
}

fn is_still_image(path: &Path) -> bool {
    image::ImageFormat::from_path(path).is_ok()
}

/// Open an input as a boxed source, with the native rate when it is a video.
fn open_source(
    path: &Path,
    looping: bool,
) -> chromakey::ChromaResult<(Box<dyn FrameSource>, Option<Fps>)> {
    if is_still_image(path) {
        return Ok((Box::new(StillSource::open(path)?), None));
    }
    let video = VideoFileSource::open(path)?.with_looping(looping);
    let fps = video.info().fps;
    Ok((Box::new(video), fps))
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let opts = load_opts(args.config.as_deref())?;
    let background = StillSource::open(&args.background)
        .with_context(|| format!("load background '{}'", args.background.display()))?;
    let foreground = StillSource::open(&args.foreground)
        .with_context(|| format!("load foreground '{}'", args.foreground.display()))?;

    let mut compositor = FrameCompositor::new(
        background,
        foreground,
        MemorySurface::new(),
        ManualScheduler::new(),
        opts,
    );
    compositor.start().context("start compositor")?;
    compositor.stop();

    let stats = compositor.stats();
    compositor
        .surface()
        .read_back()
        .save_png(&args.out)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({}x{}, {} keyed pixels)",
        args.out.display(),
        stats.output.width,
        stats.output.height,
        stats.last_keyed_pixels
    );
    Ok(())
}

fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    if args.frames == 0 {
        anyhow::bail!("--frames must be > 0");
    }
    let opts = load_opts(args.config.as_deref())?;

    let (background, background_fps) = open_source(&args.background, args.loop_background)
        .with_context(|| format!("load background '{}'", args.background.display()))?;
    let fps = match args.fps {
        Some(n) => Fps::new(n, 1)?,
        None => background_fps.unwrap_or_default(),
    };

    // A missing file is a load error, not a denied capture: open first, then hand it over.
    let (foreground, _) = open_source(&args.foreground, true)
        .with_context(|| format!("load foreground '{}'", args.foreground.display()))?;
    let mut camera = CameraFeed::new();
    camera.begin(move || Ok(foreground)).context("begin capture")?;

    let mut compositor = FrameCompositor::new(
        background,
        camera,
        MemorySurface::new(),
        IntervalScheduler::new(fps),
        opts,
    );
    tracing::info!(frames = args.frames, fps = fps.as_f64(), "compositing");
    compositor.start().context("start compositor")?;
    compositor.run(Some(args.frames - 1));
    compositor.stop();
    compositor.foreground_mut().end();

    let stats = compositor.stats();
    let snapshot = compositor.surface().read_back();
    if snapshot.geometry().is_empty() {
        anyhow::bail!("no frame was composited ({} ticks skipped)", stats.ticks_skipped);
    }
    snapshot
        .save_png(&args.out)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({} composited, {} skipped, {} keyed pixels in last frame)",
        args.out.display(),
        stats.ticks_composited,
        stats.ticks_skipped,
        stats.last_keyed_pixels
    );
    Ok(())
}
