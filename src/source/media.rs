use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout};

use crate::foundation::core::{Fps, Frame, SourceGeometry};
use crate::foundation::error::{ChromaError, ChromaResult};
use crate::source::FrameSource;

/// Stream properties of the first video stream, as reported by `ffprobe`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoInfo {
    /// File the stream was probed from.
    pub source_path: PathBuf,
    /// Native width in pixels.
    pub width: u32,
    /// Native height in pixels.
    pub height: u32,
    /// Average frame rate, when the container reports a usable one.
    pub fps: Option<Fps>,
}

#[derive(serde::Deserialize)]
struct ProbedStreams {
    #[serde(default)]
    streams: Vec<ProbedStream>,
}

#[derive(serde::Deserialize)]
struct ProbedStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
}

impl VideoInfo {
    /// Probe the first video stream of `path`.
    ///
    /// Needs the `media-ffmpeg` feature and `ffprobe` on `PATH`.
    pub fn probe(path: &Path) -> ChromaResult<Self> {
        let json = run_ffprobe(path)?;
        Self::from_probe_json(path, &json)
    }

    fn from_probe_json(path: &Path, json: &[u8]) -> ChromaResult<Self> {
        let probed: ProbedStreams = serde_json::from_slice(json).map_err(|e| {
            ChromaError::media(format!("unreadable ffprobe output for '{}': {e}", path.display()))
        })?;
        let Some(stream) = probed.streams.into_iter().next() else {
            return Err(ChromaError::media(format!(
                "'{}' has no video stream",
                path.display()
            )));
        };
        let info = Self {
            source_path: path.to_path_buf(),
            width: stream.width.unwrap_or(0),
            height: stream.height.unwrap_or(0),
            fps: stream.avg_frame_rate.as_deref().and_then(parse_rate),
        };
        if info.geometry().is_empty() {
            return Err(ChromaError::media(format!(
                "video '{}' reports zero dimensions",
                path.display()
            )));
        }
        Ok(info)
    }

    /// Native geometry of the video stream.
    pub fn geometry(&self) -> SourceGeometry {
        SourceGeometry::new(self.width, self.height)
    }
}

/// File-backed background video decoded by a system `ffmpeg` child process.
///
/// Every [`FrameSource::current_frame`] call advances one frame. At end of stream the last frame
/// is held (or playback restarts when looping is enabled).
pub struct VideoFileSource {
    info: VideoInfo,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    frame: Frame,
    scratch: Vec<u8>,
    primed: bool,
    finished: bool,
    looping: bool,
    frames_decoded: u64,
}

impl VideoFileSource {
    /// Probe `path`, start the decoder and decode the first frame.
    pub fn open(path: &Path) -> ChromaResult<Self> {
        let info = VideoInfo::probe(path)?;
        let mut src = Self {
            frame: Frame::transparent(info.width, info.height),
            scratch: vec![0; info.geometry().byte_len()],
            info,
            child: None,
            stdout: None,
            primed: false,
            finished: false,
            looping: false,
            frames_decoded: 0,
        };
        src.restart()?;
        if !src.read_next()? {
            return Err(ChromaError::media(format!(
                "ffmpeg returned no video frames for '{}'",
                src.info.source_path.display()
            )));
        }
        src.primed = true;
        Ok(src)
    }

    /// Restart from the beginning instead of holding the last frame at end of stream.
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Probed stream properties.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Frames decoded since opening (across loops).
    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    fn restart(&mut self) -> ChromaResult<()> {
        self.stop_decoder();
        let mut child = spawn_decoder(&self.info)?;
        self.stdout = child.stdout.take();
        self.child = Some(child);
        self.finished = false;
        Ok(())
    }

    fn read_next(&mut self) -> ChromaResult<bool> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(false);
        };
        match stdout.read_exact(&mut self.scratch) {
            Ok(()) => {
                std::mem::swap(&mut self.frame.data, &mut self.scratch);
                self.frames_decoded += 1;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.reap_decoder()?;
                Ok(false)
            }
            Err(e) => Err(ChromaError::media(format!(
                "read decoded frame from ffmpeg for '{}': {e}",
                self.info.source_path.display()
            ))),
        }
    }

    /// Wait for a decoder whose output ended and surface its diagnostics if it failed.
    fn reap_decoder(&mut self) -> ChromaResult<()> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| ChromaError::media(format!("wait for ffmpeg: {e}")))?;
        if status.success() {
            return Ok(());
        }
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        Err(ChromaError::media(format!(
            "ffmpeg decode failed for '{}' ({status}): {}",
            self.info.source_path.display(),
            stderr.trim()
        )))
    }

    fn advance(&mut self) -> ChromaResult<()> {
        if self.read_next()? {
            return Ok(());
        }
        if self.looping {
            tracing::debug!(path = %self.info.source_path.display(), "video looped");
            self.restart()?;
            if self.read_next()? {
                return Ok(());
            }
        }
        self.finished = true;
        self.stop_decoder();
        Ok(())
    }

    fn stop_decoder(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl FrameSource for VideoFileSource {
    fn current_frame(&mut self) -> &Frame {
        if self.primed {
            self.primed = false;
        } else if !self.finished
            && let Err(err) = self.advance()
        {
            tracing::warn!(error = %err, "video decode failed; holding last frame");
            self.finished = true;
            self.stop_decoder();
        }
        &self.frame
    }

    fn native_width(&self) -> u32 {
        self.info.width
    }

    fn native_height(&self) -> u32 {
        self.info.height
    }
}

impl Drop for VideoFileSource {
    fn drop(&mut self) {
        self.stop_decoder();
    }
}

impl std::fmt::Debug for VideoFileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFileSource")
            .field("info", &self.info)
            .field("finished", &self.finished)
            .field("looping", &self.looping)
            .field("frames_decoded", &self.frames_decoded)
            .finish()
    }
}

/// `ffprobe` JSON for the first video stream's size and average rate.
#[cfg(feature = "media-ffmpeg")]
fn run_ffprobe(path: &Path) -> ChromaResult<Vec<u8>> {
    let out = std::process::Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=width,height,avg_frame_rate"])
        .args(["-of", "json"])
        .arg(path)
        .output()
        .map_err(|e| ChromaError::media(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(ChromaError::media(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    Ok(out.stdout)
}

#[cfg(not(feature = "media-ffmpeg"))]
fn run_ffprobe(_path: &Path) -> ChromaResult<Vec<u8>> {
    Err(ChromaError::media(
        "video inputs require the 'media-ffmpeg' feature",
    ))
}

// stderr stays piped so a failing decode can report why; `-v error` keeps it short.
#[cfg(feature = "media-ffmpeg")]
fn spawn_decoder(info: &VideoInfo) -> ChromaResult<Child> {
    use std::process::Stdio;

    std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(&info.source_path)
        .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgba", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ChromaError::media(format!("failed to run ffmpeg for video decode: {e}")))
}

#[cfg(not(feature = "media-ffmpeg"))]
fn spawn_decoder(_info: &VideoInfo) -> ChromaResult<Child> {
    Err(ChromaError::media(
        "video inputs require the 'media-ffmpeg' feature",
    ))
}

/// Parse an ffprobe rate such as `30000/1001`. `0/0` (unknown) yields `None`.
fn parse_rate(s: &str) -> Option<Fps> {
    let (num, den) = s.split_once('/')?;
    Fps::new(num.parse().ok()?, den.parse().ok()?).ok()
}

#[cfg(test)]
#[path = "../../tests/unit/source/media.rs"]
mod tests;
