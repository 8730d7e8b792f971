use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;

use crate::foundation::error::{ChromaError, ChromaResult};

pub use kurbo::{Affine, Point, Rect};

/// One straight-alpha RGBA8 pixel.
pub type Rgba8 = [u8; 4];

/// Fully transparent black, the initial value of every scratch pixel.
pub const TRANSPARENT: Rgba8 = [0, 0, 0, 0];

/// Refresh cadence represented as a rational `num/den` frames per second.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> ChromaResult<Self> {
        if den == 0 {
            return Err(ChromaError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(ChromaError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Wall-clock length of one refresh interval.
    pub fn frame_interval(self) -> Duration {
        Duration::from_secs_f64(f64::from(self.den) / f64::from(self.num))
    }
}

impl Default for Fps {
    fn default() -> Self {
        Self { num: 60, den: 1 }
    }
}

/// Width and height of a frame or source, as reported fresh on every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceGeometry {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl SourceGeometry {
    /// Construct from explicit dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `true` when either dimension is zero (source not loaded or not active).
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width divided by height. Only meaningful for non-empty geometry.
    pub fn aspect(self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }

    /// Number of pixels covered.
    pub fn pixel_count(self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }

    /// Number of bytes for tightly packed RGBA8 data.
    pub fn byte_len(self) -> usize {
        self.pixel_count().saturating_mul(4)
    }
}

/// A raster frame as straight-alpha RGBA8 pixels.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

impl Frame {
    /// The zero-sized frame that sources hand out while they are not ready.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A frame of the given size filled with transparent black.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self::filled(width, height, TRANSPARENT)
    }

    /// A frame of the given size filled with one color.
    pub fn filled(width: u32, height: u32, px: Rgba8) -> Self {
        let geometry = SourceGeometry::new(width, height);
        Self {
            width,
            height,
            data: px.repeat(geometry.pixel_count()),
        }
    }

    /// Wrap raw RGBA8 bytes, checking the length against the dimensions.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> ChromaResult<Self> {
        let expected = SourceGeometry::new(width, height).byte_len();
        if data.len() != expected {
            return Err(ChromaError::validation(format!(
                "rgba8 buffer for {width}x{height} must be {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decode an image file (any format the `image` crate reads) into straight RGBA8.
    pub fn load_image(path: &Path) -> ChromaResult<Self> {
        let img = image::open(path)
            .with_context(|| format!("decode image '{}'", path.display()))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self {
            width,
            height,
            data: img.into_raw(),
        })
    }

    /// Write the frame as a PNG, creating parent directories as needed.
    pub fn save_png(&self, path: &Path) -> ChromaResult<()> {
        if self.geometry().is_empty() {
            return Err(ChromaError::validation("cannot save an empty frame"));
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        image::save_buffer_with_format(
            path,
            &self.data,
            self.width,
            self.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }

    /// Dimensions of this frame.
    pub fn geometry(&self) -> SourceGeometry {
        SourceGeometry::new(self.width, self.height)
    }

    /// Resize to `width`x`height`, reusing the allocation. Contents are reset to transparent.
    pub fn reset(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data
            .resize(SourceGeometry::new(width, height).byte_len(), 0);
    }

    /// Pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Overwrite the pixel at `(x, y)`. Out-of-bounds writes are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, px: Rgba8) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        if let Some(dst) = self.data.get_mut(i..i + 4) {
            dst.copy_from_slice(&px);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
