use crate::foundation::core::Rgba8;
use crate::foundation::error::{ChromaError, ChromaResult};

/// Green-dominance key: a pixel is keyed when its green channel exceeds both red and blue by
/// more than `threshold`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ChromaKey {
    /// Strict margin green must exceed red and blue by.
    pub threshold: u8,
}

impl ChromaKey {
    /// Margin used when nothing is configured.
    pub const DEFAULT_THRESHOLD: u8 = 100;

    /// Key with an explicit margin.
    pub fn with_threshold(threshold: u8) -> Self {
        Self { threshold }
    }

    /// Classify one pixel. Alpha does not take part.
    pub fn is_key(self, px: Rgba8) -> bool {
        let t = u16::from(self.threshold);
        let g = u16::from(px[1]);
        g > u16::from(px[0]) + t && g > u16::from(px[2]) + t
    }

    /// Replace every keyed pixel of `dst` with the pixel of `fill` at the same offset.
    ///
    /// Classification reads each `dst` pixel before it is overwritten, so `dst` doubles as the
    /// background snapshot. Returns the number of replaced pixels.
    pub fn key_in_place(self, dst: &mut [u8], fill: &[u8]) -> ChromaResult<usize> {
        if dst.len() != fill.len() || !dst.len().is_multiple_of(4) {
            return Err(ChromaError::validation(
                "key_in_place expects equal-length rgba8 buffers",
            ));
        }
        let mut keyed = 0usize;
        for (d, f) in dst.chunks_exact_mut(4).zip(fill.chunks_exact(4)) {
            if self.is_key([d[0], d[1], d[2], d[3]]) {
                d.copy_from_slice(f);
                keyed += 1;
            }
        }
        Ok(keyed)
    }
}

impl Default for ChromaKey {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/key/chroma.rs"]
mod tests;
