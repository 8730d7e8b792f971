use crate::foundation::core::{Rect, SourceGeometry};

/// Contain-fit `source` inside `target`: largest aspect-preserving rectangle, centered on the
/// axis with slack. Returns `None` when either geometry is empty.
///
/// A source wider than the target fills the width and is letterboxed; otherwise it fills the
/// height and is pillarboxed. Equal aspects fill the whole target.
pub fn contain_fit(source: SourceGeometry, target: SourceGeometry) -> Option<Rect> {
    if source.is_empty() || target.is_empty() {
        return None;
    }

    let tw = f64::from(target.width);
    let th = f64::from(target.height);
    let source_aspect = source.aspect();

    let (x, y, w, h) = if source_aspect > target.aspect() {
        let h = tw / source_aspect;
        (0.0, (th - h) / 2.0, tw, h)
    } else {
        let w = th * source_aspect;
        ((tw - w) / 2.0, 0.0, w, th)
    };

    Some(Rect::new(x, y, x + w, y + h))
}

#[cfg(test)]
#[path = "../../tests/unit/key/fit.rs"]
mod tests;
