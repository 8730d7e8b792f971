use crate::foundation::core::{Affine, Frame, Point, Rect, Rgba8, TRANSPARENT};

/// Resampling filter used when a frame is drawn at a different size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    /// Pick the source pixel under the destination pixel center.
    Nearest,
    /// Interpolate the four nearest source pixels, clamping at the edges.
    #[default]
    Bilinear,
}

/// Draw `src` over the whole of `dst`, stretching both axes. Same-size frames are copied as is.
pub fn stretch_into(dst: &mut Frame, src: &Frame, sampling: Sampling) {
    if src.geometry().is_empty() || dst.geometry().is_empty() {
        return;
    }
    if src.geometry() == dst.geometry() && src.data.len() == dst.data.len() {
        dst.data.copy_from_slice(&src.data);
        return;
    }
    let xf = Affine::scale_non_uniform(
        f64::from(dst.width) / f64::from(src.width),
        f64::from(dst.height) / f64::from(src.height),
    );
    draw_transformed(dst, src, xf, sampling);
}

/// Transform that places `src` inside `rect` of a `dst_width` wide target, optionally flipped
/// left-right about the target's vertical center axis.
pub fn placement(src: &Frame, rect: Rect, dst_width: u32, mirror: bool) -> Affine {
    let place = Affine::translate((rect.x0, rect.y0))
        * Affine::scale_non_uniform(
            rect.width() / f64::from(src.width),
            rect.height() / f64::from(src.height),
        );
    if mirror {
        Affine::translate((f64::from(dst_width), 0.0)) * Affine::FLIP_X * place
    } else {
        place
    }
}

/// Draw `src` into `dst` through `xf` (source pixel space to destination pixel space).
///
/// Destination pixels whose center maps outside the source are left untouched.
pub fn draw_transformed(dst: &mut Frame, src: &Frame, xf: Affine, sampling: Sampling) {
    if src.geometry().is_empty() || dst.geometry().is_empty() {
        return;
    }
    let det = xf.determinant();
    if det == 0.0 || !det.is_finite() {
        return;
    }

    let sw = f64::from(src.width);
    let sh = f64::from(src.height);
    let bbox = xf.transform_rect_bbox(Rect::new(0.0, 0.0, sw, sh));
    let x_start = bbox.x0.floor().max(0.0) as u32;
    let y_start = bbox.y0.floor().max(0.0) as u32;
    let x_end = (bbox.x1.ceil().max(0.0) as u32).min(dst.width);
    let y_end = (bbox.y1.ceil().max(0.0) as u32).min(dst.height);

    let inv = xf.inverse();
    for y in y_start..y_end {
        for x in x_start..x_end {
            let p = inv * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            if p.x < 0.0 || p.y < 0.0 || p.x >= sw || p.y >= sh {
                continue;
            }
            let px = match sampling {
                Sampling::Nearest => sample_nearest(src, p),
                Sampling::Bilinear => sample_bilinear(src, p),
            };
            dst.set_pixel(x, y, px);
        }
    }
}

fn sample_nearest(src: &Frame, p: Point) -> Rgba8 {
    let x = (p.x.floor() as u32).min(src.width - 1);
    let y = (p.y.floor() as u32).min(src.height - 1);
    src.pixel(x, y).unwrap_or(TRANSPARENT)
}

fn sample_bilinear(src: &Frame, p: Point) -> Rgba8 {
    let fx = (p.x - 0.5).clamp(0.0, f64::from(src.width - 1));
    let fy = (p.y - 0.5).clamp(0.0, f64::from(src.height - 1));
    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(src.width - 1);
    let y1 = (y0 + 1).min(src.height - 1);
    let tx = fx - f64::from(x0);
    let ty = fy - f64::from(y0);

    let a = src.pixel(x0, y0).unwrap_or(TRANSPARENT);
    let b = src.pixel(x1, y0).unwrap_or(TRANSPARENT);
    let c = src.pixel(x0, y1).unwrap_or(TRANSPARENT);
    let d = src.pixel(x1, y1).unwrap_or(TRANSPARENT);

    let mut out = [0u8; 4];
    for i in 0..4 {
        let top = f64::from(a[i]) * (1.0 - tx) + f64::from(b[i]) * tx;
        let bottom = f64::from(c[i]) * (1.0 - tx) + f64::from(d[i]) * tx;
        out[i] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/key/raster.rs"]
mod tests;
