use rayon::prelude::*;
use smallvec::SmallVec;

use crate::foundation::color::Rgb;
use crate::foundation::core::{Affine, Point, Rect};
use crate::foundation::error::StudioResult;
use crate::render::composite::{BlendMode, composite_over_rgba8_premul};
use crate::render::surface::Surface;

/// Color stop; color is kept premultiplied in `0..=1` for interpolation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    /// Position along the gradient in `0..=1`.
    pub offset: f32,
    premul: [f32; 4],
}

impl GradientStop {
    /// Stop at `offset` with `color` at straight alpha `alpha`.
    pub fn new(offset: f32, color: Rgb, alpha: f32) -> Self {
        let a = alpha.clamp(0.0, 1.0);
        Self {
            offset: offset.clamp(0.0, 1.0),
            premul: [
                f32::from(color.r) / 255.0 * a,
                f32::from(color.g) / 255.0 * a,
                f32::from(color.b) / 255.0 * a,
                a,
            ],
        }
    }
}

/// Stop list; most gradients in the scene carry two or three stops.
pub type Stops = SmallVec<[GradientStop; 4]>;

/// Linear or concentric radial gradient, padded outside its range.
#[derive(Clone, Debug, PartialEq)]
pub enum Gradient {
    /// Gradient along the segment `start -> end`.
    Linear {
        /// Offset 0.
        start: Point,
        /// Offset 1.
        end: Point,
        /// Stops in ascending offset order.
        stops: Stops,
    },
    /// Concentric radial gradient from radius `r0` to `r1`.
    Radial {
        /// Shared center.
        center: Point,
        /// Radius at offset 0.
        r0: f64,
        /// Radius at offset 1.
        r1: f64,
        /// Stops in ascending offset order.
        stops: Stops,
    },
}

impl Gradient {
    /// Radial gradient from the center outward.
    pub fn radial(
        center: Point,
        r0: f64,
        r1: f64,
        stops: impl IntoIterator<Item = GradientStop>,
    ) -> Self {
        Self::Radial {
            center,
            r0,
            r1,
            stops: sorted(stops),
        }
    }

    /// Linear gradient between two points.
    pub fn linear(
        start: Point,
        end: Point,
        stops: impl IntoIterator<Item = GradientStop>,
    ) -> Self {
        Self::Linear {
            start,
            end,
            stops: sorted(stops),
        }
    }

    fn is_degenerate(&self) -> bool {
        match self {
            Self::Linear { start, end, stops } => stops.is_empty() || start == end,
            Self::Radial { r0, r1, stops, .. } => stops.is_empty() || r1 <= r0,
        }
    }

    fn offset_at(&self, p: Point) -> f32 {
        match self {
            Self::Linear { start, end, .. } => {
                let d = *end - *start;
                let t = (p - *start).dot(d) / d.hypot2();
                t as f32
            }
            Self::Radial { center, r0, r1, .. } => {
                let dist = (p - *center).hypot();
                ((dist - r0) / (r1 - r0)) as f32
            }
        }
    }

    fn stops(&self) -> &[GradientStop] {
        match self {
            Self::Linear { stops, .. } | Self::Radial { stops, .. } => stops,
        }
    }

    /// Premultiplied RGBA8 at local point `p`.
    pub fn sample(&self, p: Point) -> [u8; 4] {
        if self.is_degenerate() {
            return [0; 4];
        }
        let c = interpolate(self.stops(), self.offset_at(p).clamp(0.0, 1.0));
        c.map(|v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
    }
}

fn sorted(stops: impl IntoIterator<Item = GradientStop>) -> Stops {
    let mut out: Stops = stops.into_iter().collect();
    out.sort_by(|a, b| a.offset.total_cmp(&b.offset));
    out
}

fn interpolate(stops: &[GradientStop], t: f32) -> [f32; 4] {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return [0.0; 4];
    };
    if t <= first.offset {
        return first.premul;
    }
    if t >= last.offset {
        return last.premul;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            let k = if span > 0.0 { (t - a.offset) / span } else { 1.0 };
            let mut out = [0.0; 4];
            for c in 0..4 {
                out[c] = a.premul[c] + (b.premul[c] - a.premul[c]) * k;
            }
            return out;
        }
    }
    last.premul
}

/// Fill the local rectangle `rect`, mapped to the surface by `transform`, with `gradient`.
///
/// The gradient is evaluated in local coordinates, so a skewing transform skews the
/// gradient along with the rectangle.
pub fn fill_gradient(
    surface: &mut Surface,
    gradient: &Gradient,
    rect: Rect,
    transform: Affine,
    opacity: f32,
    blend: BlendMode,
) -> StudioResult<()> {
    if gradient.is_degenerate() || opacity <= 0.0 || rect.area() <= 0.0 {
        return Ok(());
    }
    let inverse = transform.inverse();
    let bbox = transform.transform_rect_bbox(rect);
    let width = surface.width();
    let height = surface.height();
    let x0 = bbox.x0.floor().clamp(0.0, f64::from(width)) as usize;
    let x1 = bbox.x1.ceil().clamp(0.0, f64::from(width)) as usize;
    let y0 = bbox.y0.floor().clamp(0.0, f64::from(height)) as usize;
    let y1 = bbox.y1.ceil().clamp(0.0, f64::from(height)) as usize;
    if x0 >= x1 || y0 >= y1 {
        return Ok(());
    }

    let stride = surface.stride();
    surface
        .data_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .skip(y0)
        .take(y1 - y0)
        .try_for_each(|(y, row)| {
            let mut src = vec![0u8; (x1 - x0) * 4];
            for (i, px) in src.chunks_exact_mut(4).enumerate() {
                let device = Point::new((x0 + i) as f64 + 0.5, y as f64 + 0.5);
                let local = inverse * device;
                if rect.contains(local) {
                    px.copy_from_slice(&gradient.sample(local));
                }
            }
            composite_over_rgba8_premul(&mut row[x0 * 4..x1 * 4], &src, opacity, blend)
        })
}

#[cfg(test)]
#[path = "../../tests/unit/render/gradient.rs"]
mod tests;
