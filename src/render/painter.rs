use std::sync::Arc;

use kurbo::{Cap, Circle, Ellipse, Join, PathEl, Shape, Stroke, StrokeOpts};

use crate::assets::decode::premultiply_rgba8_in_place;
use crate::foundation::color::Rgb;
use crate::foundation::core::{Affine, BezPath, Point, Rect, Vec2};
use crate::foundation::error::{StudioError, StudioResult};
use crate::render::composite::{BlendMode, composite_over_rgba8_premul};
use crate::render::gradient::Gradient;
use crate::render::surface::Surface;

const PATH_TOLERANCE: f64 = 0.1;

/// Rasterizes vector layers with `vello_cpu` and composites them onto a [`Surface`].
///
/// The render context and scratch pixmap are reused across layers of the same size.
#[derive(Default)]
pub struct Painter {
    ctx: Option<vello_cpu::RenderContext>,
    scratch: Option<vello_cpu::Pixmap>,
}

impl std::fmt::Debug for Painter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Painter")
            .field("has_ctx", &self.ctx.is_some())
            .finish()
    }
}

impl Painter {
    /// Empty painter; contexts are created lazily.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut vello_cpu::RenderContext, &mut vello_cpu::Pixmap) -> StudioResult<R>,
    ) -> StudioResult<R> {
        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            _ => vello_cpu::RenderContext::new(width, height),
        };
        let mut scratch = match self.scratch.take() {
            Some(p) if p.width() == width && p.height() == height => p,
            _ => vello_cpu::Pixmap::new(width, height),
        };
        ctx.reset();
        scratch.data_as_u8_slice_mut().fill(0);
        let out = f(&mut ctx, &mut scratch);
        self.ctx = Some(ctx);
        self.scratch = Some(scratch);
        out
    }

    /// Draw one vector layer and composite it over `surface`.
    pub fn layer(
        &mut self,
        surface: &mut Surface,
        blend: BlendMode,
        opacity: f32,
        draw: impl FnOnce(&mut Shapes<'_>) -> StudioResult<()>,
    ) -> StudioResult<()> {
        if opacity <= 0.0 {
            return Ok(());
        }
        let (w, h) = surface_dims(surface)?;
        self.with_ctx_mut(w, h, |ctx, scratch| {
            draw(&mut Shapes::new(ctx))?;
            ctx.flush();
            ctx.render_to_pixmap(scratch);
            composite_over_rgba8_premul(
                surface.data_mut(),
                scratch.data_as_u8_slice(),
                opacity,
                blend,
            )
        })
    }

    /// Like [`Painter::layer`], but shapes act as coverage and take their color from
    /// `tint`, evaluated in surface coordinates.
    pub fn tinted_layer(
        &mut self,
        surface: &mut Surface,
        blend: BlendMode,
        opacity: f32,
        tint: &Gradient,
        draw: impl FnOnce(&mut Shapes<'_>) -> StudioResult<()>,
    ) -> StudioResult<()> {
        if opacity <= 0.0 {
            return Ok(());
        }
        let (w, h) = surface_dims(surface)?;
        self.with_ctx_mut(w, h, |ctx, scratch| {
            draw(&mut Shapes::new(ctx))?;
            ctx.flush();
            ctx.render_to_pixmap(scratch);
            let width = usize::from(w);
            let coverage = scratch.data_as_u8_slice_mut();
            for (i, px) in coverage.chunks_exact_mut(4).enumerate() {
                let cov = u16::from(px[3]);
                if cov == 0 {
                    continue;
                }
                let p = Point::new((i % width) as f64 + 0.5, (i / width) as f64 + 0.5);
                let c = tint.sample(p);
                for ch in 0..4 {
                    px[ch] = ((u16::from(c[ch]) * cov + 127) / 255) as u8;
                }
            }
            composite_over_rgba8_premul(surface.data_mut(), coverage, opacity, blend)
        })
    }
}

fn surface_dims(surface: &Surface) -> StudioResult<(u16, u16)> {
    let w = u16::try_from(surface.width())
        .map_err(|_| StudioError::render("surface width exceeds u16"))?;
    let h = u16::try_from(surface.height())
        .map_err(|_| StudioError::render("surface height exceeds u16"))?;
    Ok((w, h))
}

/// Premultiplied raster ready to be used as an image paint.
#[derive(Clone)]
pub struct ImagePaint {
    image: vello_cpu::Image,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for ImagePaint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePaint")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl ImagePaint {
    /// Build from straight-alpha RGBA8.
    pub fn from_straight(rgba: &[u8], width: u32, height: u32) -> StudioResult<Self> {
        let mut tmp = rgba.to_vec();
        premultiply_rgba8_in_place(&mut tmp);
        Self::from_premul(&tmp, width, height)
    }

    /// Build from premultiplied RGBA8.
    pub fn from_premul(bytes: &[u8], width: u32, height: u32) -> StudioResult<Self> {
        let pixmap = pixmap_from_premul_bytes(bytes, width, height)?;
        Ok(Self {
            image: vello_cpu::Image {
                image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
                sampler: vello_cpu::peniko::ImageSampler::default(),
            },
            width,
            height,
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Drawing commands for one layer. Colors are straight alpha.
pub struct Shapes<'a> {
    ctx: &'a mut vello_cpu::RenderContext,
}

impl<'a> Shapes<'a> {
    fn new(ctx: &'a mut vello_cpu::RenderContext) -> Self {
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        Self { ctx }
    }

    /// Current fill color.
    pub fn set_color(&mut self, color: Rgb, alpha: f64) {
        let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        self.ctx
            .set_paint(vello_cpu::peniko::Color::from_rgba8(color.r, color.g, color.b, a));
    }

    /// Transform applied to subsequent shapes.
    pub fn set_transform(&mut self, transform: Affine) {
        self.ctx.set_transform(affine_to_cpu(transform));
    }

    /// Reset the shape transform.
    pub fn reset_transform(&mut self) {
        self.set_transform(Affine::IDENTITY);
    }

    /// Fill an axis-aligned rectangle in local coordinates.
    pub fn fill_rect(&mut self, rect: Rect) {
        let r = rect.abs();
        if r.area() <= 0.0 {
            return;
        }
        self.ctx
            .fill_rect(&vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1));
    }

    /// Fill a circle.
    pub fn fill_circle(&mut self, center: Point, radius: f64) {
        if radius <= 0.0 {
            return;
        }
        self.fill_path(&Circle::new(center, radius).to_path(PATH_TOLERANCE));
    }

    /// Fill an axis-aligned ellipse (before the current transform).
    pub fn fill_ellipse(&mut self, center: Point, rx: f64, ry: f64) {
        if rx <= 0.0 || ry <= 0.0 {
            return;
        }
        let e = Ellipse::new(center, Vec2::new(rx, ry), 0.0);
        self.fill_path(&e.to_path(PATH_TOLERANCE));
    }

    /// Fill an arbitrary path.
    pub fn fill_path(&mut self, path: &BezPath) {
        self.ctx.fill_path(&bezpath_to_cpu(path));
    }

    /// Stroke `path` with butt caps and miter joins.
    pub fn stroke_path(&mut self, path: &BezPath, width: f64) {
        if width <= 0.0 {
            return;
        }
        let style = Stroke::new(width)
            .with_caps(Cap::Butt)
            .with_join(Join::Miter);
        let outline = kurbo::stroke(path.iter(), &style, &StrokeOpts::default(), PATH_TOLERANCE);
        self.fill_path(&outline);
    }

    /// Draw `image` scaled into `dest`.
    pub fn draw_image(&mut self, image: &ImagePaint, dest: Rect) {
        if image.width == 0 || image.height == 0 || dest.area() <= 0.0 {
            return;
        }
        let sx = dest.width() / f64::from(image.width);
        let sy = dest.height() / f64::from(image.height);
        let tr = Affine::translate((dest.x0, dest.y0)) * Affine::scale_non_uniform(sx, sy);
        self.ctx.set_transform(affine_to_cpu(tr));
        self.ctx.set_paint(image.image.clone());
        self.ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(image.width),
            f64::from(image.height),
        ));
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    let pt = |p: Point| vello_cpu::kurbo::Point::new(p.x, p.y);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => out.move_to(pt(p)),
            PathEl::LineTo(p) => out.line_to(pt(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(pt(p1), pt(p2)),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(pt(p1), pt(p2), pt(p3)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> StudioResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| StudioError::render("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| StudioError::render("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(StudioError::render("pixmap byte len mismatch"));
    }
    let mut may_have_opacities = false;
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| {
            may_have_opacities |= px[3] != 255;
            vello_cpu::peniko::color::PremulRgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            }
        })
        .collect();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/render/painter.rs"]
mod tests;
