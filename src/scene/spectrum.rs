use std::f64::consts::TAU;

use crate::foundation::color::{Rgb, hsl};
use crate::foundation::core::{Affine, BezPath, Point, Rect};
use crate::foundation::error::StudioResult;
use crate::render::composite::BlendMode;
use crate::render::gradient::{Gradient, GradientStop};
use crate::render::{Painter, Shapes, Surface};
use crate::settings::visual::{ColorMode, SpectrumSettings, SpectrumStyle};

const MINI_BAR_BANDS: usize = 6;
const WAVE_LINES: usize = 3;

/// Per-frame inputs shared by every spectrum style.
#[derive(Clone, Copy, Debug)]
pub struct SpectrumFrame<'a> {
    /// Byte magnitudes from the analyser.
    pub bins: &'a [u8],
    /// Canvas width in pixels.
    pub width: f64,
    /// Canvas height in pixels.
    pub height: f64,
    /// On-screen logo rectangle, when a logo is drawn.
    pub logo: Option<Rect>,
    /// Global color-cycle counter.
    pub color_cycle: f64,
}

impl SpectrumFrame<'_> {
    fn bin(&self, i: usize) -> f64 {
        f64::from(self.bins.get(i).copied().unwrap_or(0))
    }
}

/// One drawable spectrum element.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// Filled rectangle in the coordinate space of `transform`.
    Rect {
        /// Local rectangle.
        rect: Rect,
        /// Local to canvas transform.
        transform: Affine,
        /// Fill color.
        color: Rgb,
        /// Straight alpha.
        alpha: f64,
    },
    /// Stroked open polyline.
    Polyline {
        /// Vertices in canvas space.
        points: Vec<Point>,
        /// Stroke width in pixels.
        width: f64,
        /// Stroke color.
        color: Rgb,
        /// Straight alpha.
        alpha: f64,
    },
}

/// Geometry of a spectrum frame.
#[derive(Clone, Debug, Default)]
pub struct SpectrumLayout {
    /// Elements in paint order.
    pub primitives: Vec<Primitive>,
    /// Horizontal rainbow replacing element colors (rainbow `line` style).
    pub tint: Option<Gradient>,
}

/// Anchor point: canvas center or the configured percent position.
pub fn anchor(settings: &SpectrumSettings, width: f64, height: f64) -> Point {
    if settings.centered {
        Point::new(width / 2.0, height / 2.0)
    } else {
        Point::new(
            settings.position.x / 100.0 * width,
            settings.position.y / 100.0 * height,
        )
    }
}

/// Rainbow hue for element `index` of `total`, rotating with the color cycle.
pub fn rainbow_color(index: usize, total: usize, color_cycle: f64) -> Rgb {
    let total = total.max(1) as f64;
    let hue = (index as f64 / total * 360.0 + color_cycle * 0.5) % 360.0;
    hsl(hue, 1.0, 0.5)
}

/// Compute the primitives for the active style.
pub fn layout(settings: &SpectrumSettings, frame: &SpectrumFrame<'_>) -> SpectrumLayout {
    let center = anchor(settings, frame.width, frame.height);
    let count = settings.frequency_range;
    let sens = settings.sensitivity;
    let max_h = settings.max_height;
    let alpha = settings.opacity;
    let color_for = |i: usize, total: usize| match settings.color_mode {
        ColorMode::Rainbow => rainbow_color(i, total, frame.color_cycle),
        ColorMode::Fixed => settings.color,
    };
    let rect = |rect: Rect, color: Rgb| Primitive::Rect {
        rect,
        transform: Affine::IDENTITY,
        color,
        alpha,
    };

    let mut out = SpectrumLayout::default();
    match settings.style {
        SpectrumStyle::None => {}
        SpectrumStyle::Bar | SpectrumStyle::MirrorBar => {
            let mirror = settings.style == SpectrumStyle::MirrorBar;
            let spacing = settings.bar_width + 2.0;
            let start_x = center.x - count as f64 * spacing / 2.0;
            for i in 0..count {
                let mut h = frame.bin(i * 2) * sens * max_h;
                if mirror {
                    h *= 0.7;
                }
                let x = start_x + i as f64 * spacing;
                let color = color_for(i, count);
                out.primitives.push(rect(
                    Rect::new(x, center.y - h, x + settings.bar_width, center.y),
                    color,
                ));
                if mirror {
                    out.primitives.push(rect(
                        Rect::new(x, center.y, x + settings.bar_width, center.y + h),
                        color,
                    ));
                }
            }
        }
        SpectrumStyle::MiniBar => {
            let spacing = settings.bar_width + 4.0;
            let start = if settings.centered {
                Point::new(
                    frame.width / 2.0 - MINI_BAR_BANDS as f64 * spacing / 2.0,
                    frame.height / 2.0,
                )
            } else {
                let logo = frame.logo.unwrap_or(Rect::ZERO);
                Point::new(logo.x1 + 20.0, logo.y0 + logo.height() / 2.0)
            };
            for i in 0..MINI_BAR_BANDS {
                let h = frame.bin(i * 10) * sens * 0.5 * max_h;
                let x = start.x + i as f64 * spacing;
                out.primitives.push(rect(
                    Rect::new(x, start.y - h / 2.0, x + settings.bar_width, start.y + h / 2.0),
                    color_for(i, MINI_BAR_BANDS),
                ));
            }
        }
        SpectrumStyle::Line => {
            let span = settings.width / 100.0 * frame.width;
            let slice = span / count.max(1) as f64;
            let start_x = center.x - span / 2.0;
            let points = (0..count)
                .map(|i| {
                    let h = frame.bin(i) * sens * max_h;
                    Point::new(start_x + i as f64 * slice, center.y - h)
                })
                .collect();
            out.primitives.push(Primitive::Polyline {
                points,
                width: settings.thickness,
                color: settings.color,
                alpha,
            });
            if settings.color_mode == ColorMode::Rainbow {
                let stops = (0..=10).map(|k| {
                    let t = f64::from(k) / 10.0;
                    let hue = (t * 360.0 + frame.color_cycle) % 360.0;
                    GradientStop::new(t as f32, hsl(hue, 1.0, 0.5), 1.0)
                });
                out.tint = Some(Gradient::linear(
                    Point::new(start_x, center.y),
                    Point::new(start_x + span, center.y),
                    stops,
                ));
            }
        }
        SpectrumStyle::Wave => {
            let step_x = frame.width / count.max(1) as f64;
            for l in 0..WAVE_LINES {
                let fade = 1.0 - l as f64 * 0.2;
                // Rainbow lines carry their own alpha on top of the layer alpha.
                let (color, line_alpha) = match settings.color_mode {
                    ColorMode::Rainbow => (
                        hsl((frame.color_cycle + l as f64 * 30.0) % 360.0, 1.0, 0.5),
                        alpha * alpha * fade,
                    ),
                    ColorMode::Fixed => (settings.color, alpha * fade),
                };
                let points = (0..count)
                    .map(|i| {
                        let v = frame.bin(i + l * 5) / 128.0;
                        let y = v * (frame.height / 4.0) * sens * max_h;
                        Point::new(
                            i as f64 * step_x,
                            center.y + (y - frame.height / 8.0) + l as f64 * 20.0,
                        )
                    })
                    .collect();
                out.primitives.push(Primitive::Polyline {
                    points,
                    width: settings.thickness,
                    color,
                    alpha: line_alpha,
                });
            }
        }
        SpectrumStyle::Circle => {
            let radius = 100.0 * max_h;
            let step = TAU / count.max(1) as f64;
            for i in 0..count {
                let h = frame.bin(i * 2) * sens * 0.5 * max_h;
                out.primitives.push(Primitive::Rect {
                    rect: Rect::new(0.0, radius, settings.thickness, radius + h),
                    transform: Affine::translate(center.to_vec2())
                        * Affine::rotate(i as f64 * step),
                    color: color_for(i, count),
                    alpha,
                });
            }
        }
    }
    out
}

/// Paint the spectrum layer for `frame`.
pub fn draw_spectrum(
    painter: &mut Painter,
    surface: &mut Surface,
    settings: &SpectrumSettings,
    frame: &SpectrumFrame<'_>,
) -> StudioResult<()> {
    if settings.style == SpectrumStyle::None {
        return Ok(());
    }
    let SpectrumLayout { primitives, tint } = layout(settings, frame);
    let draw = |shapes: &mut Shapes<'_>| -> StudioResult<()> {
        for prim in &primitives {
            match prim {
                Primitive::Rect {
                    rect,
                    transform,
                    color,
                    alpha,
                } => {
                    shapes.set_color(*color, *alpha);
                    shapes.set_transform(*transform);
                    shapes.fill_rect(*rect);
                }
                Primitive::Polyline {
                    points,
                    width,
                    color,
                    alpha,
                } => {
                    shapes.reset_transform();
                    shapes.set_color(*color, *alpha);
                    shapes.stroke_path(&polyline(points), *width);
                }
            }
        }
        Ok(())
    };
    match tint {
        Some(tint) => painter.tinted_layer(surface, BlendMode::Normal, 1.0, &tint, draw),
        None => painter.layer(surface, BlendMode::Normal, 1.0, draw),
    }
}

fn polyline(points: &[Point]) -> BezPath {
    let mut path = BezPath::new();
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
        path.move_to(*first);
        for p in iter {
            path.line_to(*p);
        }
    }
    path
}

#[cfg(test)]
#[path = "../../tests/unit/scene/spectrum.rs"]
mod tests;
