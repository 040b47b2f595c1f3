//! Full-frame post-processing passes, keyed off absolute simulated time.

use std::f64::consts::FRAC_PI_4;

use tracing::trace;

use crate::foundation::color::Rgb;
use crate::foundation::core::{Affine, BezPath, Point, Rect};
use crate::foundation::error::StudioResult;
use crate::render::blur::blur_rgba8_premul;
use crate::render::composite::{BlendMode, composite_over_rgba8_premul, fill_rect_blend};
use crate::render::gradient::{Gradient, GradientStop, fill_gradient};
use crate::render::{Painter, Surface};
use crate::settings::visual::{ScreenEffect, ScreenSettings};

const LEAK_COLORS: [Rgb; 3] = [
    Rgb::new(255, 100, 50),
    Rgb::new(255, 200, 100),
    Rgb::new(255, 150, 150),
];
const GHOST_OFFSETS: [f64; 4] = [0.5, 1.2, 2.2, 3.5];
const SWEEP_PERIOD_SECS: f64 = 5.0;
const SWEEP_SKEW: f64 = -0.4;

/// Time inputs for one effect pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectClock {
    /// Absolute simulated time in milliseconds.
    pub time_ms: f64,
    /// Per-tick delta scalar (1.0 at 60 Hz).
    pub delta: f64,
}

/// Apply the active screen effect to `surface`.
pub fn apply_screen_effect(
    painter: &mut Painter,
    surface: &mut Surface,
    settings: &ScreenSettings,
    clock: EffectClock,
    rng: &mut fastrand::Rng,
) -> StudioResult<()> {
    let intensity = settings.intensity;
    let t = clock.time_ms * 0.001;
    match settings.effect {
        ScreenEffect::None => Ok(()),
        ScreenEffect::Grain => grain(surface, intensity, rng),
        ScreenEffect::Glitch => glitch(surface, intensity, clock.delta, rng),
        ScreenEffect::Bloom => bloom(surface, intensity),
        ScreenEffect::Vhs => vhs(surface, intensity),
        ScreenEffect::LightLeak => light_leak(surface, intensity, t),
        ScreenEffect::LensFlare => lens_flare(painter, surface, intensity, t, rng),
        ScreenEffect::LightSweep => light_sweep(surface, intensity, t),
    }
}

fn grain(surface: &mut Surface, intensity: f64, rng: &mut fastrand::Rng) -> StudioResult<()> {
    let (w, h) = (surface.width() as usize, surface.height() as usize);
    let mut specks = vec![0u8; surface.data().len()];
    for x in (0..w).step_by(4) {
        for y in (0..h).step_by(4) {
            if rng.f32() <= 0.5 {
                continue;
            }
            for yy in y..(y + 2).min(h) {
                for xx in x..(x + 2).min(w) {
                    specks[(yy * w + xx) * 4 + 3] = 255;
                }
            }
        }
    }
    composite_over_rgba8_premul(
        surface.data_mut(),
        &specks,
        (intensity * 0.3) as f32,
        BlendMode::Overlay,
    )
}

fn glitch(
    surface: &mut Surface,
    intensity: f64,
    delta: f64,
    rng: &mut fastrand::Rng,
) -> StudioResult<()> {
    if f64::from(rng.f32()) >= intensity * 0.05 * delta {
        return Ok(());
    }
    let (w, h) = (surface.width(), surface.height());
    let slice_h = f64::from(rng.f32()) * 50.0 + 10.0;
    let slice_y = f64::from(rng.f32()) * f64::from(h);
    let offset = ((f64::from(rng.f32()) - 0.5) * 20.0 * intensity).round() as i64;
    trace!(slice_y, slice_h, offset, "glitch slice");

    let y0 = slice_y.floor() as usize;
    let y1 = ((slice_y + slice_h).floor() as usize).min(h as usize);
    let stride = surface.stride();
    for y in y0..y1 {
        let row = &mut surface.data_mut()[y * stride..(y + 1) * stride];
        let original = row.to_vec();
        let mut shifted = vec![0u8; stride];
        for x in 0..w as i64 {
            let sx = x - offset;
            if (0..i64::from(w)).contains(&sx) {
                let (d, s) = (x as usize * 4, sx as usize * 4);
                shifted[d..d + 4].copy_from_slice(&original[s..s + 4]);
            }
        }
        composite_over_rgba8_premul(row, &shifted, 1.0, BlendMode::Normal)?;
    }

    let red = Rgb::new(255, 0, 0).with_alpha(0.5).to_array();
    fill_rect_blend(
        surface.data_mut(),
        w,
        h,
        (0, y0 as i64, i64::from(w), y1 as i64),
        red,
        0.5,
        BlendMode::ColorDodge,
    )
}

fn bloom(surface: &mut Surface, intensity: f64) -> StudioResult<()> {
    if intensity <= 0.0 {
        return Ok(());
    }
    let blurred = blur_rgba8_premul(
        surface.data(),
        surface.width(),
        surface.height(),
        (20.0 * intensity) as f32,
    )?;
    composite_over_rgba8_premul(
        surface.data_mut(),
        &blurred,
        (intensity * 0.5) as f32,
        BlendMode::Screen,
    )
}

fn vhs(surface: &mut Surface, intensity: f64) -> StudioResult<()> {
    let (w, h) = (surface.width(), surface.height());
    let black = Rgb::BLACK.opaque().to_array();
    for y in (0..i64::from(h)).step_by(4) {
        fill_rect_blend(
            surface.data_mut(),
            w,
            h,
            (0, y, i64::from(w), y + 2),
            black,
            (0.1 * intensity) as f32,
            BlendMode::Normal,
        )?;
    }
    Ok(())
}

/// Center, radius and alpha of light-leak blob `i` at time `t` seconds.
pub fn light_leak_blob(i: usize, t: f64, w: f64, h: f64, intensity: f64) -> (Point, f64, f64) {
    let fi = i as f64;
    let x = ((t * 0.5 + fi * 2.0).sin() * 0.5 + 0.5) * w;
    let y = ((t * 0.5 * 0.7 + fi).cos() * 0.5 + 0.5) * h;
    let radius = w.max(h) * (0.5 + (t + fi).sin() * 0.2);
    let alpha = intensity * (0.3 + (t * 2.0 + fi).sin() * 0.1);
    (Point::new(x, y), radius, alpha)
}

fn light_leak(surface: &mut Surface, intensity: f64, t: f64) -> StudioResult<()> {
    let (w, h) = (f64::from(surface.width()), f64::from(surface.height()));
    let full = Rect::new(0.0, 0.0, w, h);
    for (i, color) in LEAK_COLORS.iter().enumerate() {
        let (center, radius, alpha) = light_leak_blob(i, t, w, h, intensity);
        let g = Gradient::radial(
            center,
            0.0,
            radius,
            [
                GradientStop::new(0.0, *color, alpha as f32),
                GradientStop::new(1.0, *color, 0.0),
            ],
        );
        fill_gradient(surface, &g, full, Affine::IDENTITY, 1.0, BlendMode::Screen)?;
    }
    Ok(())
}

/// Simulated light source position for the lens flare.
pub fn flare_sun(t: f64, w: f64, h: f64) -> Point {
    Point::new(
        ((t * 0.3).sin() * 0.4 + 0.5) * w,
        ((t * 0.6).sin() * 0.2 + 0.2) * h,
    )
}

fn lens_flare(
    painter: &mut Painter,
    surface: &mut Surface,
    intensity: f64,
    t: f64,
    rng: &mut fastrand::Rng,
) -> StudioResult<()> {
    let (w, h) = (f64::from(surface.width()), f64::from(surface.height()));
    let sun = flare_sun(t, w, h);
    let center = Point::new(w / 2.0, h / 2.0);
    let toward_center = center - sun;

    let main = Gradient::radial(
        sun,
        0.0,
        300.0 * intensity,
        [
            GradientStop::new(0.0, Rgb::WHITE, (0.8 * intensity) as f32),
            GradientStop::new(0.2, Rgb::new(255, 255, 200), (0.4 * intensity) as f32),
            GradientStop::new(1.0, Rgb::WHITE, 0.0),
        ],
    );
    let full = Rect::new(0.0, 0.0, w, h);
    fill_gradient(surface, &main, full, Affine::IDENTITY, 1.0, BlendMode::Screen)?;

    let mut streaks = BezPath::new();
    for i in 1..=8 {
        let angle = t * 0.1 + f64::from(i) * FRAC_PI_4;
        let len = 100.0 + f64::from(rng.f32()) * 50.0;
        streaks.move_to(sun);
        streaks.line_to(sun + len * kurbo::Vec2::from_angle(angle));
    }
    let ghosts: Vec<(Point, f64, f64, Rgb)> = GHOST_OFFSETS
        .iter()
        .enumerate()
        .map(|(i, g)| {
            let pos = sun + toward_center * *g;
            let size = (50.0 + i as f64 * 30.0) * intensity;
            let alpha = (0.1 + f64::from(rng.f32()) * 0.1) * intensity;
            let tint = if i % 2 == 0 {
                Rgb::new(200, 255, 200)
            } else {
                Rgb::new(200, 200, 255)
            };
            (pos, size, alpha, tint)
        })
        .collect();

    painter.layer(surface, BlendMode::Screen, 1.0, |shapes| {
        shapes.set_color(Rgb::WHITE, 0.2 * intensity);
        shapes.stroke_path(&streaks, 2.0);
        for (pos, size, alpha, tint) in &ghosts {
            shapes.set_color(*tint, *alpha);
            shapes.fill_circle(*pos, *size);
        }
        Ok(())
    })
}

/// Left edge of the light-sweep band at time `t` seconds.
pub fn sweep_start_x(t: f64, w: f64) -> f64 {
    let progress = (t % SWEEP_PERIOD_SECS) / SWEEP_PERIOD_SECS;
    (progress * 2.0 - 0.5) * w
}

fn light_sweep(surface: &mut Surface, intensity: f64, t: f64) -> StudioResult<()> {
    let (w, h) = (f64::from(surface.width()), f64::from(surface.height()));
    let band = w * 0.3;
    let transform = Affine::translate((sweep_start_x(t, w), 0.0))
        * Affine::new([1.0, 0.0, SWEEP_SKEW, 1.0, 0.0, 0.0]);
    let g = Gradient::linear(
        Point::ZERO,
        Point::new(band, 0.0),
        [
            GradientStop::new(0.0, Rgb::WHITE, 0.0),
            GradientStop::new(0.5, Rgb::WHITE, (0.6 * intensity) as f32),
            GradientStop::new(1.0, Rgb::WHITE, 0.0),
        ],
    );
    fill_gradient(
        surface,
        &g,
        Rect::new(0.0, 0.0, band, h),
        transform,
        1.0,
        BlendMode::Overlay,
    )
}

#[cfg(test)]
#[path = "../../tests/unit/scene/effects.rs"]
mod tests;
