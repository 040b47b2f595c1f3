use tracing::{debug, instrument};

use crate::assets::decode::ImageAsset;
use crate::foundation::color::Rgb;
use crate::foundation::core::{Affine, Canvas, Point, Rect};
use crate::foundation::error::{StudioError, StudioResult};
use crate::render::composite::{BlendMode, composite_over_rgba8_premul};
use crate::render::filter::{apply_chain, background_chain};
use crate::render::gradient::{Gradient, GradientStop, fill_gradient};
use crate::render::{ImagePaint, Painter, Surface};
use crate::scene::effects::{EffectClock, apply_screen_effect};
use crate::scene::particles::ParticleSystem;
use crate::scene::spectrum::{SpectrumFrame, draw_spectrum};
use crate::settings::visual::{BackgroundSettings, FilterPreset, LogoSettings, VisualSettings};

/// Flat fill used when no background image is loaded.
pub const BACKGROUND_FILL: Rgb = Rgb::new(0x11, 0x18, 0x27);

/// Per-tick inputs to [`SceneCompositor::draw_frame`].
#[derive(Clone, Copy, Debug)]
pub struct FrameContext<'a> {
    /// Absolute simulated time in milliseconds.
    pub time_ms: f64,
    /// Delta scalar for this tick.
    pub delta: f64,
    /// Analyser magnitude snapshot.
    pub bins: &'a [u8],
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct BackgroundKey {
    image: u64,
    blur: f64,
    brightness: f64,
    preset: FilterPreset,
    intensity: f64,
}

impl BackgroundKey {
    fn new(image: u64, s: &BackgroundSettings) -> Self {
        Self {
            image,
            blur: s.blur,
            brightness: s.brightness,
            preset: s.filter_preset,
            intensity: s.filter_intensity,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct LogoKey {
    image: u64,
    size: f64,
    keyed_threshold: Option<f64>,
}

#[derive(Debug)]
struct LogoRaster {
    /// `None` when the scaled logo rounds down to zero pixels.
    paint: Option<ImagePaint>,
    width: f64,
    height: f64,
    /// Size the paint is drawn at.
    draw_size: (f64, f64),
}

/// Draws the layered scene onto a [`Surface`] once per tick.
///
/// Layer order: clear, background, vignette, logo, particles, spectrum, screen effect.
/// Background, vignette and the scaled logo are cached until their inputs change.
#[derive(Debug)]
pub struct SceneCompositor {
    canvas: Canvas,
    painter: Painter,
    background: Option<ImageAsset>,
    logo: Option<ImageAsset>,
    background_cache: Option<(BackgroundKey, Vec<u8>)>,
    vignette_cache: Option<(f64, Vec<u8>)>,
    logo_cache: Option<(LogoKey, LogoRaster)>,
    logo_rect: Option<Rect>,
    color_cycle: f64,
    rng: fastrand::Rng,
}

impl SceneCompositor {
    /// Compositor for `canvas`; `seed` drives the random screen effects.
    pub fn new(canvas: Canvas, seed: u64) -> Self {
        Self {
            canvas,
            painter: Painter::new(),
            background: None,
            logo: None,
            background_cache: None,
            vignette_cache: None,
            logo_cache: None,
            logo_rect: None,
            color_cycle: 0.0,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Surface size this compositor draws.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Replace the background image.
    pub fn set_background(&mut self, image: Option<ImageAsset>) {
        self.background = image;
        self.background_cache = None;
    }

    /// Replace the logo image.
    pub fn set_logo(&mut self, image: Option<ImageAsset>) {
        self.logo = image;
        self.logo_cache = None;
        self.logo_rect = None;
    }

    /// Rectangle the logo occupied in the last frame.
    pub fn logo_rect(&self) -> Option<Rect> {
        self.logo_rect
    }

    /// Rainbow color-cycle counter; grows by `delta` each frame.
    pub fn color_cycle(&self) -> f64 {
        self.color_cycle
    }

    /// Compose one frame.
    #[instrument(skip_all, fields(time_ms = ctx.time_ms))]
    pub fn draw_frame(
        &mut self,
        surface: &mut Surface,
        settings: &VisualSettings,
        particles: &ParticleSystem,
        ctx: FrameContext<'_>,
    ) -> StudioResult<()> {
        if surface.canvas() != self.canvas {
            return Err(StudioError::render(format!(
                "surface is {}x{}, compositor expects {}x{}",
                surface.width(),
                surface.height(),
                self.canvas.width,
                self.canvas.height
            )));
        }

        surface.clear();
        self.color_cycle += ctx.delta;

        self.draw_background(surface, &settings.background)?;
        self.draw_vignette(surface, settings.background.vignette)?;
        self.draw_logo(surface, &settings.logo)?;

        particles.render(
            &mut self.painter,
            surface,
            &settings.particles,
            self.color_cycle,
        )?;

        let frame = SpectrumFrame {
            bins: ctx.bins,
            width: self.canvas.w(),
            height: self.canvas.h(),
            logo: self.logo_rect,
            color_cycle: self.color_cycle,
        };
        draw_spectrum(&mut self.painter, surface, &settings.spectrum, &frame)?;

        apply_screen_effect(
            &mut self.painter,
            surface,
            &settings.screen,
            EffectClock {
                time_ms: ctx.time_ms,
                delta: ctx.delta,
            },
            &mut self.rng,
        )
    }

    fn draw_background(
        &mut self,
        surface: &mut Surface,
        settings: &BackgroundSettings,
    ) -> StudioResult<()> {
        let Some(image) = &self.background else {
            surface.fill(BACKGROUND_FILL.opaque());
            return Ok(());
        };
        let key = BackgroundKey::new(image.id, settings);
        let cached = matches!(&self.background_cache, Some((k, _)) if *k == key);
        if !cached {
            let pixels = render_background(&mut self.painter, self.canvas, image, settings)?;
            debug!(image = image.id, "background re-rendered");
            self.background_cache = Some((key, pixels));
        }
        if let Some((_, pixels)) = &self.background_cache {
            surface.data_mut().copy_from_slice(pixels);
        }
        Ok(())
    }

    fn draw_vignette(&mut self, surface: &mut Surface, vignette: f64) -> StudioResult<()> {
        if vignette <= 0.0 {
            return Ok(());
        }
        let cached = matches!(&self.vignette_cache, Some((v, _)) if *v == vignette);
        if !cached {
            let mut layer = Surface::new(self.canvas);
            let (w, h) = (self.canvas.w(), self.canvas.h());
            let g = Gradient::radial(
                Point::new(w / 2.0, h / 2.0),
                h / 3.0,
                h * 1.2,
                [
                    GradientStop::new(0.0, Rgb::BLACK, 0.0),
                    GradientStop::new(1.0, Rgb::BLACK, vignette as f32),
                ],
            );
            fill_gradient(
                &mut layer,
                &g,
                Rect::new(0.0, 0.0, w, h),
                Affine::IDENTITY,
                1.0,
                BlendMode::Normal,
            )?;
            self.vignette_cache = Some((vignette, layer.data().to_vec()));
        }
        match &self.vignette_cache {
            Some((_, pixels)) => {
                composite_over_rgba8_premul(surface.data_mut(), pixels, 1.0, BlendMode::Normal)
            }
            None => Ok(()),
        }
    }

    fn draw_logo(&mut self, surface: &mut Surface, settings: &LogoSettings) -> StudioResult<()> {
        let Some(image) = &self.logo else {
            self.logo_rect = None;
            return Ok(());
        };
        let key = LogoKey {
            image: image.id,
            size: settings.size,
            keyed_threshold: settings.remove_background.then_some(settings.threshold),
        };
        let cached = matches!(&self.logo_cache, Some((k, _)) if *k == key);
        if !cached {
            let raster = prepare_logo(image, settings, self.canvas)?;
            self.logo_cache = Some((key, raster));
        }
        let Some((_, raster)) = &self.logo_cache else {
            return Ok(());
        };

        let (w, h) = (self.canvas.w(), self.canvas.h());
        let x = settings.position.x / 100.0 * (w - raster.width);
        let y = settings.position.y / 100.0 * (h - raster.height);
        let rect = Rect::new(x, y, x + raster.width, y + raster.height);
        self.logo_rect = Some(rect);

        let Some(paint) = raster.paint.clone() else {
            return Ok(());
        };
        let dest = Rect::new(x, y, x + raster.draw_size.0, y + raster.draw_size.1);
        self.painter
            .layer(surface, BlendMode::Normal, 1.0, |shapes| {
                shapes.draw_image(&paint, dest);
                Ok(())
            })
    }
}

fn render_background(
    painter: &mut Painter,
    canvas: Canvas,
    image: &ImageAsset,
    settings: &BackgroundSettings,
) -> StudioResult<Vec<u8>> {
    let (w, h) = (canvas.w(), canvas.h());
    let (iw, ih) = (f64::from(image.width()), f64::from(image.height()));
    let mut layer = Surface::new(canvas);
    if iw > 0.0 && ih > 0.0 {
        let paint = ImagePaint::from_straight(image.rgba.as_raw(), image.width(), image.height())?;
        let dest = cover_rect(iw, ih, w, h);
        painter.layer(&mut layer, BlendMode::Normal, 1.0, |shapes| {
            shapes.draw_image(&paint, dest);
            Ok(())
        })?;
    }
    let chain = background_chain(
        settings.blur as f32,
        settings.brightness as f32,
        settings.filter_preset,
        settings.filter_intensity as f32,
    );
    apply_chain(layer.data(), canvas.width, canvas.height, &chain)
}

/// Cover-fit destination: scale by `max(W/iw, H/ih)` and center.
pub fn cover_rect(iw: f64, ih: f64, w: f64, h: f64) -> Rect {
    let scale = (w / iw).max(h / ih);
    let (dw, dh) = (iw * scale, ih * scale);
    let x = w / 2.0 - dw / 2.0;
    let y = h / 2.0 - dh / 2.0;
    Rect::new(x, y, x + dw, y + dh)
}

fn prepare_logo(
    image: &ImageAsset,
    settings: &LogoSettings,
    canvas: Canvas,
) -> StudioResult<LogoRaster> {
    let width = f64::from(image.width()) * settings.size / 100.0;
    let height = f64::from(image.height()) * settings.size / 100.0;
    let mut draw_size = (width, height);
    let paint = if settings.remove_background {
        // The keyed raster is never resampled beyond the canvas.
        let fit = (canvas.w() / width).min(canvas.h() / height).min(1.0);
        let (tw, th) = ((width * fit).max(0.0) as u32, (height * fit).max(0.0) as u32);
        if tw == 0 || th == 0 {
            None
        } else {
            if fit >= 1.0 {
                // Drawn at its pixel size.
                draw_size = (f64::from(tw), f64::from(th));
            }
            let mut scaled = image::imageops::resize(
                image.rgba.as_ref(),
                tw,
                th,
                image::imageops::FilterType::Triangle,
            );
            color_key_in_place(&mut scaled, settings.threshold);
            Some(ImagePaint::from_straight(scaled.as_raw(), tw, th)?)
        }
    } else if image.width() == 0 || image.height() == 0 {
        None
    } else {
        Some(ImagePaint::from_straight(
            image.rgba.as_raw(),
            image.width(),
            image.height(),
        )?)
    };
    Ok(LogoRaster {
        paint,
        width,
        height,
        draw_size,
    })
}

/// Make every pixel within `threshold * 3` (Euclidean RGB distance) of the top-left
/// pixel fully transparent.
pub fn color_key_in_place(rgba: &mut image::RgbaImage, threshold: f64) {
    let Some(key) = rgba.pixels().next().copied() else {
        return;
    };
    let limit = threshold * 3.0;
    for px in rgba.pixels_mut() {
        let dr = f64::from(px[0]) - f64::from(key[0]);
        let dg = f64::from(px[1]) - f64::from(key[1]);
        let db = f64::from(px[2]) - f64::from(key[2]);
        if (dr * dr + dg * dg + db * db).sqrt() < limit {
            px[3] = 0;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/compositor.rs"]
mod tests;
