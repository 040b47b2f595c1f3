use super::*;
use crate::settings::visual::{ParticleEffect, ScreenEffect, SpectrumStyle};

fn canvas() -> Canvas {
    Canvas::new(64, 32).unwrap()
}

fn quiet_settings() -> VisualSettings {
    let mut s = VisualSettings::default();
    s.background.vignette = 0.0;
    s.spectrum.style = SpectrumStyle::None;
    s.particles.effect = ParticleEffect::None;
    s.screen.effect = ScreenEffect::None;
    s
}

fn frame(bins: &[u8]) -> FrameContext<'_> {
    FrameContext {
        time_ms: 0.0,
        delta: 1.0,
        bins,
    }
}

fn solid_image(w: u32, h: u32, px: [u8; 4]) -> ImageAsset {
    ImageAsset::from_rgba(image::RgbaImage::from_pixel(w, h, image::Rgba(px)))
}

#[test]
fn flat_fill_without_background_image() {
    let mut comp = SceneCompositor::new(canvas(), 1);
    let mut s = Surface::new(canvas());
    let particles = ParticleSystem::new(1);
    comp.draw_frame(&mut s, &quiet_settings(), &particles, frame(&[]))
        .unwrap();
    assert_eq!(s.pixel(10, 10), [0x11, 0x18, 0x27, 255]);
}

#[test]
fn vignette_darkens_corners_more_than_center() {
    let mut comp = SceneCompositor::new(canvas(), 1);
    let mut s = Surface::new(canvas());
    let particles = ParticleSystem::new(1);
    let mut settings = quiet_settings();
    settings.background.vignette = 1.0;
    comp.draw_frame(&mut s, &settings, &particles, frame(&[]))
        .unwrap();
    let center = s.pixel(32, 16);
    let corner = s.pixel(0, 0);
    assert_eq!(center, [0x11, 0x18, 0x27, 255]);
    assert!(corner[2] < center[2]);
}

#[test]
fn background_is_cover_fitted_and_brightness_applied() {
    let mut comp = SceneCompositor::new(canvas(), 1);
    comp.set_background(Some(solid_image(10, 10, [200, 100, 50, 255])));
    let mut s = Surface::new(canvas());
    let particles = ParticleSystem::new(1);
    comp.draw_frame(&mut s, &quiet_settings(), &particles, frame(&[]))
        .unwrap();
    // Default brightness(0.5).
    assert_eq!(s.pixel(32, 16), [100, 50, 25, 255]);
    assert_eq!(s.pixel(0, 0)[3], 255);
}

#[test]
fn cover_rect_fills_and_centers() {
    let r = cover_rect(200.0, 100.0, 100.0, 100.0);
    assert_eq!(r, Rect::new(-50.0, 0.0, 150.0, 100.0));
}

#[test]
fn color_key_clears_uniform_image() {
    let mut img = image::RgbaImage::from_pixel(8, 8, image::Rgba([10, 200, 30, 255]));
    color_key_in_place(&mut img, 10.0);
    assert!(img.pixels().all(|p| p[3] == 0));
}

#[test]
fn color_key_keeps_distant_colors() {
    let mut img = image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 255]));
    img.put_pixel(2, 2, image::Rgba([255, 255, 255, 255]));
    img.put_pixel(3, 3, image::Rgba([10, 10, 10, 255]));
    color_key_in_place(&mut img, 10.0);
    assert_eq!(img.get_pixel(2, 2)[3], 255);
    // Distance sqrt(300) ~ 17.3 < 30.
    assert_eq!(img.get_pixel(3, 3)[3], 0);
}

#[test]
fn keyed_uniform_logo_leaves_no_trace() {
    let particles = ParticleSystem::new(1);
    let mut plain = Surface::new(canvas());
    SceneCompositor::new(canvas(), 1)
        .draw_frame(&mut plain, &quiet_settings(), &particles, frame(&[]))
        .unwrap();

    let mut comp = SceneCompositor::new(canvas(), 1);
    comp.set_logo(Some(solid_image(40, 40, [250, 0, 0, 255])));
    let mut settings = quiet_settings();
    settings.logo.remove_background = true;
    settings.logo.threshold = 10.0;
    settings.logo.size = 50.0;
    let mut s = Surface::new(canvas());
    comp.draw_frame(&mut s, &settings, &particles, frame(&[]))
        .unwrap();
    assert_eq!(s.data(), plain.data());
    assert!(comp.logo_rect().is_some());
}

#[test]
fn oversized_keyed_logo_is_resampled_to_the_canvas() {
    let mut comp = SceneCompositor::new(canvas(), 1);
    comp.set_logo(Some(solid_image(4, 4, [250, 0, 0, 255])));
    let mut settings = quiet_settings();
    settings.logo.remove_background = true;
    settings.logo.size = 1e12;
    let mut s = Surface::new(canvas());
    comp.draw_frame(&mut s, &settings, &ParticleSystem::new(1), frame(&[]))
        .unwrap();
    let Some((_, raster)) = &comp.logo_cache else {
        panic!("logo raster was not prepared");
    };
    let paint = raster.paint.as_ref().unwrap();
    assert!(paint.width() <= 64 && paint.height() <= 32);
}

#[test]
fn logo_rect_uses_free_space_percentages() {
    let mut comp = SceneCompositor::new(canvas(), 1);
    comp.set_logo(Some(solid_image(20, 10, [255, 255, 255, 255])));
    let mut settings = quiet_settings();
    settings.logo.size = 50.0;
    let mut s = Surface::new(canvas());
    comp.draw_frame(&mut s, &settings, &ParticleSystem::new(1), frame(&[]))
        .unwrap();
    let r = comp.logo_rect().unwrap();
    // 10x5 logo; x = 0.9 * (64 - 10), y = 0.1 * (32 - 5).
    assert!((r.x0 - 48.6).abs() < 1e-9);
    assert!((r.y0 - 2.7).abs() < 1e-9);
    assert_eq!(r.width(), 10.0);
    assert_eq!(s.pixel(53, 5), [255, 255, 255, 255]);
}

#[test]
fn color_cycle_advances_by_delta() {
    let mut comp = SceneCompositor::new(canvas(), 1);
    let mut s = Surface::new(canvas());
    let particles = ParticleSystem::new(1);
    for _ in 0..3 {
        comp.draw_frame(
            &mut s,
            &quiet_settings(),
            &particles,
            FrameContext {
                time_ms: 0.0,
                delta: 2.0,
                bins: &[],
            },
        )
        .unwrap();
    }
    assert_eq!(comp.color_cycle(), 6.0);
}

#[test]
fn spectrum_draws_over_background() {
    let mut comp = SceneCompositor::new(canvas(), 1);
    let mut s = Surface::new(canvas());
    let mut settings = quiet_settings();
    settings.spectrum.style = SpectrumStyle::Bar;
    settings.spectrum.frequency_range = 2;
    let bins = vec![255u8; 16];
    comp.draw_frame(&mut s, &settings, &ParticleSystem::new(1), frame(&bins))
        .unwrap();
    // Bars span x 25..30 and 32..37 above the center row.
    assert_eq!(s.pixel(27, 8), [255, 255, 255, 255]);
    assert_eq!(s.pixel(27, 24), [0x11, 0x18, 0x27, 255]);
}

#[test]
fn mismatched_surface_is_rejected() {
    let mut comp = SceneCompositor::new(canvas(), 1);
    let mut s = Surface::new(Canvas::new(32, 32).unwrap());
    let err = comp
        .draw_frame(&mut s, &quiet_settings(), &ParticleSystem::new(1), frame(&[]))
        .unwrap_err();
    assert!(matches!(err, StudioError::Render(_)));
}
