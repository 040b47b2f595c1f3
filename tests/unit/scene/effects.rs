use super::*;
use crate::foundation::core::Canvas;

fn gray_surface(w: u32, h: u32, v: u8) -> Surface {
    let mut s = Surface::new(Canvas::new(w, h).unwrap());
    s.fill(Rgb::new(v, v, v).opaque());
    s
}

fn run(effect: ScreenEffect, intensity: f64, s: &mut Surface, time_ms: f64, seed: u64) {
    let mut painter = Painter::new();
    let mut rng = fastrand::Rng::with_seed(seed);
    let settings = ScreenSettings { effect, intensity };
    apply_screen_effect(
        &mut painter,
        s,
        &settings,
        EffectClock {
            time_ms,
            delta: 1.0,
        },
        &mut rng,
    )
    .unwrap();
}

#[test]
fn none_leaves_frame_untouched() {
    let mut s = gray_surface(32, 32, 100);
    let before = s.data().to_vec();
    run(ScreenEffect::None, 1.0, &mut s, 1000.0, 1);
    assert_eq!(s.data(), &before[..]);
}

#[test]
fn vhs_darkens_every_other_pair_of_rows() {
    let mut s = gray_surface(8, 8, 200);
    run(ScreenEffect::Vhs, 1.0, &mut s, 0.0, 1);
    assert!(s.pixel(0, 0)[0] < 200);
    assert!(s.pixel(0, 1)[0] < 200);
    assert_eq!(s.pixel(0, 2)[0], 200);
    assert_eq!(s.pixel(0, 3)[0], 200);
    assert!(s.pixel(0, 4)[0] < 200);
}

#[test]
fn grain_only_darkens_light_pixels() {
    let mut s = gray_surface(64, 64, 200);
    run(ScreenEffect::Grain, 1.0, &mut s, 0.0, 3);
    let darkened = s
        .data()
        .chunks_exact(4)
        .filter(|px| px[0] < 200)
        .count();
    assert!(darkened > 0);
    assert!(s.data().chunks_exact(4).all(|px| px[0] <= 200 && px[3] == 255));
    // Specks never land on the odd rows of a 4-row cell.
    assert!((0..64).all(|x| s.pixel(x, 2)[0] == 200));
}

#[test]
fn bloom_brightens() {
    let mut s = gray_surface(32, 32, 100);
    run(ScreenEffect::Bloom, 1.0, &mut s, 0.0, 1);
    assert!(s.pixel(16, 16)[0] > 100);
}

#[test]
fn glitch_never_triggers_at_zero_intensity() {
    let mut s = gray_surface(32, 32, 100);
    let before = s.data().to_vec();
    for seed in 0..50 {
        run(ScreenEffect::Glitch, 0.0, &mut s, 0.0, seed);
    }
    assert_eq!(s.data(), &before[..]);
}

#[test]
fn light_leak_blob_follows_absolute_time() {
    let (p, r, a) = light_leak_blob(0, 0.0, 1280.0, 720.0, 1.0);
    assert_eq!(p, Point::new(640.0, 720.0));
    assert_eq!(r, 640.0);
    assert!((a - 0.3).abs() < 1e-12);
}

#[test]
fn light_leak_screen_never_darkens() {
    let mut s = gray_surface(32, 32, 100);
    run(ScreenEffect::LightLeak, 1.0, &mut s, 1234.0, 1);
    assert!(s.data().chunks_exact(4).all(|px| px[0] >= 100));
    assert!(s.pixel(16, 16)[0] > 100);
}

#[test]
fn flare_sun_path() {
    assert_eq!(flare_sun(0.0, 1000.0, 1000.0), Point::new(500.0, 200.0));
}

#[test]
fn lens_flare_renders() {
    let mut s = gray_surface(64, 64, 50);
    run(ScreenEffect::LensFlare, 1.0, &mut s, 0.0, 1);
    assert!(s.pixel(32, 12)[0] > 50);
}

#[test]
fn sweep_start_cycles_every_five_seconds() {
    assert_eq!(sweep_start_x(0.0, 1000.0), -500.0);
    assert_eq!(sweep_start_x(2.5, 1000.0), 500.0);
    assert_eq!(sweep_start_x(5.0, 1000.0), -500.0);
}

#[test]
fn light_sweep_brightens_the_band_only() {
    let mut s = gray_surface(100, 10, 150);
    // t = 1.25s -> progress 0.25 -> start x 0, band 0..30 at the top row.
    run(ScreenEffect::LightSweep, 1.0, &mut s, 1250.0, 1);
    assert!(s.pixel(15, 0)[0] > 150);
    assert_eq!(s.pixel(80, 0)[0], 150);
}
