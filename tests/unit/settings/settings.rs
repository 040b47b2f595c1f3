use super::project::{EncodingSettings, ProjectConfig, Resolution, suggested_filename};
use super::update::SettingUpdate;
use super::visual::*;
use crate::foundation::color::Rgb;
use crate::foundation::core::Canvas;
use serde_json::json;

#[test]
fn defaults_match_the_studio_presets() {
    let s = VisualSettings::default();
    assert_eq!(s.spectrum.style, SpectrumStyle::Bar);
    assert_eq!(s.spectrum.color, Rgb::WHITE);
    assert_eq!(s.spectrum.frequency_range, 64);
    assert!((s.spectrum.sensitivity - 1.2).abs() < 1e-12);
    assert!((s.background.brightness - 0.5).abs() < 1e-12);
    assert!((s.background.vignette - 0.3).abs() < 1e-12);
    assert_eq!(s.particles.effect, ParticleEffect::None);
    assert!((s.particles.density - 50.0).abs() < 1e-12);
    assert_eq!(s.screen.effect, ScreenEffect::None);
    assert!((s.logo.position.x - 90.0).abs() < 1e-12);
    assert!(s.validate().is_ok());
}

#[test]
fn with_replaces_exactly_one_field() {
    let s = VisualSettings::default();
    let next = s.with(SettingUpdate::SpectrumStyle(SpectrumStyle::Wave));
    assert_eq!(next.spectrum.style, SpectrumStyle::Wave);
    let mut expected = s.clone();
    expected.spectrum.style = SpectrumStyle::Wave;
    assert_eq!(next, expected);
    // The original snapshot is untouched.
    assert_eq!(s.spectrum.style, SpectrumStyle::Bar);
}

#[test]
fn manual_hex_forces_fixed_mode() {
    let s = VisualSettings::default()
        .with(SettingUpdate::SpectrumColorMode(ColorMode::Fixed.toggled()));
    assert_eq!(s.spectrum.color_mode, ColorMode::Rainbow);

    let hex: SettingUpdate = "spectrum.color=#ff00aa".parse().unwrap();
    let s = s.with(hex);
    assert_eq!(s.spectrum.color_mode, ColorMode::Fixed);
    assert_eq!(s.spectrum.color, Rgb::new(255, 0, 170));

    let p = VisualSettings::default()
        .with(SettingUpdate::ParticleColorMode(ColorMode::Rainbow))
        .with(SettingUpdate::ParticleColor(Rgb::new(1, 2, 3)));
    assert_eq!(p.particles.color_mode, ColorMode::Fixed);
}

#[test]
fn parses_cli_updates() {
    let u: SettingUpdate = "spectrum.style=mirror-bar".parse().unwrap();
    assert_eq!(u, SettingUpdate::SpectrumStyle(SpectrumStyle::MirrorBar));
    let u: SettingUpdate = "screen.effect = light-leak".parse().unwrap();
    assert_eq!(u, SettingUpdate::ScreenEffect(ScreenEffect::LightLeak));
    let u: SettingUpdate = "logo.removeBackground=true".parse().unwrap();
    assert_eq!(u, SettingUpdate::LogoRemoveBackground(true));
    let u: SettingUpdate = "particles.density=12.5".parse().unwrap();
    assert_eq!(u, SettingUpdate::ParticleDensity(12.5));

    assert!("spectrum.style".parse::<SettingUpdate>().is_err());
    assert!("spectrum.style=sparkly".parse::<SettingUpdate>().is_err());
    assert!("nope.key=1".parse::<SettingUpdate>().is_err());
}

#[test]
fn try_with_rejects_out_of_range() {
    let s = VisualSettings::default();
    assert!(s.try_with(SettingUpdate::SpectrumOpacity(1.5)).is_err());
    assert!(s.try_with(SettingUpdate::SpectrumFrequencyRange(0)).is_err());
    assert!(s.try_with(SettingUpdate::ParticleDensity(-1.0)).is_err());
    assert!(s.try_with(SettingUpdate::Vignette(0.9)).is_ok());
}

#[test]
fn logo_size_and_blur_are_bounded() {
    let s = VisualSettings::default();
    assert!(s.try_with(SettingUpdate::LogoSize(MAX_LOGO_SIZE)).is_ok());
    assert!(s.try_with(SettingUpdate::LogoSize(1e12)).is_err());
    assert!(s.try_with(SettingUpdate::BackgroundBlur(MAX_BACKGROUND_BLUR)).is_ok());
    assert!(s.try_with(SettingUpdate::BackgroundBlur(MAX_BACKGROUND_BLUR + 1.0)).is_err());

    let json = serde_json::json!({ "logo": { "size": 5000.0 } });
    let parsed: VisualSettings = serde_json::from_value(json).unwrap();
    assert!(parsed.validate().is_err());
}

#[test]
fn reseed_only_on_effect_or_density() {
    let s = VisualSettings::default();
    assert!(!s.reseeds_particles(&s.with(SettingUpdate::ParticleSpeed(3.0))));
    assert!(s.reseeds_particles(&s.with(SettingUpdate::ParticleDensity(10.0))));
    assert!(s.reseeds_particles(&s.with(SettingUpdate::ParticleEffect(ParticleEffect::Snow))));
}

#[test]
fn partial_json_fills_defaults() {
    let s: VisualSettings = serde_json::from_value(json!({
        "spectrum": { "style": "circle", "colorMode": "rainbow" },
        "particles": { "effect": "fireflies" }
    }))
    .unwrap();
    assert_eq!(s.spectrum.style, SpectrumStyle::Circle);
    assert_eq!(s.spectrum.color_mode, ColorMode::Rainbow);
    assert_eq!(s.spectrum.bar_width, 5.0);
    assert_eq!(s.particles.effect, ParticleEffect::Fireflies);
    assert_eq!(s.background, BackgroundSettings::default());
}

#[test]
fn encoding_validation() {
    assert!(EncodingSettings::default().validate().is_ok());
    let bad = EncodingSettings {
        loop_count: 4,
        audio_bitrate: 192_000,
    };
    assert!(bad.validate().is_err());
    let bad = EncodingSettings {
        loop_count: 2,
        audio_bitrate: 64_000,
    };
    assert!(bad.validate().is_err());
}

#[test]
fn filename_is_sanitized() {
    assert_eq!(suggested_filename("My Mix #1"), "My_Mix__1.mp4");
    assert_eq!(suggested_filename("abc123"), "abc123.mp4");
    assert_eq!(suggested_filename("café"), "caf_.mp4");
}

#[test]
fn project_json_resolution() {
    let p: ProjectConfig = serde_json::from_value(json!({
        "name": "demo",
        "resolution": "1080p",
        "encoding": { "loopCount": 2 }
    }))
    .unwrap();
    assert_eq!(p.resolution, Resolution::FullHd1080);
    assert_eq!(p.resolution.canvas(), Canvas::FULL_HD_1080);
    assert_eq!(p.encoding.loop_count, 2);
    assert_eq!(p.encoding.audio_bitrate, 192_000);
    assert!(p.validate().is_ok());
}
