use crate::foundation::color::Rgb;
use crate::foundation::error::{StudioError, StudioResult};
use crate::settings::visual::{
    ColorMode, FilterPreset, ParticleEffect, ScreenEffect, SpectrumStyle, VisualSettings,
};
use std::str::FromStr;

/// Replacement of exactly one settings field.
///
/// Setting an explicit color also forces that section back to [`ColorMode::Fixed`].
#[derive(Clone, Debug, PartialEq)]
pub enum SettingUpdate {
    /// `spectrum.style`
    SpectrumStyle(SpectrumStyle),
    /// `spectrum.color` (forces fixed mode)
    SpectrumColor(Rgb),
    /// `spectrum.colorMode`
    SpectrumColorMode(ColorMode),
    /// `spectrum.centered`
    SpectrumCentered(bool),
    /// `spectrum.x`
    SpectrumX(f64),
    /// `spectrum.y`
    SpectrumY(f64),
    /// `spectrum.width`
    SpectrumWidth(f64),
    /// `spectrum.barWidth`
    SpectrumBarWidth(f64),
    /// `spectrum.opacity`
    SpectrumOpacity(f64),
    /// `spectrum.sensitivity`
    SpectrumSensitivity(f64),
    /// `spectrum.frequencyRange`
    SpectrumFrequencyRange(usize),
    /// `spectrum.maxHeight`
    SpectrumMaxHeight(f64),
    /// `spectrum.thickness`
    SpectrumThickness(f64),
    /// `background.preset`
    FilterPreset(FilterPreset),
    /// `background.intensity`
    FilterIntensity(f64),
    /// `background.blur`
    BackgroundBlur(f64),
    /// `background.brightness`
    BackgroundBrightness(f64),
    /// `background.vignette`
    Vignette(f64),
    /// `particles.effect`
    ParticleEffect(ParticleEffect),
    /// `particles.density`
    ParticleDensity(f64),
    /// `particles.opacity`
    ParticleOpacity(f64),
    /// `particles.speed`
    ParticleSpeed(f64),
    /// `particles.size`
    ParticleSize(f64),
    /// `particles.color` (forces fixed mode)
    ParticleColor(Rgb),
    /// `particles.colorMode`
    ParticleColorMode(ColorMode),
    /// `screen.effect`
    ScreenEffect(ScreenEffect),
    /// `screen.intensity`
    ScreenIntensity(f64),
    /// `logo.x`
    LogoX(f64),
    /// `logo.y`
    LogoY(f64),
    /// `logo.size`
    LogoSize(f64),
    /// `logo.removeBackground`
    LogoRemoveBackground(bool),
    /// `logo.threshold`
    LogoThreshold(f64),
}

impl VisualSettings {
    /// Return a copy with one field replaced.
    pub fn with(&self, update: SettingUpdate) -> VisualSettings {
        let mut next = self.clone();
        let s = &mut next.spectrum;
        let b = &mut next.background;
        let p = &mut next.particles;
        match update {
            SettingUpdate::SpectrumStyle(v) => s.style = v,
            SettingUpdate::SpectrumColor(v) => {
                s.color = v;
                s.color_mode = ColorMode::Fixed;
            }
            SettingUpdate::SpectrumColorMode(v) => s.color_mode = v,
            SettingUpdate::SpectrumCentered(v) => s.centered = v,
            SettingUpdate::SpectrumX(v) => s.position.x = v,
            SettingUpdate::SpectrumY(v) => s.position.y = v,
            SettingUpdate::SpectrumWidth(v) => s.width = v,
            SettingUpdate::SpectrumBarWidth(v) => s.bar_width = v,
            SettingUpdate::SpectrumOpacity(v) => s.opacity = v,
            SettingUpdate::SpectrumSensitivity(v) => s.sensitivity = v,
            SettingUpdate::SpectrumFrequencyRange(v) => s.frequency_range = v,
            SettingUpdate::SpectrumMaxHeight(v) => s.max_height = v,
            SettingUpdate::SpectrumThickness(v) => s.thickness = v,
            SettingUpdate::FilterPreset(v) => b.filter_preset = v,
            SettingUpdate::FilterIntensity(v) => b.filter_intensity = v,
            SettingUpdate::BackgroundBlur(v) => b.blur = v,
            SettingUpdate::BackgroundBrightness(v) => b.brightness = v,
            SettingUpdate::Vignette(v) => b.vignette = v,
            SettingUpdate::ParticleEffect(v) => p.effect = v,
            SettingUpdate::ParticleDensity(v) => p.density = v,
            SettingUpdate::ParticleOpacity(v) => p.opacity = v,
            SettingUpdate::ParticleSpeed(v) => p.speed = v,
            SettingUpdate::ParticleSize(v) => p.size = v,
            SettingUpdate::ParticleColor(v) => {
                p.color = v;
                p.color_mode = ColorMode::Fixed;
            }
            SettingUpdate::ParticleColorMode(v) => p.color_mode = v,
            SettingUpdate::ScreenEffect(v) => next.screen.effect = v,
            SettingUpdate::ScreenIntensity(v) => next.screen.intensity = v,
            SettingUpdate::LogoX(v) => next.logo.position.x = v,
            SettingUpdate::LogoY(v) => next.logo.position.y = v,
            SettingUpdate::LogoSize(v) => next.logo.size = v,
            SettingUpdate::LogoRemoveBackground(v) => next.logo.remove_background = v,
            SettingUpdate::LogoThreshold(v) => next.logo.threshold = v,
        }
        next
    }

    /// Apply an update and validate the result.
    pub fn try_with(&self, update: SettingUpdate) -> StudioResult<VisualSettings> {
        let next = self.with(update);
        next.validate()?;
        Ok(next)
    }
}

fn kebab_enum<T: serde::de::DeserializeOwned>(key: &str, value: &str) -> StudioResult<T> {
    serde_json::from_value(serde_json::Value::String(value.to_owned()))
        .map_err(|_| StudioError::validation(format!("invalid value '{value}' for {key}")))
}

fn scalar<T: FromStr>(key: &str, value: &str) -> StudioResult<T> {
    value
        .parse()
        .map_err(|_| StudioError::validation(format!("invalid value '{value}' for {key}")))
}

fn color(key: &str, value: &str) -> StudioResult<Rgb> {
    Rgb::parse_hex(value).map_err(|e| StudioError::validation(format!("{key}: {e}")))
}

impl FromStr for SettingUpdate {
    type Err = StudioError;

    /// Parse `section.key=value`, e.g. `spectrum.style=mirror-bar`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| StudioError::validation(format!("expected key=value, got '{s}'")))?;
        let key = key.trim();
        let value = value.trim();
        Ok(match key {
            "spectrum.style" => Self::SpectrumStyle(kebab_enum(key, value)?),
            "spectrum.color" => Self::SpectrumColor(color(key, value)?),
            "spectrum.colorMode" => Self::SpectrumColorMode(kebab_enum(key, value)?),
            "spectrum.centered" => Self::SpectrumCentered(scalar(key, value)?),
            "spectrum.x" => Self::SpectrumX(scalar(key, value)?),
            "spectrum.y" => Self::SpectrumY(scalar(key, value)?),
            "spectrum.width" => Self::SpectrumWidth(scalar(key, value)?),
            "spectrum.barWidth" => Self::SpectrumBarWidth(scalar(key, value)?),
            "spectrum.opacity" => Self::SpectrumOpacity(scalar(key, value)?),
            "spectrum.sensitivity" => Self::SpectrumSensitivity(scalar(key, value)?),
            "spectrum.frequencyRange" => Self::SpectrumFrequencyRange(scalar(key, value)?),
            "spectrum.maxHeight" => Self::SpectrumMaxHeight(scalar(key, value)?),
            "spectrum.thickness" => Self::SpectrumThickness(scalar(key, value)?),
            "background.preset" => Self::FilterPreset(kebab_enum(key, value)?),
            "background.intensity" => Self::FilterIntensity(scalar(key, value)?),
            "background.blur" => Self::BackgroundBlur(scalar(key, value)?),
            "background.brightness" => Self::BackgroundBrightness(scalar(key, value)?),
            "background.vignette" => Self::Vignette(scalar(key, value)?),
            "particles.effect" => Self::ParticleEffect(kebab_enum(key, value)?),
            "particles.density" => Self::ParticleDensity(scalar(key, value)?),
            "particles.opacity" => Self::ParticleOpacity(scalar(key, value)?),
            "particles.speed" => Self::ParticleSpeed(scalar(key, value)?),
            "particles.size" => Self::ParticleSize(scalar(key, value)?),
            "particles.color" => Self::ParticleColor(color(key, value)?),
            "particles.colorMode" => Self::ParticleColorMode(kebab_enum(key, value)?),
            "screen.effect" => Self::ScreenEffect(kebab_enum(key, value)?),
            "screen.intensity" => Self::ScreenIntensity(scalar(key, value)?),
            "logo.x" => Self::LogoX(scalar(key, value)?),
            "logo.y" => Self::LogoY(scalar(key, value)?),
            "logo.size" => Self::LogoSize(scalar(key, value)?),
            "logo.removeBackground" => Self::LogoRemoveBackground(scalar(key, value)?),
            "logo.threshold" => Self::LogoThreshold(scalar(key, value)?),
            _ => {
                return Err(StudioError::validation(format!(
                    "unknown setting '{key}'"
                )));
            }
        })
    }
}
