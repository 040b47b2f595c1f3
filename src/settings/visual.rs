use crate::foundation::color::Rgb;
use crate::foundation::error::{StudioError, StudioResult};
use serde::{Deserialize, Serialize};

/// Geometric layout used to visualize frequency magnitudes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpectrumStyle {
    /// Layer skipped.
    None,
    /// Evenly spaced vertical bars.
    #[default]
    Bar,
    /// Bars drawn up and down from the anchor.
    MirrorBar,
    /// Six-band subset anchored beside the logo.
    MiniBar,
    /// Bars radiating from the anchor.
    Circle,
    /// Single polyline.
    Line,
    /// Three offset polylines.
    Wave,
}

/// Fixed color or a time-rotating rainbow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    /// Use the configured color.
    #[default]
    Fixed,
    /// Hue derived from index and the color-cycle counter.
    Rainbow,
}

impl ColorMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            Self::Fixed => Self::Rainbow,
            Self::Rainbow => Self::Fixed,
        }
    }
}

/// Background color grading preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterPreset {
    /// No grading beyond blur and brightness.
    #[default]
    Original,
    /// Contrast + saturation lift.
    Cinematic,
    /// Sepia with reduced contrast.
    Vintage,
    /// Grayscale with extra contrast.
    Noir,
    /// Brighter and more saturated.
    Dreamy,
    /// Strong saturation.
    Vivid,
}

/// Ambient particle overlay kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParticleEffect {
    /// No particles.
    #[default]
    None,
    /// Thin falling streaks.
    Rain,
    /// Drifting flakes.
    Snow,
    /// Generic circle drift.
    Sparkle,
    /// Generic circle drift.
    Heart,
    /// Rising glowing sparks.
    Embers,
    /// Pulsing glowing dots.
    Fireflies,
    /// Falling rotating ellipses.
    Petals,
    /// Tiny slow points.
    Dust,
    /// Large transparent blobs drifting sideways.
    Fog,
    /// Large soft circles.
    Bokeh,
    /// Rotating colored rectangles.
    Confetti,
}

/// Full-frame post-processing pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenEffect {
    /// No post-processing.
    #[default]
    None,
    /// Random slice displacement.
    Glitch,
    /// Dark speckle overlay.
    Grain,
    /// Blurred screen-blended self copy.
    Bloom,
    /// Scan lines.
    Vhs,
    /// Orbiting warm gradients.
    LightLeak,
    /// Moving light source with streaks and ghosts.
    LensFlare,
    /// Diagonal bright band.
    LightSweep,
}

/// Position in percent of the canvas (0..=100 on both axes).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal percent.
    pub x: f64,
    /// Vertical percent.
    pub y: f64,
}

/// Spectrum layer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpectrumSettings {
    /// Active style.
    pub style: SpectrumStyle,
    /// Color used in fixed mode.
    pub color: Rgb,
    /// Fixed or rainbow coloring.
    pub color_mode: ColorMode,
    /// Anchor at the canvas center instead of `position`.
    pub centered: bool,
    /// Anchor in percent when not centered.
    pub position: Position,
    /// Span of the line style in percent of the canvas width.
    pub width: f64,
    /// Bar width in pixels.
    pub bar_width: f64,
    /// Layer alpha.
    pub opacity: f64,
    /// Magnitude multiplier.
    pub sensitivity: f64,
    /// Number of samples drawn.
    pub frequency_range: usize,
    /// Height multiplier.
    pub max_height: f64,
    /// Stroke width for line/wave/circle.
    pub thickness: f64,
}

impl Default for SpectrumSettings {
    fn default() -> Self {
        Self {
            style: SpectrumStyle::Bar,
            color: Rgb::WHITE,
            color_mode: ColorMode::Fixed,
            centered: true,
            position: Position { x: 50.0, y: 50.0 },
            width: 80.0,
            bar_width: 5.0,
            opacity: 1.0,
            sensitivity: 1.2,
            frequency_range: 64,
            max_height: 1.0,
            thickness: 2.0,
        }
    }
}

/// Background layer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackgroundSettings {
    /// Grading preset.
    pub filter_preset: FilterPreset,
    /// Preset strength.
    pub filter_intensity: f64,
    /// Blur radius in pixels.
    pub blur: f64,
    /// CSS brightness factor.
    pub brightness: f64,
    /// Vignette darkness at the edge (0..=1).
    pub vignette: f64,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            filter_preset: FilterPreset::Original,
            filter_intensity: 1.0,
            blur: 0.0,
            brightness: 0.5,
            vignette: 0.3,
        }
    }
}

/// Particle overlay settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParticleSettings {
    /// Active effect.
    pub effect: ParticleEffect,
    /// Population is `floor(density * 2)`.
    pub density: f64,
    /// Global particle alpha.
    pub opacity: f64,
    /// Velocity multiplier applied at seeding.
    pub speed: f64,
    /// Size multiplier applied at seeding.
    pub size: f64,
    /// Color used in fixed mode.
    pub color: Rgb,
    /// Fixed or rainbow coloring.
    pub color_mode: ColorMode,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            effect: ParticleEffect::None,
            density: 50.0,
            opacity: 0.7,
            speed: 1.0,
            size: 3.0,
            color: Rgb::WHITE,
            color_mode: ColorMode::Fixed,
        }
    }
}

/// Screen effect settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScreenSettings {
    /// Active effect.
    pub effect: ScreenEffect,
    /// Effect strength (0..=1).
    pub intensity: f64,
}

impl Default for ScreenSettings {
    fn default() -> Self {
        Self {
            effect: ScreenEffect::None,
            intensity: 0.5,
        }
    }
}

/// Logo layer settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogoSettings {
    /// Placement in percent of the free space.
    pub position: Position,
    /// Drawn size in percent of the natural image size.
    pub size: f64,
    /// Color-key the top-left pixel color out of the logo.
    pub remove_background: bool,
    /// Color-key distance threshold (scaled by 3).
    pub threshold: f64,
}

impl Default for LogoSettings {
    fn default() -> Self {
        Self {
            position: Position { x: 90.0, y: 10.0 },
            size: 15.0,
            remove_background: false,
            threshold: 10.0,
        }
    }
}

/// Per-frame configuration snapshot read by the compositor.
///
/// Exactly one spectrum style, particle effect and screen effect is active at a time. Values are
/// replaced wholesale through [`VisualSettings::with`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VisualSettings {
    /// Spectrum layer.
    pub spectrum: SpectrumSettings,
    /// Background layer.
    pub background: BackgroundSettings,
    /// Particle overlay.
    pub particles: ParticleSettings,
    /// Screen effect.
    pub screen: ScreenSettings,
    /// Logo layer.
    pub logo: LogoSettings,
}

impl VisualSettings {
    /// Load settings from a JSON file; missing fields take their defaults.
    pub fn from_path(path: &std::path::Path) -> StudioResult<Self> {
        use anyhow::Context as _;
        let bytes = std::fs::read(path)
            .with_context(|| format!("read settings '{}'", path.display()))?;
        let settings: Self = serde_json::from_slice(&bytes)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check numeric ranges.
    pub fn validate(&self) -> StudioResult<()> {
        fn unit(name: &str, v: f64) -> StudioResult<()> {
            if !(0.0..=1.0).contains(&v) {
                return Err(StudioError::validation(format!(
                    "{name} must be within 0..=1, got {v}"
                )));
            }
            Ok(())
        }
        fn non_negative(name: &str, v: f64) -> StudioResult<()> {
            if !v.is_finite() || v < 0.0 {
                return Err(StudioError::validation(format!(
                    "{name} must be finite and >= 0, got {v}"
                )));
            }
            Ok(())
        }
        fn at_most(name: &str, v: f64, max: f64) -> StudioResult<()> {
            non_negative(name, v)?;
            if v > max {
                return Err(StudioError::validation(format!(
                    "{name} must be <= {max}, got {v}"
                )));
            }
            Ok(())
        }
        fn percent(name: &str, p: Position) -> StudioResult<()> {
            if !(0.0..=100.0).contains(&p.x) || !(0.0..=100.0).contains(&p.y) {
                return Err(StudioError::validation(format!(
                    "{name} must be within 0..=100 on both axes"
                )));
            }
            Ok(())
        }

        let s = &self.spectrum;
        unit("spectrum.opacity", s.opacity)?;
        percent("spectrum.position", s.position)?;
        non_negative("spectrum.width", s.width)?;
        non_negative("spectrum.barWidth", s.bar_width)?;
        non_negative("spectrum.sensitivity", s.sensitivity)?;
        non_negative("spectrum.maxHeight", s.max_height)?;
        non_negative("spectrum.thickness", s.thickness)?;
        if s.frequency_range == 0 || s.frequency_range > MAX_FREQUENCY_RANGE {
            return Err(StudioError::validation(format!(
                "spectrum.frequencyRange must be within 1..={MAX_FREQUENCY_RANGE}"
            )));
        }

        let b = &self.background;
        non_negative("background.filterIntensity", b.filter_intensity)?;
        at_most("background.blur", b.blur, MAX_BACKGROUND_BLUR)?;
        non_negative("background.brightness", b.brightness)?;
        unit("background.vignette", b.vignette)?;

        let p = &self.particles;
        non_negative("particles.density", p.density)?;
        if p.density > MAX_PARTICLE_DENSITY {
            return Err(StudioError::validation(format!(
                "particles.density must be <= {MAX_PARTICLE_DENSITY}"
            )));
        }
        unit("particles.opacity", p.opacity)?;
        non_negative("particles.speed", p.speed)?;
        non_negative("particles.size", p.size)?;

        unit("screen.intensity", self.screen.intensity)?;

        percent("logo.position", self.logo.position)?;
        at_most("logo.size", self.logo.size, MAX_LOGO_SIZE)?;
        non_negative("logo.threshold", self.logo.threshold)?;
        Ok(())
    }

    /// `true` when moving from `self` to `next` requires a particle reseed.
    pub fn reseeds_particles(&self, next: &VisualSettings) -> bool {
        self.particles.effect != next.particles.effect
            || self.particles.density != next.particles.density
    }
}

/// Upper bound for `spectrum.frequencyRange`.
pub const MAX_FREQUENCY_RANGE: usize = 512;
/// Upper bound for `particles.density`.
pub const MAX_PARTICLE_DENSITY: f64 = 1000.0;
/// Upper bound for `background.blur`, in pixels.
pub const MAX_BACKGROUND_BLUR: f64 = 200.0;
/// Upper bound for `logo.size`, in percent of the natural image size.
pub const MAX_LOGO_SIZE: f64 = 1000.0;
