use crate::foundation::core::Canvas;
use crate::foundation::error::{StudioError, StudioResult};
use crate::settings::visual::VisualSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output resolution choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// 1280x720.
    #[default]
    #[serde(rename = "720p")]
    Hd720,
    /// 1920x1080.
    #[serde(rename = "1080p")]
    FullHd1080,
}

impl Resolution {
    /// Surface dimensions for this resolution.
    pub fn canvas(self) -> Canvas {
        match self {
            Self::Hd720 => Canvas::HD_720,
            Self::FullHd1080 => Canvas::FULL_HD_1080,
        }
    }
}

/// Encoding inputs accepted from the project form.
///
/// `audio_bitrate` is informational; capture uses a fixed encoder bitrate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncodingSettings {
    /// Number of playlist repetitions (1..=3).
    pub loop_count: u32,
    /// Requested audio bitrate (96000, 128000 or 192000).
    pub audio_bitrate: u32,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            loop_count: 1,
            audio_bitrate: 192_000,
        }
    }
}

impl EncodingSettings {
    /// Check loop count and bitrate against the accepted values.
    pub fn validate(&self) -> StudioResult<()> {
        if !(1..=3).contains(&self.loop_count) {
            return Err(StudioError::validation(format!(
                "loopCount must be within 1..=3, got {}",
                self.loop_count
            )));
        }
        if ![96_000, 128_000, 192_000].contains(&self.audio_bitrate) {
            return Err(StudioError::validation(format!(
                "audioBitrate must be 96000, 128000 or 192000, got {}",
                self.audio_bitrate
            )));
        }
        Ok(())
    }
}

/// Project file gathering every collaborator input for a studio session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Project name, used for the suggested output filename.
    pub name: String,
    /// Ordered audio track paths.
    pub tracks: Vec<PathBuf>,
    /// Optional background image path.
    pub background: Option<PathBuf>,
    /// Optional logo image path.
    pub logo: Option<PathBuf>,
    /// Surface resolution.
    pub resolution: Resolution,
    /// Loop count and bitrate.
    pub encoding: EncodingSettings,
    /// Visual settings snapshot.
    pub settings: VisualSettings,
}

impl ProjectConfig {
    /// Load and validate a JSON project. Relative paths resolve against the file's directory.
    pub fn from_path(path: &Path) -> StudioResult<Self> {
        use anyhow::Context as _;
        let bytes =
            std::fs::read(path).with_context(|| format!("read project '{}'", path.display()))?;
        let mut project: Self = serde_json::from_slice(&bytes)?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        project.resolve_paths(root);
        project.validate()?;
        Ok(project)
    }

    /// Validate settings and encoding inputs.
    pub fn validate(&self) -> StudioResult<()> {
        self.encoding.validate()?;
        self.settings.validate()
    }

    /// Output filename suggested to the destination picker.
    pub fn suggested_filename(&self) -> String {
        suggested_filename(&self.name)
    }

    fn resolve_paths(&mut self, root: &Path) {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = root.join(&*p);
            }
        };
        self.tracks.iter_mut().for_each(fix);
        if let Some(p) = self.background.as_mut() {
            fix(p);
        }
        if let Some(p) = self.logo.as_mut() {
            fix(p);
        }
    }
}

/// Replace every character outside `[A-Za-z0-9]` with `_` and append `.mp4`.
pub fn suggested_filename(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{stem}.mp4")
}
