use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::{StudioError, StudioResult};

/// Decoded still image (background or logo) kept as straight-alpha RGBA8.
///
/// `id` is a content hash so caches keyed on it survive re-loading the same file.
#[derive(Clone, Debug)]
pub struct ImageAsset {
    /// xxh3 hash of the decoded pixels and dimensions.
    pub id: u64,
    /// Straight-alpha RGBA8 pixels.
    pub rgba: Arc<image::RgbaImage>,
}

impl ImageAsset {
    /// Decode encoded image bytes (PNG, JPEG, ...).
    pub fn from_bytes(bytes: &[u8]) -> StudioResult<Self> {
        let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
        Ok(Self::from_rgba(dyn_img.to_rgba8()))
    }

    /// Read and decode an image file.
    pub fn from_path(path: &Path) -> StudioResult<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
        Self::from_bytes(&bytes).map_err(|e| {
            StudioError::validation(format!("failed to decode '{}': {e}", path.display()))
        })
    }

    /// Wrap already decoded pixels.
    pub fn from_rgba(rgba: image::RgbaImage) -> Self {
        let (w, h) = rgba.dimensions();
        let mut hasher = xxhash_rust::xxh3::Xxh3::new();
        hasher.update(&w.to_le_bytes());
        hasher.update(&h.to_le_bytes());
        hasher.update(rgba.as_raw());
        Self {
            id: hasher.digest(),
            rgba: Arc::new(rgba),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.rgba.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.rgba.height()
    }
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
