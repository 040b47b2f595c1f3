use crate::foundation::core::{Canvas, Rgba8Premul};
use crate::foundation::error::{StudioError, StudioResult};

/// A rendered frame as RGBA8 pixels.
///
/// Frames are **premultiplied alpha** unless `premultiplied` says otherwise.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Straight-alpha copy of this frame, suitable for PNG encoding.
    pub fn to_straight(&self) -> FrameRGBA {
        if !self.premultiplied {
            return self.clone();
        }
        let mut data = self.data.clone();
        for px in data.chunks_exact_mut(4) {
            let a = u32::from(px[3]);
            if a == 0 || a == 255 {
                continue;
            }
            for c in &mut px[..3] {
                *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        FrameRGBA {
            width: self.width,
            height: self.height,
            data,
            premultiplied: false,
        }
    }
}

/// Fixed-size premultiplied RGBA8 raster the scene is composed onto.
#[derive(Clone, Debug)]
pub struct Surface {
    canvas: Canvas,
    data: Vec<u8>,
}

impl Surface {
    /// Transparent surface of `canvas` size.
    pub fn new(canvas: Canvas) -> Self {
        Self {
            canvas,
            data: vec![0; canvas.rgba_len()],
        }
    }

    /// Wrap premultiplied bytes.
    pub fn from_premul(canvas: Canvas, data: Vec<u8>) -> StudioResult<Self> {
        if data.len() != canvas.rgba_len() {
            return Err(StudioError::render(format!(
                "surface byte len mismatch: got {}, expected {}",
                data.len(),
                canvas.rgba_len()
            )));
        }
        Ok(Self { canvas, data })
    }

    /// Dimensions.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.canvas.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.canvas.height
    }

    /// Premultiplied bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable premultiplied bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Reset to transparent black.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Fill every pixel with `color`.
    pub fn fill(&mut self, color: Rgba8Premul) {
        let px = color.to_array();
        for d in self.data.chunks_exact_mut(4) {
            d.copy_from_slice(&px);
        }
    }

    /// Read one pixel; out-of-bounds reads are transparent.
    pub fn pixel(&self, x: i64, y: i64) -> [u8; 4] {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return [0, 0, 0, 0];
        }
        let i = self.index(x as u32, y as u32);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Write one pixel; out-of-bounds writes are ignored.
    pub fn set_pixel(&mut self, x: i64, y: i64, px: [u8; 4]) {
        if x < 0 || y < 0 || x >= i64::from(self.width()) || y >= i64::from(self.height()) {
            return;
        }
        let i = self.index(x as u32, y as u32);
        self.data[i..i + 4].copy_from_slice(&px);
    }

    /// Byte length of one row.
    pub fn stride(&self) -> usize {
        self.canvas.width as usize * 4
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.canvas.width as usize + x as usize) * 4
    }

    /// Copy the pixels into a [`FrameRGBA`].
    pub fn to_frame(&self) -> FrameRGBA {
        FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.data.clone(),
            premultiplied: true,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
