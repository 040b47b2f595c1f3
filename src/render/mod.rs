//! CPU raster pipeline: surfaces, vector layers, blends, blur and color filters.

/// Separable Gaussian blur on premultiplied buffers.
pub mod blur;
/// Blend modes and layer compositing.
pub mod composite;
/// CSS-style color matrices and filter chains.
pub mod filter;
/// Linear and radial gradient fills.
pub mod gradient;
/// vello_cpu-backed shape layers.
pub mod painter;
/// Premultiplied RGBA8 surface and frames.
pub mod surface;

pub use composite::BlendMode;
pub use painter::{ImagePaint, Painter, Shapes};
pub use surface::{FrameRGBA, Surface};
