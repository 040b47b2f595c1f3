//! Scene layers drawn each frame: background, particles, spectrum and screen effects.

/// Frame compositor owning the layer caches.
pub mod compositor;
/// Full-screen post effects.
pub mod effects;
/// Particle simulation and drawing.
pub mod particles;
/// Spectrum geometry for every style.
pub mod spectrum;

pub use compositor::{FrameContext, SceneCompositor};
pub use particles::ParticleSystem;
