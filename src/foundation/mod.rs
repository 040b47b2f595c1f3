//! Shared primitives: geometry re-exports, colors, error taxonomy and fixed-point helpers.

/// Colors and CSS-style color functions.
pub mod color;
/// Frame rate, canvas and pixel primitives.
pub mod core;
/// Error taxonomy.
pub mod error;
pub(crate) mod math;
