//! Image and audio inputs.

/// Still image decoding.
pub mod decode;
/// Audio decoding through the system `ffmpeg`.
pub mod media;
