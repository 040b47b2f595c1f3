//! Audio source, analysis tap and the monitor/capture fan-out.

/// Frequency analysis.
pub mod analyzer;
/// Fan-out graph with monitor and capture taps.
pub mod graph;
/// Timeline PCM rendering and temp files for the encoder.
pub mod mix;
/// Tracks, playlist and transport.
pub mod playlist;
