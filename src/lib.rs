//! Spectrum Studio renders an audio-reactive scene onto a CPU raster surface and captures it,
//! together with the playlist audio, into an encoded video.
//!
//! - Build a [`StudioController`] from a [`ProjectConfig`] (or from decoded tracks)
//! - Drive it with [`StudioController::tick`]; the [`FrameClock`] runs wall-clock preview or
//!   fixed-step export
//! - Export through a [`CaptureSession`] that streams to a destination or buffers in memory
#![forbid(unsafe_code)]
#![deny(missing_docs)]

/// Image and audio inputs.
pub mod assets;
/// Audio playlist, transport, analysis and the monitor/capture graph.
pub mod audio;
/// Export capture pipeline.
pub mod capture;
/// Frame clock and tick sources.
pub mod clock;
/// Shared primitives and the error taxonomy.
pub mod foundation;
/// CPU raster pipeline.
pub mod render;
/// Scene layers.
pub mod scene;
/// Settings, structural updates and project files.
pub mod settings;
/// Session controller.
pub mod studio;

pub use crate::foundation::core::{Affine, Canvas, Fps, FrameIndex, Point, Rect, Rgba8Premul};
pub use crate::foundation::error::{StudioError, StudioResult};

pub use crate::assets::decode::ImageAsset;
pub use crate::assets::media::{AudioPcm, is_ffmpeg_on_path};
pub use crate::audio::analyzer::{FftAnalyzer, FrequencyAnalyzer, StaticAnalyzer};
pub use crate::audio::graph::{AudioGraph, MonitorGain};
pub use crate::audio::playlist::{AudioTrack, PlaybackCursor, Player, Playlist, TrackEnd};
pub use crate::capture::{
    CaptureOpts, CaptureSession, CaptureState, CodecProfile, DestinationPicker, FfmpegEncoder,
    FileDestinationPicker, FinalizedOutput, InMemoryEncoder, MediaEncoder, Notice, OutputBlob,
    OutputStrategy, PickError, UnavailablePicker, WriteDestination,
};
pub use crate::clock::{ClockMode, FrameClock, FrameTick, Pacing, TickSource};
pub use crate::render::{FrameRGBA, Surface};
pub use crate::scene::{FrameContext, ParticleSystem, SceneCompositor};
pub use crate::settings::project::{ProjectConfig, Resolution, suggested_filename};
pub use crate::settings::update::SettingUpdate;
pub use crate::settings::visual::VisualSettings;
pub use crate::studio::{ExportStart, StudioController, TickReport};
