use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use tracing::{debug, info};

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{StudioError, StudioResult};
use crate::render::FrameRGBA;

/// Container family of an encoded stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    /// Fragmented MP4.
    Mp4,
    /// WebM (Matroska).
    Webm,
}

/// Codec/container combinations, probed in [`CodecProfile::PREFERENCE`] order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodecProfile {
    /// H.264 High profile with AAC.
    Mp4H264High,
    /// H.264 Main profile with AAC.
    Mp4H264Main,
    /// Generic MP4 (MPEG-4 part 2 video) with AAC.
    Mp4,
    /// VP9 with Opus.
    WebmVp9,
    /// VP8 with Vorbis.
    Webm,
}

impl CodecProfile {
    /// Best first.
    pub const PREFERENCE: [CodecProfile; 5] = [
        CodecProfile::Mp4H264High,
        CodecProfile::Mp4H264Main,
        CodecProfile::Mp4,
        CodecProfile::WebmVp9,
        CodecProfile::Webm,
    ];

    /// Stable identifier.
    pub fn id(self) -> &'static str {
        match self {
            Self::Mp4H264High => "mp4-h264-high",
            Self::Mp4H264Main => "mp4-h264-main",
            Self::Mp4 => "mp4",
            Self::WebmVp9 => "webm-vp9",
            Self::Webm => "webm",
        }
    }

    /// MIME type of the produced stream.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Mp4H264High => "video/mp4; codecs=\"avc1.640034, mp4a.40.2\"",
            Self::Mp4H264Main => "video/mp4; codecs=\"avc1.4d002a, mp4a.40.2\"",
            Self::Mp4 => "video/mp4",
            Self::WebmVp9 => "video/webm; codecs=vp9",
            Self::Webm => "video/webm",
        }
    }

    /// Container family.
    pub fn container(self) -> Container {
        match self {
            Self::Mp4H264High | Self::Mp4H264Main | Self::Mp4 => Container::Mp4,
            Self::WebmVp9 | Self::Webm => Container::Webm,
        }
    }

    /// `(video, audio)` encoder names as ffmpeg knows them.
    pub fn encoders(self) -> (&'static str, &'static str) {
        match self {
            Self::Mp4H264High | Self::Mp4H264Main => ("libx264", "aac"),
            Self::Mp4 => ("mpeg4", "aac"),
            Self::WebmVp9 => ("libvpx-vp9", "libopus"),
            Self::Webm => ("libvpx", "libvorbis"),
        }
    }

    /// `(profile, level)` pinned for H.264 variants.
    pub fn h264_profile(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Mp4H264High => Some(("high", "5.2")),
            Self::Mp4H264Main => Some(("main", "4.2")),
            _ => None,
        }
    }
}

/// MIME type used when negotiation fell back to the encoder default.
pub const DEFAULT_MIME: &str = "video/mp4";

/// Pick the first profile in preference order that `encoder` supports.
///
/// `None` means every probe failed and the encoder default configuration should be used.
pub fn negotiate_codec(encoder: &dyn MediaEncoder) -> Option<CodecProfile> {
    let picked = CodecProfile::PREFERENCE
        .into_iter()
        .find(|p| encoder.is_supported(*p));
    match picked {
        Some(p) => info!(profile = p.id(), "codec negotiated"),
        None => info!("no preferred codec supported; using encoder defaults"),
    }
    picked
}

/// Raw PCM file the encoder muxes alongside the frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioInput {
    /// Interleaved f32le samples.
    pub path: PathBuf,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
}

/// Parameters for one encoder run.
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Input frame rate.
    pub fps: Fps,
    /// Negotiated profile; `None` uses encoder defaults.
    pub profile: Option<CodecProfile>,
    /// Target video bitrate in bits per second.
    pub video_bitrate: u32,
    /// Target audio bitrate in bits per second.
    pub audio_bitrate: u32,
    /// Emit a chunk at this cadence; `None` emits a single chunk at end of stream.
    pub timeslice: Option<Duration>,
    /// Audio track, if any.
    pub audio: Option<AudioInput>,
}

impl EncoderConfig {
    /// Reject sizes and rates the encoders cannot take.
    pub fn validate(&self) -> StudioResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StudioError::validation("encoder width/height must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(StudioError::validation(
                "encoder width/height must be even (required for yuv420p output)",
            ));
        }
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(StudioError::validation("encoder fps must be non-zero"));
        }
        if self.timeslice.is_some_and(|t| t.is_zero()) {
            return Err(StudioError::validation("encoder timeslice must be > 0"));
        }
        if let Some(audio) = &self.audio
            && (audio.sample_rate == 0 || audio.channels == 0)
        {
            return Err(StudioError::validation(
                "audio sample_rate and channels must be non-zero",
            ));
        }
        Ok(())
    }

    /// MIME type of the output.
    pub fn mime(&self) -> &'static str {
        self.profile.map_or(DEFAULT_MIME, CodecProfile::mime)
    }
}

/// Encoder fed with frames, emitting encoded chunks through a channel.
///
/// Ordering contract: `push_frame` receives strictly increasing indices between `start` and
/// `stop`. After `stop` returns every chunk has been sent and the sender is dropped.
pub trait MediaEncoder: Send {
    /// Whether `profile` can be produced.
    fn is_supported(&self, profile: CodecProfile) -> bool;

    /// Begin a run; chunks go to `chunks`.
    fn start(
        &mut self,
        config: &EncoderConfig,
        chunks: mpsc::Sender<Vec<u8>>,
    ) -> StudioResult<()>;

    /// Encode one premultiplied frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> StudioResult<()>;

    /// Flush and finish the stream.
    fn stop(&mut self) -> StudioResult<()>;

    /// Tear down without emitting anything further.
    fn abort(&mut self);
}

const MAGIC: &[u8; 4] = b"SSIM";
const HEADER_LEN: usize = 16;
const RECORD_LEN: usize = 16;

struct InMemoryRun {
    config: EncoderConfig,
    chunks: mpsc::Sender<Vec<u8>>,
    pending: Vec<u8>,
    frames_per_chunk: Option<u64>,
    frames: u64,
    last_idx: Option<FrameIndex>,
}

/// Deterministic encoder for tests and dry runs.
///
/// The stream is a 16-byte header followed by one 16-byte record per frame: the frame index
/// and an xxh3 digest of the pixels, both little-endian.
#[derive(Default)]
pub struct InMemoryEncoder {
    supported: Option<Vec<CodecProfile>>,
    run: Option<InMemoryRun>,
}

impl std::fmt::Debug for InMemoryEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEncoder")
            .field("supported", &self.supported)
            .field("running", &self.run.is_some())
            .finish()
    }
}

impl InMemoryEncoder {
    /// Encoder claiming support for every profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoder claiming support for `profiles` only.
    pub fn with_supported(profiles: impl IntoIterator<Item = CodecProfile>) -> Self {
        Self {
            supported: Some(profiles.into_iter().collect()),
            run: None,
        }
    }

    /// Count the frame records in a finished stream.
    pub fn frame_count(stream: &[u8]) -> StudioResult<u64> {
        if stream.len() < HEADER_LEN || &stream[..4] != MAGIC {
            return Err(StudioError::capture("not an in-memory encoder stream"));
        }
        let body = stream.len() - HEADER_LEN;
        if !body.is_multiple_of(RECORD_LEN) {
            return Err(StudioError::capture("truncated in-memory encoder stream"));
        }
        Ok((body / RECORD_LEN) as u64)
    }

    fn emit(run: &mut InMemoryRun) {
        if run.pending.is_empty() {
            return;
        }
        let chunk = std::mem::take(&mut run.pending);
        // The receiver hangs up when the session is torn down; nothing left to deliver.
        let _ = run.chunks.send(chunk);
    }
}

impl MediaEncoder for InMemoryEncoder {
    fn is_supported(&self, profile: CodecProfile) -> bool {
        self.supported
            .as_ref()
            .is_none_or(|list| list.contains(&profile))
    }

    fn start(
        &mut self,
        config: &EncoderConfig,
        chunks: mpsc::Sender<Vec<u8>>,
    ) -> StudioResult<()> {
        if self.run.is_some() {
            return Err(StudioError::capture("in-memory encoder already started"));
        }
        config.validate()?;

        let frames_per_chunk = config.timeslice.map(|t| {
            let n = (t.as_secs_f64() * config.fps.num as f64 / config.fps.den as f64).round();
            (n as u64).max(1)
        });
        let mut pending = Vec::with_capacity(HEADER_LEN);
        pending.extend_from_slice(MAGIC);
        pending.extend_from_slice(&config.width.to_le_bytes());
        pending.extend_from_slice(&config.height.to_le_bytes());
        pending.extend_from_slice(&config.fps.num.to_le_bytes());

        debug!(?frames_per_chunk, "in-memory encoder started");
        self.run = Some(InMemoryRun {
            config: config.clone(),
            chunks,
            pending,
            frames_per_chunk,
            frames: 0,
            last_idx: None,
        });
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> StudioResult<()> {
        let run = self
            .run
            .as_mut()
            .ok_or_else(|| StudioError::capture("in-memory encoder not started"))?;
        if run.last_idx.is_some_and(|last| idx.0 <= last.0) {
            return Err(StudioError::capture(
                "encoder received out-of-order frame index",
            ));
        }
        if frame.width != run.config.width || frame.height != run.config.height {
            return Err(StudioError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, run.config.width, run.config.height
            )));
        }
        run.last_idx = Some(idx);

        let digest = xxhash_rust::xxh3::xxh3_64(&frame.data);
        run.pending.extend_from_slice(&idx.0.to_le_bytes());
        run.pending.extend_from_slice(&digest.to_le_bytes());
        run.frames += 1;

        if run.frames_per_chunk.is_some_and(|n| run.frames.is_multiple_of(n)) {
            Self::emit(run);
        }
        Ok(())
    }

    fn stop(&mut self) -> StudioResult<()> {
        let mut run = self
            .run
            .take()
            .ok_or_else(|| StudioError::capture("in-memory encoder not started"))?;
        Self::emit(&mut run);
        debug!(frames = run.frames, "in-memory encoder stopped");
        Ok(())
    }

    fn abort(&mut self) {
        self.run = None;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/encoder.rs"]
mod tests;
