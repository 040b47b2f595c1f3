//! Export capture: destination negotiation, encoding, chunk routing and finalize.
//!
//! A [`CaptureSession`] picks a streaming destination (or falls back to buffering in memory),
//! drives a [`MediaEncoder`] with rendered frames plus the timeline audio, and hands back a
//! [`FinalizedOutput`].

/// Write destinations, pickers and the serialized writer thread.
pub mod destination;
/// Encoder contract, codec profiles and the in-memory encoder.
pub mod encoder;
/// `ffmpeg`-backed encoder.
pub mod ffmpeg;
/// Progress sampling.
pub mod progress;
/// The capture session state machine.
pub mod session;

pub use destination::{
    DestinationPicker, FileDestinationPicker, PickError, UnavailablePicker, WriteDestination,
    WriteReport,
};
pub use encoder::{CodecProfile, InMemoryEncoder, MediaEncoder, negotiate_codec};
pub use ffmpeg::FfmpegEncoder;
pub use progress::ProgressTracker;
pub use session::{CaptureOpts, CaptureSession, FinalizedOutput, OutputBlob, OutputStrategy};

/// Lifecycle of a [`CaptureSession`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaptureState {
    /// Nothing in progress.
    #[default]
    Idle,
    /// Choosing between streaming and buffered output.
    AwaitingDestination,
    /// Frames are being encoded.
    Recording,
    /// Encoder stopped; output produced, waiting out the settle delay.
    Finalizing,
    /// Teardown after a cancel; passes straight through to `Idle`.
    Cancelled,
}

/// Non-fatal, user-facing messages raised during capture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// No incremental destination; output is buffered in memory.
    StreamingUnavailable(String),
    /// No preferred codec was supported; encoder defaults are used.
    CodecFallback,
    /// Playback could not start, so the export was abandoned.
    PlaybackFailed(String),
    /// Some chunks could not be written to the destination.
    WriteFailures {
        /// Chunks lost.
        failed: u64,
        /// Chunks produced.
        total: u64,
    },
    /// The destination could not be closed.
    CloseFailed(String),
    /// The destination could not be aborted.
    AbortFailed(String),
    /// A frame could not be recorded, so the export was abandoned.
    RecordingFailed(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StreamingUnavailable(reason) => write!(
                f,
                "streaming save unavailable ({reason}); recording to memory, long exports may run out of memory"
            ),
            Self::CodecFallback => f.write_str("no preferred codec available; using encoder defaults"),
            Self::PlaybackFailed(reason) => write!(f, "audio playback failed; export aborted: {reason}"),
            Self::WriteFailures { failed, total } => {
                write!(f, "{failed} of {total} chunks could not be written")
            }
            Self::CloseFailed(reason) => write!(f, "failed to close output: {reason}"),
            Self::AbortFailed(reason) => write!(f, "failed to discard partial output: {reason}"),
            Self::RecordingFailed(reason) => write!(f, "recording failed; export aborted: {reason}"),
        }
    }
}
