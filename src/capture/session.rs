use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::assets::media::AudioPcm;
use crate::audio::graph::MonitorGain;
use crate::audio::mix::TempPcmFile;
use crate::audio::playlist::PROGRESS_CAP;
use crate::capture::destination::{DestinationPicker, DestinationWriter, PickError, WriteReport};
use crate::capture::encoder::{
    AudioInput, CodecProfile, DEFAULT_MIME, EncoderConfig, MediaEncoder, negotiate_codec,
};
use crate::capture::progress::ProgressTracker;
use crate::capture::{CaptureState, Notice};
use crate::foundation::core::{Canvas, Fps, FrameIndex};
use crate::foundation::error::{StudioError, StudioResult};
use crate::render::FrameRGBA;

/// Tunables for a capture session.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureOpts {
    /// Capture frame rate.
    pub fps: Fps,
    /// Target video bitrate in bits per second.
    pub video_bitrate: u32,
    /// Target audio bitrate in bits per second.
    pub audio_bitrate: u32,
    /// Chunk cadence when streaming to a destination.
    pub timeslice: Duration,
    /// Minimum spacing between progress samples.
    pub progress_interval: Duration,
    /// Pause between reporting 100% and returning to idle.
    pub settle_delay: Duration,
    /// Highest progress reported before finalize.
    pub progress_cap: f64,
    /// Chunks allowed to wait for the destination writer.
    pub write_queue: usize,
}

impl Default for CaptureOpts {
    fn default() -> Self {
        Self {
            fps: Fps::EXPORT,
            video_bitrate: 5_000_000,
            audio_bitrate: 192_000,
            timeslice: Duration::from_secs(1),
            progress_interval: Duration::from_millis(100),
            settle_delay: Duration::from_millis(500),
            progress_cap: PROGRESS_CAP,
            write_queue: 8,
        }
    }
}

/// Where encoded output goes while recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputStrategy {
    /// Chunks are written incrementally to a picked destination.
    Streaming,
    /// Chunks accumulate in memory until finalize.
    Buffered,
}

/// Encoded output held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputBlob {
    /// Complete container bytes.
    pub bytes: Vec<u8>,
    /// MIME type of the container.
    pub mime: String,
}

impl OutputBlob {
    /// Write the blob to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> StudioResult<()> {
        use anyhow::Context as _;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create output directory '{}'", parent.display())
            })?;
        }
        std::fs::write(path, &self.bytes)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        Ok(())
    }
}

/// Result of a successful finalize.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinalizedOutput {
    /// Output was streamed and the destination closed.
    Streamed(WriteReport),
    /// Output was buffered; the caller saves or discards the blob.
    Buffered(OutputBlob),
}

/// One export: destination, encoder run, monitor mute and progress.
///
/// States run `Idle → AwaitingDestination → Recording → Finalizing → Idle`. [`cancel`] tears
/// everything down from any state and is a no-op when idle. Dropping an active session cancels
/// it.
///
/// [`cancel`]: CaptureSession::cancel
pub struct CaptureSession {
    state: CaptureState,
    opts: CaptureOpts,
    encoder: Box<dyn MediaEncoder>,
    encoder_running: bool,
    monitor: MonitorGain,
    saved_gain: Option<f32>,
    strategy: Option<OutputStrategy>,
    writer: Option<DestinationWriter>,
    chunks: Option<mpsc::Receiver<Vec<u8>>>,
    buffer: Vec<Vec<u8>>,
    audio_file: Option<TempPcmFile>,
    profile: Option<CodecProfile>,
    mime: &'static str,
    progress: ProgressTracker,
    frames: u64,
    lost_chunks: u64,
    settle_at: Option<Instant>,
    notices: Vec<Notice>,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("state", &self.state)
            .field("strategy", &self.strategy)
            .field("profile", &self.profile)
            .field("frames", &self.frames)
            .field("progress", &self.progress.value())
            .finish()
    }
}

impl CaptureSession {
    /// Idle session driving `encoder` and muting `monitor` while recording.
    pub fn new(encoder: Box<dyn MediaEncoder>, monitor: MonitorGain, opts: CaptureOpts) -> Self {
        let progress = ProgressTracker::new(opts.progress_interval, opts.progress_cap);
        Self {
            state: CaptureState::Idle,
            opts,
            encoder,
            encoder_running: false,
            monitor,
            saved_gain: None,
            strategy: None,
            writer: None,
            chunks: None,
            buffer: Vec::new(),
            audio_file: None,
            profile: None,
            mime: DEFAULT_MIME,
            progress,
            frames: 0,
            lost_chunks: 0,
            settle_at: None,
            notices: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Chosen strategy, once a destination has been negotiated.
    pub fn strategy(&self) -> Option<OutputStrategy> {
        self.strategy
    }

    /// Negotiated codec profile; `None` before recording or when encoder defaults are used.
    pub fn profile(&self) -> Option<CodecProfile> {
        self.profile
    }

    /// MIME type of the output.
    pub fn mime(&self) -> &'static str {
        self.mime
    }

    /// Latest progress in percent.
    pub fn progress(&self) -> f64 {
        self.progress.value()
    }

    /// Frames handed to the encoder in this recording.
    pub fn frames_pushed(&self) -> u64 {
        self.frames
    }

    /// Options in effect.
    pub fn opts(&self) -> &CaptureOpts {
        &self.opts
    }

    /// Drain pending user-facing notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn transition(&mut self, to: CaptureState) {
        debug!(from = ?self.state, to = ?to, "capture state");
        self.state = to;
    }

    /// Negotiate the output strategy.
    ///
    /// Returns `Ok(false)` when the user cancelled the picker; the session is then idle again.
    /// An unavailable destination falls back to buffering and leaves a notice.
    pub fn acquire_destination(
        &mut self,
        picker: &mut dyn DestinationPicker,
        suggested_name: &str,
    ) -> StudioResult<bool> {
        if self.state != CaptureState::Idle {
            return Err(StudioError::capture(format!(
                "cannot start a capture while {:?}",
                self.state
            )));
        }
        self.transition(CaptureState::AwaitingDestination);
        self.frames = 0;
        self.lost_chunks = 0;
        self.buffer.clear();
        self.progress.reset();

        match picker.pick(suggested_name) {
            Ok(dest) => {
                let writer = match DestinationWriter::spawn(dest, self.opts.write_queue) {
                    Ok(w) => w,
                    Err(e) => {
                        self.transition(CaptureState::Idle);
                        return Err(e);
                    }
                };
                info!(location = ?writer.location(), "streaming output to destination");
                self.writer = Some(writer);
                self.strategy = Some(OutputStrategy::Streaming);
            }
            Err(PickError::Unavailable(reason)) => {
                info!(%reason, "streaming unavailable; buffering output in memory");
                self.notices.push(Notice::StreamingUnavailable(reason));
                self.strategy = Some(OutputStrategy::Buffered);
            }
            Err(PickError::Cancelled) => {
                info!("destination selection cancelled");
                self.transition(CaptureState::Idle);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Mute the monitor, negotiate a codec and start the encoder.
    ///
    /// On failure everything acquired so far is released and the session is idle.
    pub fn begin_recording(&mut self, canvas: Canvas, audio: Option<&AudioPcm>) -> StudioResult<()> {
        if self.state != CaptureState::AwaitingDestination {
            return Err(StudioError::capture(format!(
                "cannot begin recording while {:?}",
                self.state
            )));
        }
        let strategy = self
            .strategy
            .ok_or_else(|| StudioError::capture("no output strategy negotiated"))?;

        self.saved_gain = Some(self.monitor.get());
        self.monitor.set(0.0);

        if let Err(e) = self.start_encoder(canvas, audio, strategy) {
            warn!(error = %e, "failed to start recording");
            self.teardown();
            self.transition(CaptureState::Idle);
            return Err(e);
        }
        self.transition(CaptureState::Recording);
        info!(
            width = canvas.width,
            height = canvas.height,
            ?strategy,
            "recording started"
        );
        Ok(())
    }

    fn start_encoder(
        &mut self,
        canvas: Canvas,
        audio: Option<&AudioPcm>,
        strategy: OutputStrategy,
    ) -> StudioResult<()> {
        let profile = negotiate_codec(self.encoder.as_ref());
        if profile.is_none() {
            warn!("codec negotiation exhausted; falling back to encoder defaults");
            self.notices.push(Notice::CodecFallback);
        }
        self.audio_file = audio.map(TempPcmFile::create).transpose()?;

        let config = EncoderConfig {
            width: canvas.width,
            height: canvas.height,
            fps: self.opts.fps,
            profile,
            video_bitrate: self.opts.video_bitrate,
            audio_bitrate: self.opts.audio_bitrate,
            timeslice: match strategy {
                OutputStrategy::Streaming => Some(self.opts.timeslice),
                OutputStrategy::Buffered => None,
            },
            audio: self.audio_file.as_ref().map(|f| AudioInput {
                path: f.path().to_path_buf(),
                sample_rate: f.sample_rate,
                channels: f.channels,
            }),
        };
        let (tx, rx) = mpsc::channel();
        self.encoder.start(&config, tx)?;
        self.encoder_running = true;
        self.chunks = Some(rx);
        self.profile = profile;
        self.mime = config.mime();
        Ok(())
    }

    /// Encode one frame and route any chunks the encoder produced.
    pub fn push_frame(&mut self, frame: &FrameRGBA) -> StudioResult<()> {
        if self.state != CaptureState::Recording {
            return Err(StudioError::capture(format!(
                "cannot push frames while {:?}",
                self.state
            )));
        }
        self.encoder.push_frame(FrameIndex(self.frames), frame)?;
        self.frames += 1;
        self.drain_chunks();
        Ok(())
    }

    fn drain_chunks(&mut self) {
        let Some(rx) = &self.chunks else {
            return;
        };
        while let Ok(chunk) = rx.try_recv() {
            if chunk.is_empty() {
                continue;
            }
            match self.writer.as_mut() {
                Some(writer) => {
                    if let Err(e) = writer.write(chunk) {
                        self.lost_chunks += 1;
                        warn!(error = %e, "chunk could not be queued for writing");
                    }
                }
                None => self.buffer.push(chunk),
            }
        }
    }

    /// Sample progress at host time `now_ms`. Only records while recording.
    pub fn record_progress(
        &mut self,
        now_ms: f64,
        elapsed_secs: f64,
        total_secs: f64,
    ) -> Option<f64> {
        if self.state != CaptureState::Recording {
            return None;
        }
        self.progress.sample(now_ms, elapsed_secs, total_secs)
    }

    /// Stop the encoder, restore the monitor and produce the output.
    ///
    /// Returns `Ok(None)` when nothing is recording. Progress reaches 100 here; the session
    /// returns to idle once the settle delay has passed (see [`CaptureSession::poll_settled`]).
    #[instrument(skip_all, fields(frames = self.frames))]
    pub fn finalize(&mut self) -> StudioResult<Option<FinalizedOutput>> {
        if self.state != CaptureState::Recording {
            debug!("finalize with no active recording");
            return Ok(None);
        }
        self.transition(CaptureState::Finalizing);

        self.encoder_running = false;
        if let Err(e) = self.encoder.stop() {
            warn!(error = %e, "encoder failed to finish");
            self.teardown();
            self.transition(CaptureState::Idle);
            return Err(e);
        }
        self.drain_chunks();
        self.chunks = None;
        self.audio_file = None;
        self.restore_gain();

        let output = match self.writer.take() {
            Some(writer) => match writer.close() {
                Ok(mut report) => {
                    report.failed += self.lost_chunks;
                    if report.failed > 0 {
                        self.notices.push(Notice::WriteFailures {
                            failed: report.failed,
                            total: report.chunks + self.lost_chunks,
                        });
                    }
                    info!(
                        chunks = report.chunks,
                        bytes = report.bytes,
                        location = ?report.location,
                        "streamed output closed"
                    );
                    FinalizedOutput::Streamed(report)
                }
                Err(e) => {
                    warn!(error = %e, "closing destination failed");
                    self.notices.push(Notice::CloseFailed(e.to_string()));
                    self.strategy = None;
                    self.transition(CaptureState::Idle);
                    return Err(e);
                }
            },
            None => {
                let bytes = std::mem::take(&mut self.buffer).concat();
                info!(bytes = bytes.len(), "buffered output ready");
                FinalizedOutput::Buffered(OutputBlob {
                    bytes,
                    mime: self.mime.to_owned(),
                })
            }
        };

        self.progress.complete();
        self.settle_at = Some(Instant::now() + self.opts.settle_delay);
        Ok(Some(output))
    }

    /// Return to idle once the settle delay after finalize has passed.
    pub fn poll_settled(&mut self) -> bool {
        if self.state != CaptureState::Finalizing {
            return false;
        }
        if self.settle_at.is_some_and(|at| Instant::now() < at) {
            return false;
        }
        self.settle_at = None;
        self.strategy = None;
        self.transition(CaptureState::Idle);
        true
    }

    /// Block until the settle delay has passed, then return to idle.
    pub fn wait_settled(&mut self) {
        if self.state != CaptureState::Finalizing {
            return;
        }
        if let Some(at) = self.settle_at {
            let now = Instant::now();
            if at > now {
                std::thread::sleep(at - now);
            }
        }
        self.poll_settled();
    }

    /// Abandon the capture without producing output.
    ///
    /// Safe in every state; returns `false` when nothing was active.
    pub fn cancel(&mut self) -> bool {
        if self.state == CaptureState::Idle {
            self.restore_gain();
            return false;
        }
        self.transition(CaptureState::Cancelled);
        self.teardown();
        self.transition(CaptureState::Idle);
        info!(frames = self.frames, "capture cancelled");
        true
    }

    fn restore_gain(&mut self) {
        if let Some(gain) = self.saved_gain.take() {
            self.monitor.set(gain);
        }
    }

    fn teardown(&mut self) {
        if self.encoder_running {
            self.encoder.abort();
            self.encoder_running = false;
        }
        self.chunks = None;
        if let Some(writer) = self.writer.take() {
            match writer.abort() {
                Ok(report) => debug!(chunks = report.chunks, "destination aborted"),
                Err(e) => {
                    warn!(error = %e, "aborting destination failed");
                    self.notices.push(Notice::AbortFailed(e.to_string()));
                }
            }
        }
        self.buffer.clear();
        self.audio_file = None;
        self.restore_gain();
        self.strategy = None;
        self.settle_at = None;
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.state != CaptureState::Idle {
            self.cancel();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/session.rs"]
mod tests;
