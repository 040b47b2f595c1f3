use std::collections::HashSet;
use std::io::{Read, Write as _};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::assets::media::is_ffmpeg_on_path;
use crate::capture::encoder::{CodecProfile, Container, EncoderConfig, MediaEncoder};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{StudioError, StudioResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::FrameRGBA;

/// Frames queued between the render thread and ffmpeg's stdin.
const FEED_QUEUE: usize = 4;
const READ_BUF: usize = 64 * 1024;

struct FfmpegRun {
    child: Child,
    width: u32,
    height: u32,
    feed: Option<mpsc::SyncSender<Vec<u8>>>,
    feeder: Option<JoinHandle<std::io::Result<u64>>>,
    reader: Option<JoinHandle<std::io::Result<u64>>>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    aborted: Arc<AtomicBool>,
    last_idx: Option<FrameIndex>,
}

/// Encoder backed by the system `ffmpeg` binary.
///
/// Frames are flattened over black and fed to stdin by a bounded feeder thread. The container
/// comes back on stdout in fragmented form, so chunks are playable prefixes of the final file.
pub struct FfmpegEncoder {
    available: HashSet<String>,
    run: Option<FfmpegRun>,
}

impl std::fmt::Debug for FfmpegEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegEncoder")
            .field("encoders", &self.available.len())
            .field("running", &self.run.is_some())
            .finish()
    }
}

impl FfmpegEncoder {
    /// Probe the installed ffmpeg for its encoders.
    ///
    /// Without ffmpeg on PATH nothing is supported and [`MediaEncoder::start`] fails.
    pub fn probe() -> Self {
        let available = probe_encoders().unwrap_or_else(|e| {
            warn!(error = %e, "ffmpeg encoder probe failed");
            HashSet::new()
        });
        debug!(count = available.len(), "ffmpeg encoders probed");
        Self {
            available,
            run: None,
        }
    }

    /// Encoder with a fixed encoder list (no probing).
    pub fn with_encoders(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            available: names.into_iter().map(Into::into).collect(),
            run: None,
        }
    }
}

fn probe_encoders() -> StudioResult<HashSet<String>> {
    let out = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .output()
        .map_err(|e| StudioError::capture(format!("failed to run ffmpeg -encoders: {e}")))?;
    if !out.status.success() {
        return Err(StudioError::capture(format!(
            "ffmpeg -encoders exited with status {}: {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    Ok(parse_encoder_list(&String::from_utf8_lossy(&out.stdout)))
}

/// Encoder names from `ffmpeg -encoders` output.
///
/// Entry lines look like ` V....D libx264   H.264 ...`: a six-character flag column, then the
/// name. The legend above the `------` separator is skipped.
pub(crate) fn parse_encoder_list(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .skip_while(|l| !l.trim_start().starts_with("---"))
        .skip(1)
        .filter_map(|l| {
            let mut parts = l.split_whitespace();
            let flags = parts.next()?;
            let name = parts.next()?;
            (flags.len() == 6).then(|| name.to_owned())
        })
        .collect()
}

pub(crate) fn build_args(cfg: &EncoderConfig) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect();
    args.push("-s".into());
    args.push(format!("{}x{}", cfg.width, cfg.height));
    // Input rate must precede `-i` for rawvideo.
    args.push("-r".into());
    args.push(format!("{}/{}", cfg.fps.num, cfg.fps.den));
    args.extend(["-i".into(), "pipe:0".into()]);

    if let Some(audio) = &cfg.audio {
        args.extend([
            "-f".into(),
            "f32le".into(),
            "-ar".into(),
            audio.sample_rate.to_string(),
            "-ac".into(),
            audio.channels.to_string(),
            "-i".into(),
            audio.path.display().to_string(),
        ]);
    }

    if let Some(profile) = cfg.profile {
        let (video, audio) = profile.encoders();
        args.extend(["-c:v".into(), video.into()]);
        if let Some((p, level)) = profile.h264_profile() {
            args.extend([
                "-profile:v".into(),
                p.into(),
                "-level".into(),
                level.into(),
            ]);
        }
        if matches!(profile, CodecProfile::WebmVp9 | CodecProfile::Webm) {
            args.extend([
                "-deadline".into(),
                "realtime".into(),
                "-cpu-used".into(),
                "8".into(),
            ]);
        }
        if cfg.audio.is_some() {
            args.extend(["-c:a".into(), audio.into()]);
        }
    }
    args.extend([
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-b:v".into(),
        cfg.video_bitrate.to_string(),
    ]);
    if cfg.audio.is_some() {
        args.extend([
            "-b:a".into(),
            cfg.audio_bitrate.to_string(),
            "-shortest".into(),
        ]);
    } else {
        args.push("-an".into());
    }

    match cfg.profile.map_or(Container::Mp4, CodecProfile::container) {
        Container::Mp4 => args.extend([
            "-f".into(),
            "mp4".into(),
            "-movflags".into(),
            "frag_keyframe+empty_moov+default_base_moof".into(),
        ]),
        Container::Webm => args.extend(["-f".into(), "webm".into()]),
    }
    args.push("pipe:1".into());
    args
}

impl MediaEncoder for FfmpegEncoder {
    fn is_supported(&self, profile: CodecProfile) -> bool {
        let (video, audio) = profile.encoders();
        self.available.contains(video) && self.available.contains(audio)
    }

    fn start(
        &mut self,
        config: &EncoderConfig,
        chunks: mpsc::Sender<Vec<u8>>,
    ) -> StudioResult<()> {
        if self.run.is_some() {
            return Err(StudioError::capture("ffmpeg encoder already started"));
        }
        config.validate()?;
        if !is_ffmpeg_on_path() {
            return Err(StudioError::capture(
                "ffmpeg is required for encoding, but was not found on PATH",
            ));
        }

        let args = build_args(config);
        debug!(args = %args.join(" "), "spawning ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                StudioError::capture(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| StudioError::capture("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| StudioError::capture("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| StudioError::capture("failed to open ffmpeg stderr (unexpected)"))?;

        let (feed_tx, feed_rx) = mpsc::sync_channel::<Vec<u8>>(FEED_QUEUE);
        let feeder = std::thread::spawn(move || {
            let mut frames = 0u64;
            for frame in feed_rx {
                stdin.write_all(&frame)?;
                frames += 1;
            }
            Ok(frames)
        });

        let aborted = Arc::new(AtomicBool::new(false));
        let reader_aborted = Arc::clone(&aborted);
        let timeslice = config.timeslice;
        let reader = std::thread::spawn(move || {
            read_chunks(&mut stdout, timeslice, &chunks, &reader_aborted)
        });

        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        info!(
            profile = config.profile.map_or("default", CodecProfile::id),
            streaming = timeslice.is_some(),
            "ffmpeg encoder started"
        );
        self.run = Some(FfmpegRun {
            child,
            width: config.width,
            height: config.height,
            feed: Some(feed_tx),
            feeder: Some(feeder),
            reader: Some(reader),
            stderr_drain: Some(stderr_drain),
            aborted,
            last_idx: None,
        });
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> StudioResult<()> {
        let run = self
            .run
            .as_mut()
            .ok_or_else(|| StudioError::capture("ffmpeg encoder not started"))?;
        if run.last_idx.is_some_and(|last| idx.0 <= last.0) {
            return Err(StudioError::capture(
                "encoder received out-of-order frame index",
            ));
        }
        if frame.width != run.width || frame.height != run.height {
            return Err(StudioError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, run.width, run.height
            )));
        }
        run.last_idx = Some(idx);

        let mut opaque = vec![0u8; frame.data.len()];
        flatten_over_black(&mut opaque, &frame.data, frame.premultiplied)?;
        let feed = run
            .feed
            .as_ref()
            .ok_or_else(|| StudioError::capture("ffmpeg encoder is already finalized"))?;
        feed.send(opaque)
            .map_err(|_| StudioError::capture("ffmpeg stdin closed (encoder exited early)"))
    }

    fn stop(&mut self) -> StudioResult<()> {
        let mut run = self
            .run
            .take()
            .ok_or_else(|| StudioError::capture("ffmpeg encoder not started"))?;
        drop(run.feed.take());
        let fed = join_io(run.feeder.take(), "ffmpeg feeder");

        let status = run
            .child
            .wait()
            .map_err(|e| StudioError::capture(format!("failed to wait for ffmpeg: {e}")))?;
        let emitted = join_io(run.reader.take(), "ffmpeg stdout reader");
        let stderr_bytes = join_io(run.stderr_drain.take(), "ffmpeg stderr drain")?;

        if !status.success() {
            return Err(StudioError::capture(format!(
                "ffmpeg exited with status {}: {}",
                status,
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        let frames = fed?;
        let bytes = emitted?;
        info!(frames, bytes, "ffmpeg encoder finished");
        Ok(())
    }

    fn abort(&mut self) {
        let Some(mut run) = self.run.take() else {
            return;
        };
        run.aborted.store(true, Ordering::Release);
        drop(run.feed.take());
        if let Err(e) = run.child.kill() {
            debug!(error = %e, "ffmpeg already exited");
        }
        let _ = run.child.wait();
        let _ = join_io(run.feeder.take(), "ffmpeg feeder");
        let _ = join_io(run.reader.take(), "ffmpeg stdout reader");
        let _ = join_io(run.stderr_drain.take(), "ffmpeg stderr drain");
        info!("ffmpeg encoder aborted");
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        self.abort();
    }
}

fn join_io<T: Default>(
    handle: Option<JoinHandle<std::io::Result<T>>>,
    what: &str,
) -> StudioResult<T> {
    match handle {
        Some(h) => h
            .join()
            .map_err(|_| StudioError::capture(format!("{what} thread panicked")))?
            .map_err(|e| StudioError::capture(format!("{what} failed: {e}"))),
        None => Ok(T::default()),
    }
}

fn read_chunks(
    stdout: &mut impl Read,
    timeslice: Option<Duration>,
    chunks: &mpsc::Sender<Vec<u8>>,
    aborted: &AtomicBool,
) -> std::io::Result<u64> {
    let mut buf = vec![0u8; READ_BUF];
    let mut pending = Vec::new();
    let mut total = 0u64;
    let mut last_emit = Instant::now();
    let emit = |pending: &mut Vec<u8>| {
        if !pending.is_empty() && !aborted.load(Ordering::Acquire) {
            // A hung-up receiver means the session is gone; keep draining so ffmpeg can exit.
            let _ = chunks.send(std::mem::take(pending));
        }
        pending.clear();
    };
    loop {
        let n = stdout.read(&mut buf)?;
        if n == 0 {
            break;
        }
        total += n as u64;
        pending.extend_from_slice(&buf[..n]);
        if let Some(slice) = timeslice
            && last_emit.elapsed() >= slice
        {
            emit(&mut pending);
            last_emit = Instant::now();
        }
    }
    emit(&mut pending);
    Ok(total)
}

fn flatten_over_black(dst: &mut [u8], src: &[u8], premultiplied: bool) -> StudioResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(StudioError::validation(
            "flatten_over_black expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if premultiplied || a == 255 {
            d[..3].copy_from_slice(&s[..3]);
        } else {
            for (dc, sc) in d[..3].iter_mut().zip(&s[..3]) {
                *dc = mul_div255_u16(u16::from(*sc), a) as u8;
            }
        }
        d[3] = 255;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/capture/ffmpeg.rs"]
mod tests;
