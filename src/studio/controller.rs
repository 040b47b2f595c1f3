use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::assets::decode::ImageAsset;
use crate::audio::analyzer::BIN_COUNT;
use crate::audio::graph::{AudioGraph, MonitorGain};
use crate::audio::playlist::{AudioTrack, Player, Playlist, TrackEnd};
use crate::capture::{
    CaptureOpts, CaptureSession, CaptureState, DestinationPicker, FinalizedOutput, MediaEncoder,
    Notice, OutputStrategy,
};
use crate::clock::{ClockMode, EXPORT_STEP_MS, FrameClock, FrameTick, PREVIEW_FRAME_MS, Pacing};
use crate::foundation::core::Canvas;
use crate::foundation::error::{StudioError, StudioResult};
use crate::render::Surface;
use crate::scene::{FrameContext, ParticleSystem, SceneCompositor};
use crate::settings::project::{ProjectConfig, suggested_filename};
use crate::settings::update::SettingUpdate;
use crate::settings::visual::{SpectrumStyle, VisualSettings};

/// Seed used when none is given; keeps particle layouts reproducible.
pub const DEFAULT_SEED: u64 = 0x5eed_cafe;

/// Outcome of [`StudioController::start_export`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportStart {
    /// Recording with the given strategy.
    Recording(OutputStrategy),
    /// The user declined the destination picker; nothing started.
    Declined,
}

/// What one [`StudioController::tick`] did.
#[derive(Clone, Debug, PartialEq)]
pub struct TickReport {
    /// Clock output for this frame.
    pub tick: FrameTick,
    /// Progress sample taken this tick, if any.
    pub progress: Option<f64>,
    /// Set when playback reached the end of the timeline during an export.
    pub finished: Option<FinalizedOutput>,
}

/// Owns one studio session: settings, audio transport, scene state, clock and capture.
///
/// The capture session exists only between [`start_export`] and the end of its settle delay
/// (or a cancel).
///
/// [`start_export`]: StudioController::start_export
pub struct StudioController {
    canvas: Canvas,
    settings: VisualSettings,
    name: String,
    player: Player,
    graph: AudioGraph,
    monitor: MonitorGain,
    clock: FrameClock,
    pacing: Pacing,
    particles: ParticleSystem,
    compositor: SceneCompositor,
    surface: Surface,
    bins: Vec<u8>,
    capture: Option<CaptureSession>,
    notices: Vec<Notice>,
}

impl std::fmt::Debug for StudioController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudioController")
            .field("canvas", &self.canvas)
            .field("name", &self.name)
            .field("clock", &self.clock)
            .field("capture", &self.capture)
            .finish()
    }
}

impl StudioController {
    /// Controller over `playlist` rendering onto a `canvas` surface.
    pub fn new(
        canvas: Canvas,
        settings: VisualSettings,
        playlist: Playlist,
        pacing: Pacing,
        seed: u64,
    ) -> StudioResult<Self> {
        settings.validate()?;
        let playlist = Arc::new(playlist);
        let monitor = MonitorGain::default();
        let mut particles = ParticleSystem::new(seed);
        particles.reset(&settings.particles, canvas.w(), canvas.h());
        Ok(Self {
            canvas,
            name: String::new(),
            player: Player::new(Arc::clone(&playlist)),
            graph: AudioGraph::new(playlist, monitor.clone()),
            monitor,
            clock: FrameClock::preview(pacing.preview_source()),
            pacing,
            particles,
            compositor: SceneCompositor::new(canvas, seed),
            surface: Surface::new(canvas),
            bins: vec![0; BIN_COUNT],
            capture: None,
            notices: Vec::new(),
            settings,
        })
    }

    /// Decode every input named by `project` and build a controller.
    pub fn from_project(project: &ProjectConfig, pacing: Pacing) -> StudioResult<Self> {
        project.validate()?;
        let tracks = project
            .tracks
            .iter()
            .map(|p| AudioTrack::from_path(p))
            .collect::<StudioResult<Vec<_>>>()?;
        let playlist = Playlist::new(tracks, project.encoding.loop_count)?;
        let mut studio = Self::new(
            project.resolution.canvas(),
            project.settings.clone(),
            playlist,
            pacing,
            DEFAULT_SEED,
        )?;
        studio.name = project.name.clone();
        if let Some(path) = &project.background {
            studio.set_background(Some(ImageAsset::from_path(path)?));
        }
        if let Some(path) = &project.logo {
            studio.set_logo(Some(ImageAsset::from_path(path)?));
        }
        info!(
            tracks = project.tracks.len(),
            loops = project.encoding.loop_count,
            "project loaded"
        );
        Ok(studio)
    }

    /// Project name used for the suggested output filename.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Output filename offered to the destination picker.
    pub fn suggested_filename(&self) -> String {
        suggested_filename(&self.name)
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> &VisualSettings {
        &self.settings
    }

    /// Surface holding the last drawn frame.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Transport.
    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Particle population.
    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    /// Shared monitor gain.
    pub fn monitor_gain(&self) -> &MonitorGain {
        &self.monitor
    }

    /// Clock mode.
    pub fn clock_mode(&self) -> ClockMode {
        self.clock.mode()
    }

    /// State of the capture session, `Idle` when there is none.
    pub fn capture_state(&self) -> CaptureState {
        self.capture
            .as_ref()
            .map_or(CaptureState::Idle, CaptureSession::state)
    }

    /// Latest export progress, if an export exists.
    pub fn export_progress(&self) -> Option<f64> {
        self.capture.as_ref().map(CaptureSession::progress)
    }

    /// Drain user-facing notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.collect_notices();
        std::mem::take(&mut self.notices)
    }

    fn collect_notices(&mut self) {
        if let Some(capture) = self.capture.as_mut() {
            self.notices.extend(capture.take_notices());
        }
    }

    /// Replace one settings field. Particles are reseeded when the effect or density changes.
    pub fn update_setting(&mut self, update: SettingUpdate) -> StudioResult<()> {
        let next = self.settings.try_with(update)?;
        let reseed = self.settings.reseeds_particles(&next);
        self.settings = next;
        if reseed {
            self.particles
                .reset(&self.settings.particles, self.canvas.w(), self.canvas.h());
        }
        Ok(())
    }

    /// Replace the background image.
    pub fn set_background(&mut self, image: Option<ImageAsset>) {
        self.compositor.set_background(image);
    }

    /// Replace the logo image.
    pub fn set_logo(&mut self, image: Option<ImageAsset>) {
        self.compositor.set_logo(image);
    }

    /// Start preview playback.
    pub fn play(&mut self) -> StudioResult<()> {
        self.player.play()
    }

    /// Pause preview playback.
    pub fn pause(&mut self) {
        self.player.pause();
    }

    /// Wait for the next clock tick and run one frame end to end.
    pub fn tick(&mut self) -> StudioResult<TickReport> {
        let tick = self.clock.tick()?;
        self.run_frame(tick)
    }

    fn run_frame(&mut self, tick: FrameTick) -> StudioResult<TickReport> {
        let dt_secs = match self.clock.mode() {
            ClockMode::Export => EXPORT_STEP_MS / 1000.0,
            ClockMode::Preview => tick.delta * PREVIEW_FRAME_MS / 1000.0,
        };
        let ended = self.player.advance(dt_secs);
        if matches!(ended, Some(TrackEnd::NextTrack | TrackEnd::NextLoop)) {
            self.graph.rewind();
        }
        self.draw_scene(tick.time_ms, tick.delta)?;

        let mut progress = None;
        let mut push_failure = None;
        if let Some(capture) = self.capture.as_mut()
            && capture.state() == CaptureState::Recording
        {
            match capture.push_frame(&self.surface.to_frame()) {
                Ok(()) => {
                    let total = self.player.playlist().total_duration_secs();
                    progress =
                        capture.record_progress(tick.time_ms, self.player.elapsed_secs(), total);
                }
                Err(e) => push_failure = Some(e),
            }
        }
        if let Some(e) = push_failure {
            warn!(error = %e, "frame push failed; export cancelled");
            self.cancel_export();
            self.notices.push(Notice::RecordingFailed(e.to_string()));
            return Err(e);
        }

        let mut finished = None;
        if ended == Some(TrackEnd::Finished) && self.capture_state() == CaptureState::Recording {
            info!("timeline finished; finalizing export");
            finished = self.stop_export()?;
        }

        if let Some(capture) = self.capture.as_mut()
            && capture.poll_settled()
        {
            self.collect_notices();
            self.capture = None;
            debug!("export session released");
        }

        Ok(TickReport {
            tick,
            progress,
            finished,
        })
    }

    fn draw_scene(&mut self, time_ms: f64, delta: f64) -> StudioResult<()> {
        self.graph.process(&self.player);
        if self.settings.spectrum.style != SpectrumStyle::None {
            self.graph.analyser().magnitude_snapshot(&mut self.bins);
        }
        self.particles.advance(delta);
        self.compositor.draw_frame(
            &mut self.surface,
            &self.settings,
            &self.particles,
            FrameContext {
                time_ms,
                delta,
                bins: &self.bins,
            },
        )
    }

    /// Draw a single still with the playhead at `time_ms` into the timeline.
    ///
    /// Particles stay at their seeded positions. Not available during an export.
    pub fn render_still(&mut self, time_ms: f64) -> StudioResult<&Surface> {
        if self.capture.is_some() {
            return Err(StudioError::validation(
                "cannot render a still while an export is active",
            ));
        }
        self.player.reset();
        self.graph.rewind();
        if self.player.play().is_ok() {
            self.player.advance(time_ms.max(0.0) / 1000.0);
            self.player.pause();
        }
        self.draw_scene(time_ms, 0.0)?;
        Ok(&self.surface)
    }

    /// Begin an export: negotiate a destination, rewind, mute and start recording.
    pub fn start_export(
        &mut self,
        picker: &mut dyn DestinationPicker,
        encoder: Box<dyn MediaEncoder>,
        opts: CaptureOpts,
    ) -> StudioResult<ExportStart> {
        if let Some(capture) = &self.capture {
            return Err(StudioError::capture(format!(
                "an export is already {:?}",
                capture.state()
            )));
        }
        self.player.pause();

        let fps = opts.fps;
        let mut session = CaptureSession::new(encoder, self.monitor.clone(), opts);
        let suggested = self.suggested_filename();
        if !session.acquire_destination(picker, &suggested)? {
            return Ok(ExportStart::Declined);
        }
        self.notices.extend(session.take_notices());
        let strategy = session
            .strategy()
            .ok_or_else(|| StudioError::capture("no output strategy after negotiation"))?;

        self.player.reset();
        self.graph.rewind();

        let audio = match self.graph.render_capture_pcm() {
            Ok(pcm) => pcm,
            Err(e) => return Err(self.abort_start(session, e)),
        };
        session.begin_recording(self.canvas, Some(&audio))?;
        self.notices.extend(session.take_notices());

        let source = match self.pacing.export_source(fps) {
            Ok(source) => source,
            Err(e) => {
                session.cancel();
                return Err(e);
            }
        };
        self.clock.enter_export(source);

        if let Err(e) = self.player.play() {
            self.clock.enter_preview(self.pacing.preview_source());
            return Err(self.abort_start(session, e));
        }

        self.capture = Some(session);
        info!(?strategy, "export started");
        Ok(ExportStart::Recording(strategy))
    }

    fn abort_start(&mut self, mut session: CaptureSession, e: StudioError) -> StudioError {
        warn!(error = %e, "playback failed; export aborted");
        session.cancel();
        self.notices.extend(session.take_notices());
        self.notices.push(Notice::PlaybackFailed(e.to_string()));
        self.player.pause();
        e
    }

    /// Stop recording and finalize. A no-op without an active recording.
    pub fn stop_export(&mut self) -> StudioResult<Option<FinalizedOutput>> {
        let Some(capture) = self.capture.as_mut() else {
            return Ok(None);
        };
        if capture.state() != CaptureState::Recording {
            return Ok(None);
        }
        self.player.pause();
        let result = capture.finalize();
        self.clock.enter_preview(self.pacing.preview_source());
        self.collect_notices();
        match result {
            Ok(output) => {
                if capture_is_idle(&self.capture) {
                    self.capture = None;
                }
                Ok(output)
            }
            Err(e) => {
                self.capture = None;
                Err(e)
            }
        }
    }

    /// Block until a finalized export has settled, then release it.
    pub fn wait_export_settled(&mut self) {
        if let Some(capture) = self.capture.as_mut() {
            capture.wait_settled();
            if capture.state() == CaptureState::Idle {
                self.collect_notices();
                self.capture = None;
            }
        }
    }

    /// Abandon the export without output. Returns `false` when none was active.
    pub fn cancel_export(&mut self) -> bool {
        let Some(mut capture) = self.capture.take() else {
            return false;
        };
        let was_active = capture.cancel();
        self.notices.extend(capture.take_notices());
        self.player.pause();
        if self.clock.mode() == ClockMode::Export {
            self.clock.enter_preview(self.pacing.preview_source());
        }
        was_active
    }
}

fn capture_is_idle(capture: &Option<CaptureSession>) -> bool {
    capture
        .as_ref()
        .is_some_and(|c| c.state() == CaptureState::Idle)
}

#[cfg(test)]
#[path = "../../tests/unit/studio/controller.rs"]
mod tests;
