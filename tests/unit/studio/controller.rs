use super::*;
use crate::assets::media::AudioPcm;
use crate::capture::{InMemoryEncoder, UnavailablePicker};
use crate::settings::visual::{ColorMode, ParticleEffect};
use std::time::Duration;

fn track(name: &str, secs: f64) -> AudioTrack {
    // 100 Hz keeps fixtures tiny; the transport arithmetic is rate-independent.
    let frames = (secs * 100.0) as usize;
    AudioTrack::new(
        name,
        AudioPcm {
            sample_rate: 100,
            channels: 2,
            interleaved_f32: (0..frames * 2).map(|i| ((i as f32) * 0.3).sin() * 0.5).collect(),
        },
    )
}

fn studio_with(tracks: Vec<AudioTrack>) -> StudioController {
    let playlist = Playlist::new(tracks, 1).unwrap();
    StudioController::new(
        Canvas::new(64, 36).unwrap(),
        VisualSettings::default(),
        playlist,
        Pacing::Unthrottled,
        7,
    )
    .unwrap()
}

fn studio() -> StudioController {
    studio_with(vec![track("a", 0.2), track("b", 0.1)])
}

fn opts() -> CaptureOpts {
    CaptureOpts {
        settle_delay: Duration::ZERO,
        ..CaptureOpts::default()
    }
}

#[test]
fn preview_tick_draws_a_frame() {
    let mut s = studio();
    let report = s.tick().unwrap();
    assert_eq!(report.tick.index, 1);
    assert!(report.progress.is_none());
    assert_eq!(s.surface().pixel(1, 1)[3], 255);
    assert_eq!(s.clock_mode(), ClockMode::Preview);
}

#[test]
fn export_runs_to_end_of_timeline_and_finalizes() {
    let mut s = studio();
    s.monitor_gain().set(0.6);
    let start = s
        .start_export(
            &mut UnavailablePicker::default(),
            Box::new(InMemoryEncoder::new()),
            opts(),
        )
        .unwrap();
    assert_eq!(start, ExportStart::Recording(OutputStrategy::Buffered));
    assert_eq!(s.clock_mode(), ClockMode::Export);
    assert_eq!(s.monitor_gain().get(), 0.0);
    assert!(s
        .take_notices()
        .iter()
        .any(|n| matches!(n, Notice::StreamingUnavailable(_))));

    let mut ticks = 0u64;
    let mut last_time = 0.0;
    let output = loop {
        let report = s.tick().unwrap();
        ticks += 1;
        assert!(report.tick.time_ms > last_time);
        assert_eq!(report.tick.delta, 2.0);
        last_time = report.tick.time_ms;
        if let Some(out) = report.finished {
            break out;
        }
        assert!(ticks < 20, "export never finished");
    };

    // 0.3 s of audio at 33.333 ms per frame.
    assert!((9..=11).contains(&ticks));
    match output {
        FinalizedOutput::Buffered(blob) => {
            assert_eq!(InMemoryEncoder::frame_count(&blob.bytes).unwrap(), ticks);
        }
        other => panic!("expected buffered output, got {other:?}"),
    }
    assert_eq!(s.monitor_gain().get(), 0.6);
    assert_eq!(s.clock_mode(), ClockMode::Preview);
    assert_eq!(s.capture_state(), CaptureState::Idle);
    assert!(!s.player().is_playing());
}

#[test]
fn export_progress_is_monotonic_and_capped() {
    let mut s = studio();
    s.start_export(
        &mut UnavailablePicker::default(),
        Box::new(InMemoryEncoder::new()),
        opts(),
    )
    .unwrap();
    let mut last = 0.0;
    for _ in 0..8 {
        let report = s.tick().unwrap();
        if let Some(p) = report.progress {
            assert!(p >= last);
            assert!(p <= 99.9);
            last = p;
        }
    }
    assert!(last > 0.0);
}

#[test]
fn declined_picker_starts_nothing() {
    struct Decline;
    impl DestinationPicker for Decline {
        fn pick(
            &mut self,
            _name: &str,
        ) -> Result<Box<dyn crate::capture::WriteDestination>, crate::capture::PickError> {
            Err(crate::capture::PickError::Cancelled)
        }
    }
    let mut s = studio();
    let start = s
        .start_export(&mut Decline, Box::new(InMemoryEncoder::new()), opts())
        .unwrap();
    assert_eq!(start, ExportStart::Declined);
    assert_eq!(s.capture_state(), CaptureState::Idle);
    assert_eq!(s.clock_mode(), ClockMode::Preview);
    assert_eq!(s.monitor_gain().get(), 1.0);
}

#[test]
fn playback_failure_cancels_export_and_notifies() {
    let mut s = studio_with(Vec::new());
    s.monitor_gain().set(0.4);
    let err = s
        .start_export(
            &mut UnavailablePicker::default(),
            Box::new(InMemoryEncoder::new()),
            opts(),
        )
        .unwrap_err();
    assert!(matches!(err, StudioError::Audio(_)));
    assert_eq!(s.capture_state(), CaptureState::Idle);
    assert_eq!(s.monitor_gain().get(), 0.4);
    assert!(s
        .take_notices()
        .iter()
        .any(|n| matches!(n, Notice::PlaybackFailed(_))));
}

#[test]
fn cancel_without_export_is_a_no_op() {
    let mut s = studio();
    s.monitor_gain().set(0.3);
    assert!(!s.cancel_export());
    assert!(!s.cancel_export());
    assert_eq!(s.monitor_gain().get(), 0.3);
    assert!(s.stop_export().unwrap().is_none());
}

#[test]
fn cancel_mid_export_restores_preview_and_gain() {
    let mut s = studio();
    s.start_export(
        &mut UnavailablePicker::default(),
        Box::new(InMemoryEncoder::new()),
        opts(),
    )
    .unwrap();
    s.tick().unwrap();
    assert!(s.cancel_export());
    assert_eq!(s.capture_state(), CaptureState::Idle);
    assert_eq!(s.clock_mode(), ClockMode::Preview);
    assert_eq!(s.monitor_gain().get(), 1.0);
    assert!(!s.player().is_playing());
}

/// Delegates to [`InMemoryEncoder`] but rejects every frame after the first `ok_frames`.
struct FlakyEncoder {
    inner: InMemoryEncoder,
    ok_frames: u64,
}

impl MediaEncoder for FlakyEncoder {
    fn is_supported(&self, profile: crate::capture::CodecProfile) -> bool {
        self.inner.is_supported(profile)
    }

    fn start(
        &mut self,
        config: &crate::capture::encoder::EncoderConfig,
        chunks: std::sync::mpsc::Sender<Vec<u8>>,
    ) -> StudioResult<()> {
        self.inner.start(config, chunks)
    }

    fn push_frame(
        &mut self,
        idx: crate::foundation::core::FrameIndex,
        frame: &crate::render::FrameRGBA,
    ) -> StudioResult<()> {
        if self.ok_frames == 0 {
            return Err(StudioError::capture("encoder pipe closed"));
        }
        self.ok_frames -= 1;
        self.inner.push_frame(idx, frame)
    }

    fn stop(&mut self) -> StudioResult<()> {
        self.inner.stop()
    }

    fn abort(&mut self) {
        self.inner.abort();
    }
}

#[test]
fn failed_frame_push_cancels_export() {
    let mut s = studio();
    s.monitor_gain().set(0.8);
    s.start_export(
        &mut UnavailablePicker::default(),
        Box::new(FlakyEncoder {
            inner: InMemoryEncoder::new(),
            ok_frames: 2,
        }),
        opts(),
    )
    .unwrap();
    s.take_notices();

    s.tick().unwrap();
    s.tick().unwrap();
    let err = s.tick().unwrap_err();
    assert!(matches!(err, StudioError::Capture(_)));
    assert_eq!(s.capture_state(), CaptureState::Idle);
    assert_eq!(s.clock_mode(), ClockMode::Preview);
    assert_eq!(s.monitor_gain().get(), 0.8);
    assert!(s
        .take_notices()
        .iter()
        .any(|n| matches!(n, Notice::RecordingFailed(_))));

    // The studio keeps previewing afterwards.
    assert!(s.tick().unwrap().finished.is_none());
}

#[test]
fn second_start_is_rejected_while_recording() {
    let mut s = studio();
    s.start_export(
        &mut UnavailablePicker::default(),
        Box::new(InMemoryEncoder::new()),
        opts(),
    )
    .unwrap();
    assert!(s
        .start_export(
            &mut UnavailablePicker::default(),
            Box::new(InMemoryEncoder::new()),
            opts(),
        )
        .is_err());
}

#[test]
fn manual_stop_finalizes_early() {
    let mut s = studio();
    s.start_export(
        &mut UnavailablePicker::default(),
        Box::new(InMemoryEncoder::new()),
        opts(),
    )
    .unwrap();
    for _ in 0..3 {
        s.tick().unwrap();
    }
    let out = s.stop_export().unwrap().unwrap();
    match out {
        FinalizedOutput::Buffered(blob) => {
            assert_eq!(InMemoryEncoder::frame_count(&blob.bytes).unwrap(), 3);
        }
        other => panic!("expected buffered output, got {other:?}"),
    }
    assert_eq!(s.export_progress(), Some(100.0));
    s.wait_export_settled();
    assert_eq!(s.capture_state(), CaptureState::Idle);
    assert_eq!(s.export_progress(), None);
}

#[test]
fn effect_and_density_changes_reseed_particles() {
    let mut s = studio();
    assert!(s.particles().is_empty());
    s.update_setting(SettingUpdate::ParticleEffect(ParticleEffect::Snow))
        .unwrap();
    assert_eq!(s.particles().len(), 100);
    s.update_setting(SettingUpdate::ParticleDensity(10.0))
        .unwrap();
    assert_eq!(s.particles().len(), 20);

    let before = s.particles().particles()[0];
    s.update_setting(SettingUpdate::ParticleOpacity(0.2)).unwrap();
    assert_eq!(s.particles().particles()[0], before);
}

#[test]
fn explicit_color_forces_fixed_mode() {
    let mut s = studio();
    s.update_setting("spectrum.colorMode=rainbow".parse().unwrap())
        .unwrap();
    assert_eq!(s.settings().spectrum.color_mode, ColorMode::Rainbow);
    s.update_setting("spectrum.color=#ff0000".parse().unwrap())
        .unwrap();
    assert_eq!(s.settings().spectrum.color_mode, ColorMode::Fixed);
}

#[test]
fn invalid_update_keeps_previous_settings() {
    let mut s = studio();
    let before = s.settings().clone();
    assert!(s.update_setting(SettingUpdate::SpectrumOpacity(7.0)).is_err());
    assert_eq!(s.settings(), &before);
}

#[test]
fn suggested_filename_sanitizes_name() {
    let mut s = studio();
    s.set_name("My Mix #1");
    assert_eq!(s.suggested_filename(), "My_Mix__1.mp4");
}

#[test]
fn render_still_positions_playhead_without_playing() {
    let mut s = studio();
    s.render_still(250.0).unwrap();
    assert!(!s.player().is_playing());
    assert_eq!(s.player().cursor().track, 1);
    assert!((s.player().elapsed_secs() - 0.25).abs() < 1e-9);
    assert_eq!(s.surface().pixel(0, 0)[3], 255);
}

#[test]
fn render_still_works_without_tracks() {
    let mut s = studio_with(Vec::new());
    s.render_still(1000.0).unwrap();
    assert_eq!(s.surface().pixel(32, 18)[3], 255);
}
