use super::*;
use crate::capture::destination::{FileDestinationPicker, UnavailablePicker, WriteDestination};
use crate::capture::encoder::InMemoryEncoder;
use std::sync::{Arc, Mutex};

fn opts() -> CaptureOpts {
    CaptureOpts {
        settle_delay: Duration::ZERO,
        ..CaptureOpts::default()
    }
}

fn canvas() -> Canvas {
    Canvas::new(8, 4).unwrap()
}

fn frame(v: u8) -> FrameRGBA {
    FrameRGBA {
        width: 8,
        height: 4,
        data: vec![v; 8 * 4 * 4],
        premultiplied: true,
    }
}

fn session(gain: &MonitorGain) -> CaptureSession {
    CaptureSession::new(Box::new(InMemoryEncoder::new()), gain.clone(), opts())
}

#[derive(Default)]
struct Log {
    writes: usize,
    closed: bool,
    aborted: bool,
}

struct Tracked(Arc<Mutex<Log>>);

impl WriteDestination for Tracked {
    fn write(&mut self, _chunk: &[u8]) -> StudioResult<()> {
        self.0.lock().unwrap().writes += 1;
        Ok(())
    }
    fn close(self: Box<Self>) -> StudioResult<()> {
        self.0.lock().unwrap().closed = true;
        Ok(())
    }
    fn abort(self: Box<Self>) -> StudioResult<()> {
        self.0.lock().unwrap().aborted = true;
        Ok(())
    }
}

struct TrackedPicker(Arc<Mutex<Log>>);

impl DestinationPicker for TrackedPicker {
    fn pick(&mut self, _name: &str) -> Result<Box<dyn WriteDestination>, PickError> {
        Ok(Box::new(Tracked(Arc::clone(&self.0))))
    }
}

struct DecliningPicker;

impl DestinationPicker for DecliningPicker {
    fn pick(&mut self, _name: &str) -> Result<Box<dyn WriteDestination>, PickError> {
        Err(PickError::Cancelled)
    }
}

#[test]
fn cancel_from_idle_is_a_no_op() {
    let gain = MonitorGain::new(0.8);
    let mut s = session(&gain);
    assert!(!s.cancel());
    assert!(!s.cancel());
    assert_eq!(s.state(), CaptureState::Idle);
    assert_eq!(gain.get(), 0.8);
    assert!(s.take_notices().is_empty());
    assert!(s.finalize().unwrap().is_none());
}

#[test]
fn declined_picker_aborts_without_starting() {
    let gain = MonitorGain::new(1.0);
    let mut s = session(&gain);
    assert!(!s.acquire_destination(&mut DecliningPicker, "x.mp4").unwrap());
    assert_eq!(s.state(), CaptureState::Idle);
    assert_eq!(s.strategy(), None);
    assert!(s.begin_recording(canvas(), None).is_err());
    assert_eq!(gain.get(), 1.0);
}

#[test]
fn unavailable_destination_falls_back_to_buffered() {
    let gain = MonitorGain::new(1.0);
    let mut s = session(&gain);
    assert!(s
        .acquire_destination(&mut UnavailablePicker::new("no api"), "x.mp4")
        .unwrap());
    assert_eq!(s.strategy(), Some(OutputStrategy::Buffered));
    assert_eq!(
        s.take_notices(),
        vec![Notice::StreamingUnavailable("no api".to_owned())]
    );
}

#[test]
fn buffered_recording_mutes_then_restores_and_yields_blob() {
    let gain = MonitorGain::new(0.7);
    let mut s = session(&gain);
    s.acquire_destination(&mut UnavailablePicker::default(), "x.mp4")
        .unwrap();
    s.begin_recording(canvas(), None).unwrap();
    assert_eq!(s.state(), CaptureState::Recording);
    assert_eq!(gain.get(), 0.0);
    assert_eq!(s.profile(), Some(CodecProfile::Mp4H264High));

    for i in 0..40 {
        s.push_frame(&frame(i)).unwrap();
    }
    assert_eq!(s.frames_pushed(), 40);

    let out = s.finalize().unwrap().unwrap();
    assert_eq!(gain.get(), 0.7);
    assert_eq!(s.state(), CaptureState::Finalizing);
    assert_eq!(s.progress(), 100.0);
    match out {
        FinalizedOutput::Buffered(blob) => {
            assert_eq!(InMemoryEncoder::frame_count(&blob.bytes).unwrap(), 40);
            assert_eq!(blob.mime, CodecProfile::Mp4H264High.mime());
        }
        other => panic!("expected buffered output, got {other:?}"),
    }
    assert!(s.poll_settled());
    assert_eq!(s.state(), CaptureState::Idle);
}

#[test]
fn streaming_recording_writes_chunks_and_closes() {
    let log = Arc::new(Mutex::new(Log::default()));
    let gain = MonitorGain::new(1.0);
    let mut s = session(&gain);
    s.acquire_destination(&mut TrackedPicker(Arc::clone(&log)), "x.mp4")
        .unwrap();
    assert_eq!(s.strategy(), Some(OutputStrategy::Streaming));
    s.begin_recording(canvas(), None).unwrap();
    for i in 0..95 {
        s.push_frame(&frame(i)).unwrap();
    }
    let out = s.finalize().unwrap().unwrap();
    match out {
        FinalizedOutput::Streamed(report) => {
            // 30 frames per one-second timeslice: three full chunks plus the tail.
            assert_eq!(report.chunks, 4);
            assert_eq!(report.failed, 0);
        }
        other => panic!("expected streamed output, got {other:?}"),
    }
    let log = log.lock().unwrap();
    assert_eq!(log.writes, 4);
    assert!(log.closed);
    assert!(!log.aborted);
}

#[test]
fn cancel_while_recording_aborts_destination_and_restores_gain() {
    let log = Arc::new(Mutex::new(Log::default()));
    let gain = MonitorGain::new(0.5);
    let mut s = session(&gain);
    s.acquire_destination(&mut TrackedPicker(Arc::clone(&log)), "x.mp4")
        .unwrap();
    s.begin_recording(canvas(), None).unwrap();
    s.push_frame(&frame(1)).unwrap();
    assert!(s.cancel());
    assert_eq!(s.state(), CaptureState::Idle);
    assert_eq!(gain.get(), 0.5);
    {
        let log = log.lock().unwrap();
        assert!(log.aborted);
        assert!(!log.closed);
    }
    assert!(!s.cancel());
    assert!(s.finalize().unwrap().is_none());
}

#[test]
fn progress_is_capped_and_monotonic_while_recording() {
    let gain = MonitorGain::default();
    let mut s = session(&gain);
    assert_eq!(s.record_progress(0.0, 10.0, 100.0), None);
    s.acquire_destination(&mut UnavailablePicker::default(), "x.mp4")
        .unwrap();
    s.begin_recording(canvas(), None).unwrap();
    assert_eq!(s.record_progress(0.0, 10.0, 100.0), Some(10.0));
    assert_eq!(s.record_progress(50.0, 20.0, 100.0), None);
    assert_eq!(s.record_progress(150.0, 5.0, 100.0), Some(10.0));
    assert_eq!(s.record_progress(300.0, 500.0, 100.0), Some(99.9));
    s.finalize().unwrap();
    assert_eq!(s.progress(), 100.0);
}

#[test]
fn codec_fallback_leaves_notice_and_default_mime() {
    let gain = MonitorGain::default();
    let encoder = InMemoryEncoder::with_supported(std::iter::empty());
    let mut s = CaptureSession::new(Box::new(encoder), gain, opts());
    s.acquire_destination(&mut UnavailablePicker::new("off"), "x.mp4")
        .unwrap();
    s.take_notices();
    s.begin_recording(canvas(), None).unwrap();
    assert_eq!(s.profile(), None);
    assert_eq!(s.mime(), DEFAULT_MIME);
    assert_eq!(s.take_notices(), vec![Notice::CodecFallback]);
}

#[test]
fn starting_twice_is_rejected() {
    let gain = MonitorGain::default();
    let mut s = session(&gain);
    s.acquire_destination(&mut UnavailablePicker::default(), "x.mp4")
        .unwrap();
    assert!(s
        .acquire_destination(&mut UnavailablePicker::default(), "x.mp4")
        .is_err());
}

#[test]
fn bad_canvas_releases_mute() {
    let gain = MonitorGain::new(0.9);
    let mut s = session(&gain);
    s.acquire_destination(&mut UnavailablePicker::default(), "x.mp4")
        .unwrap();
    let odd = Canvas {
        width: 7,
        height: 4,
    };
    assert!(s.begin_recording(odd, None).is_err());
    assert_eq!(s.state(), CaptureState::Idle);
    assert_eq!(gain.get(), 0.9);
}

#[test]
fn dropping_active_session_aborts_file_destination() {
    let dir = std::env::temp_dir().join(format!(
        "spectrum_studio_session_drop_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    let gain = MonitorGain::new(1.0);
    {
        let mut s = session(&gain);
        s.acquire_destination(&mut FileDestinationPicker::new(&dir), "out.mp4")
            .unwrap();
        s.begin_recording(canvas(), None).unwrap();
        assert_eq!(gain.get(), 0.0);
    }
    assert_eq!(gain.get(), 1.0);
    assert!(!dir.join("out.mp4").exists());
    assert!(!dir.join("out.mp4.part").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn blob_save_creates_parent_dirs() {
    let dir = std::env::temp_dir().join(format!(
        "spectrum_studio_blob_{}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    let blob = OutputBlob {
        bytes: vec![1, 2, 3],
        mime: DEFAULT_MIME.to_owned(),
    };
    let path = dir.join("nested").join("a.mp4");
    blob.save(&path).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    let _ = std::fs::remove_dir_all(&dir);
}
