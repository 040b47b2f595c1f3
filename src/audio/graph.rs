use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::assets::media::AudioPcm;
use crate::audio::analyzer::{FFT_SIZE, FftAnalyzer, FrequencyAnalyzer};
use crate::audio::mix::render_timeline_pcm;
use crate::audio::playlist::{Player, Playlist};
use crate::foundation::error::StudioResult;

/// Shared gain of the monitor (speaker) path.
///
/// Clones observe the same value; capture mutes through one clone while the studio holds another.
#[derive(Clone, Debug)]
pub struct MonitorGain(Arc<AtomicU32>);

impl MonitorGain {
    /// Gain starting at `value`.
    pub fn new(value: f32) -> Self {
        Self(Arc::new(AtomicU32::new(value.to_bits())))
    }

    /// Current gain.
    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Replace the gain.
    pub fn set(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

impl Default for MonitorGain {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Speaker-side consumer. Tracks the gained peak of the last processed block.
#[derive(Debug)]
pub struct MonitorTap {
    gain: MonitorGain,
    last_peak: f32,
    frames_out: u64,
}

impl MonitorTap {
    fn process(&mut self, block: &[f32], channels: usize) {
        let g = self.gain.get();
        let peak = block.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        self.last_peak = peak * g;
        self.frames_out += (block.len() / channels.max(1)) as u64;
    }

    /// Gained peak level of the last block.
    pub fn level(&self) -> f32 {
        self.last_peak
    }

    /// Total sample frames delivered to the monitor.
    pub fn frames_out(&self) -> u64 {
        self.frames_out
    }
}

/// Capture-side consumer producing the unity-gain timeline for the encoder.
#[derive(Debug, Default)]
pub struct CaptureTap {
    renders: u32,
}

impl CaptureTap {
    fn render(&mut self, source: &Playlist) -> StudioResult<AudioPcm> {
        self.renders += 1;
        render_timeline_pcm(source)
    }

    /// Number of timelines rendered so far.
    pub fn renders(&self) -> u32 {
        self.renders
    }
}

/// Decode → analyser → {monitor, capture} fan-out.
///
/// Both taps are wired at construction and cannot be replaced afterwards.
pub struct AudioGraph {
    source: Arc<Playlist>,
    analyser: FftAnalyzer,
    monitor: MonitorTap,
    capture: CaptureTap,
    scratch: Vec<f32>,
    last_frame: Option<(usize, usize)>,
}

impl AudioGraph {
    /// Graph over `source` whose monitor path uses `gain`.
    pub fn new(source: Arc<Playlist>, gain: MonitorGain) -> Self {
        Self {
            source,
            analyser: FftAnalyzer::new(),
            monitor: MonitorTap {
                gain,
                last_peak: 0.0,
                frames_out: 0,
            },
            capture: CaptureTap::default(),
            scratch: Vec::with_capacity(FFT_SIZE),
            last_frame: None,
        }
    }

    /// Pull the samples around the player's playhead through the analyser and monitor.
    pub fn process(&mut self, player: &Player) {
        let Some(track) = player.current_track() else {
            self.analyser.set_input(&[]);
            return;
        };
        let pcm = &track.pcm;
        let ch = usize::from(pcm.channels.max(1));
        let end = player.playhead_frame();
        let start = end.saturating_sub(FFT_SIZE);

        self.scratch.clear();
        for frame in pcm.interleaved_f32[start * ch..end * ch].chunks_exact(ch) {
            self.scratch.push(frame.iter().sum::<f32>() / ch as f32);
        }
        self.analyser.set_input(&self.scratch);

        let cursor = (player.cursor().track, end);
        let from = match self.last_frame {
            Some((t, f)) if t == cursor.0 && f <= end => f,
            _ => start,
        };
        if player.is_playing() {
            self.monitor
                .process(&pcm.interleaved_f32[from * ch..end * ch], ch);
        }
        self.last_frame = Some(cursor);
    }

    /// The analyser tap.
    pub fn analyser(&mut self) -> &mut dyn FrequencyAnalyzer {
        &mut self.analyser
    }

    /// The monitor tap.
    pub fn monitor(&self) -> &MonitorTap {
        &self.monitor
    }

    /// Handle to the monitor gain.
    pub fn monitor_gain(&self) -> MonitorGain {
        self.monitor.gain.clone()
    }

    /// The capture tap.
    pub fn capture(&self) -> &CaptureTap {
        &self.capture
    }

    /// Render the whole loop-expanded timeline through the capture tap.
    pub fn render_capture_pcm(&mut self) -> StudioResult<AudioPcm> {
        self.capture.render(&self.source)
    }

    /// Forget analyser history and monitor position (used when playback rewinds).
    pub fn rewind(&mut self) {
        self.analyser.reset();
        self.last_frame = None;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/graph.rs"]
mod tests;
