use std::path::Path;
use std::sync::Arc;

use crate::assets::media::{AudioPcm, MIX_SAMPLE_RATE, decode_audio_f32_stereo};
use crate::foundation::error::{StudioError, StudioResult};

/// Highest progress reported before finalize.
pub const PROGRESS_CAP: f64 = 99.9;

/// Immutable decoded audio track.
#[derive(Clone, Debug)]
pub struct AudioTrack {
    /// Stable identifier derived from the name and sample count.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Decoded PCM.
    pub pcm: Arc<AudioPcm>,
    /// Duration in seconds.
    pub duration_secs: f64,
}

impl AudioTrack {
    /// Wrap decoded PCM.
    pub fn new(name: impl Into<String>, pcm: AudioPcm) -> Self {
        let name = name.into();
        let mut hasher = xxhash_rust::xxh3::Xxh3::new();
        hasher.update(name.as_bytes());
        hasher.update(&(pcm.interleaved_f32.len() as u64).to_le_bytes());
        hasher.update(&pcm.sample_rate.to_le_bytes());
        Self {
            id: hasher.digest(),
            duration_secs: pcm.duration_secs(),
            name,
            pcm: Arc::new(pcm),
        }
    }

    /// Decode a media file through `ffmpeg`.
    pub fn from_path(path: &Path) -> StudioResult<Self> {
        let pcm = decode_audio_f32_stereo(path, MIX_SAMPLE_RATE)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, pcm))
    }
}

/// Ordered tracks plus the number of times the whole list is played.
#[derive(Clone, Debug)]
pub struct Playlist {
    tracks: Vec<AudioTrack>,
    loop_count: u32,
}

impl Playlist {
    /// Validated playlist; `loop_count` must be within 1..=3.
    ///
    /// Sample rates are not checked here; the capture tap requires a uniform rate.
    pub fn new(tracks: Vec<AudioTrack>, loop_count: u32) -> StudioResult<Self> {
        if !(1..=3).contains(&loop_count) {
            return Err(StudioError::validation(format!(
                "loop count must be within 1..=3, got {loop_count}"
            )));
        }
        Ok(Self { tracks, loop_count })
    }

    /// Tracks in playback order.
    pub fn tracks(&self) -> &[AudioTrack] {
        &self.tracks
    }

    /// Playlist repetitions.
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// `true` when there is nothing to play.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Duration of one pass over the playlist.
    pub fn playlist_duration_secs(&self) -> f64 {
        self.tracks.iter().map(|t| t.duration_secs).sum()
    }

    /// Duration of the whole rendered timeline (`playlist × loops`).
    pub fn total_duration_secs(&self) -> f64 {
        self.playlist_duration_secs() * f64::from(self.loop_count)
    }
}

/// Position in the concatenated timeline: which track, which loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    /// Index into [`Playlist::tracks`].
    pub track: usize,
    /// 0-based loop iteration.
    pub loop_iter: u32,
}

/// Result of [`Player::handle_track_end`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackEnd {
    /// Moved to the next track in the same loop.
    NextTrack,
    /// Wrapped to track 0 of the next loop.
    NextLoop,
    /// Last track of the last loop ended; playback stopped.
    Finished,
}

/// Transport over a [`Playlist`]: cursor, in-track position and play state.
#[derive(Clone, Debug)]
pub struct Player {
    playlist: Arc<Playlist>,
    cursor: PlaybackCursor,
    position_secs: f64,
    playing: bool,
}

impl Player {
    /// Stopped player at the start of `playlist`.
    pub fn new(playlist: Arc<Playlist>) -> Self {
        Self {
            playlist,
            cursor: PlaybackCursor::default(),
            position_secs: 0.0,
            playing: false,
        }
    }

    /// Shared playlist.
    pub fn playlist(&self) -> &Arc<Playlist> {
        &self.playlist
    }

    /// Current cursor.
    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    /// Seconds into the current track.
    pub fn position_secs(&self) -> f64 {
        self.position_secs
    }

    /// `true` while playing.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Current track, if any.
    pub fn current_track(&self) -> Option<&AudioTrack> {
        self.playlist.tracks.get(self.cursor.track)
    }

    /// Rewind to track 0, loop 0.
    pub fn reset(&mut self) {
        self.cursor = PlaybackCursor::default();
        self.position_secs = 0.0;
    }

    /// Start playback. Fails when there is nothing audible to play.
    pub fn play(&mut self) -> StudioResult<()> {
        if self.playlist.is_empty() {
            return Err(StudioError::audio("cannot start playback: playlist is empty"));
        }
        if self.playlist.playlist_duration_secs() <= 0.0 {
            return Err(StudioError::audio(
                "cannot start playback: playlist has zero duration",
            ));
        }
        self.playing = true;
        Ok(())
    }

    /// Pause at the current position.
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Advance by `dt_secs`, crossing track boundaries as needed.
    ///
    /// Returns the last boundary crossed during this step, if any. Overshoot carries into the
    /// next track so the timeline stays continuous.
    pub fn advance(&mut self, dt_secs: f64) -> Option<TrackEnd> {
        if !self.playing || dt_secs <= 0.0 {
            return None;
        }
        self.position_secs += dt_secs;
        let mut last = None;
        while let Some(track) = self.current_track() {
            let dur = track.duration_secs;
            if self.position_secs < dur {
                break;
            }
            let overshoot = self.position_secs - dur;
            let end = self.handle_track_end();
            last = Some(end);
            if end == TrackEnd::Finished {
                break;
            }
            self.position_secs = overshoot;
        }
        last
    }

    /// Move past the end of the current track.
    pub fn handle_track_end(&mut self) -> TrackEnd {
        let n = self.playlist.tracks.len();
        if self.cursor.track + 1 < n {
            self.cursor.track += 1;
            self.position_secs = 0.0;
            TrackEnd::NextTrack
        } else if self.cursor.loop_iter + 1 < self.playlist.loop_count {
            self.cursor.loop_iter += 1;
            self.cursor.track = 0;
            self.position_secs = 0.0;
            TrackEnd::NextLoop
        } else {
            self.playing = false;
            if let Some(t) = self.current_track() {
                self.position_secs = t.duration_secs;
            }
            TrackEnd::Finished
        }
    }

    /// Seconds elapsed in the whole timeline.
    pub fn elapsed_secs(&self) -> f64 {
        let before: f64 = self
            .playlist
            .tracks
            .iter()
            .take(self.cursor.track)
            .map(|t| t.duration_secs)
            .sum();
        f64::from(self.cursor.loop_iter) * self.playlist.playlist_duration_secs()
            + before
            + self.position_secs
    }

    /// Timeline progress in percent, capped at [`PROGRESS_CAP`].
    pub fn progress_percent(&self) -> f64 {
        let total = self.playlist.total_duration_secs();
        if total <= 0.0 {
            return 0.0;
        }
        (self.elapsed_secs() / total * 100.0).min(PROGRESS_CAP)
    }

    /// Sample-frame index of the playhead inside the current track.
    pub fn playhead_frame(&self) -> usize {
        let Some(track) = self.current_track() else {
            return 0;
        };
        let frame = (self.position_secs * f64::from(track.pcm.sample_rate)).floor();
        (frame.max(0.0) as usize).min(track.pcm.frames())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/playlist.rs"]
mod tests;
