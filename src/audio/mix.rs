use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::assets::media::AudioPcm;
use crate::audio::playlist::Playlist;
use crate::foundation::error::{StudioError, StudioResult};

/// Concatenate every track, repeated `loop_count` times, into one interleaved buffer.
///
/// All tracks must share sample rate and channel count.
pub fn render_timeline_pcm(playlist: &Playlist) -> StudioResult<AudioPcm> {
    let Some(first) = playlist.tracks().first() else {
        return Err(StudioError::audio("cannot render audio for an empty playlist"));
    };
    let sample_rate = first.pcm.sample_rate;
    let channels = first.pcm.channels;
    if let Some(t) = playlist
        .tracks()
        .iter()
        .find(|t| t.pcm.sample_rate != sample_rate || t.pcm.channels != channels)
    {
        return Err(StudioError::audio(format!(
            "track '{}' has format {} Hz x{}, expected {sample_rate} Hz x{channels}",
            t.name, t.pcm.sample_rate, t.pcm.channels
        )));
    }

    let one_pass: usize = playlist
        .tracks()
        .iter()
        .map(|t| t.pcm.interleaved_f32.len())
        .sum();
    let mut out = Vec::with_capacity(one_pass * playlist.loop_count() as usize);
    for _ in 0..playlist.loop_count() {
        for t in playlist.tracks() {
            out.extend_from_slice(&t.pcm.interleaved_f32);
        }
    }
    Ok(AudioPcm {
        sample_rate,
        channels,
        interleaved_f32: out,
    })
}

/// Write interleaved `f32` PCM as raw little-endian bytes.
pub fn write_pcm_to_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> StudioResult<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            StudioError::audio(format!(
                "failed to create audio output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        StudioError::audio(format!(
            "failed to write audio file '{}': {e}",
            out_path.display()
        ))
    })
}

/// Temporary raw PCM file removed on drop.
#[derive(Debug)]
pub struct TempPcmFile {
    path: PathBuf,
    /// Sample rate of the stored PCM.
    pub sample_rate: u32,
    /// Channel count of the stored PCM.
    pub channels: u16,
}

impl TempPcmFile {
    /// Write `pcm` to a fresh file in the system temp directory.
    pub fn create(pcm: &AudioPcm) -> StudioResult<Self> {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let path = std::env::temp_dir().join(format!(
            "spectrum_studio_capture_{}_{}_{}.f32le",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        write_pcm_to_f32le_file(&pcm.interleaved_f32, &path)?;
        Ok(Self {
            path,
            sample_rate: pcm.sample_rate,
            channels: pcm.channels,
        })
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempPcmFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/mix.rs"]
mod tests;
