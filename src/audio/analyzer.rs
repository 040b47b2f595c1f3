use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use std::sync::Arc;

/// Transform window length in samples.
pub const FFT_SIZE: usize = 2048;
/// Number of magnitude bins exposed per snapshot (`FFT_SIZE / 2`).
pub const BIN_COUNT: usize = FFT_SIZE / 2;

/// Source of frequency-domain magnitude snapshots for the currently playing audio.
pub trait FrequencyAnalyzer {
    /// Number of bins written by [`FrequencyAnalyzer::magnitude_snapshot`].
    fn bin_count(&self) -> usize;

    /// Write byte magnitudes (0..=255) into `out`. Extra entries in `out` are zeroed.
    fn magnitude_snapshot(&mut self, out: &mut [u8]);
}

/// Browser-analyser-style FFT: Blackman window, exponential smoothing and a fixed dB window
/// mapped onto bytes.
pub struct FftAnalyzer {
    fft: Arc<dyn rustfft::Fft<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    buf: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
}

impl FftAnalyzer {
    /// Analyser with smoothing 0.8 and a -100..-30 dB range.
    pub fn new() -> Self {
        let n = FFT_SIZE;
        let window = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                0.42 - 0.5 * (2.0 * std::f32::consts::PI * x).cos()
                    + 0.08 * (4.0 * std::f32::consts::PI * x).cos()
            })
            .collect();
        let mut planner = FftPlanner::<f32>::new();
        Self {
            fft: planner.plan_fft_forward(n),
            window,
            input: vec![0.0; n],
            buf: vec![Complex { re: 0.0, im: 0.0 }; n],
            smoothed: vec![0.0; BIN_COUNT],
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }

    /// Replace the time-domain window with the most recent mono samples.
    ///
    /// Shorter inputs are right-aligned and zero-padded at the front.
    pub fn set_input(&mut self, mono: &[f32]) {
        let n = FFT_SIZE;
        let take = mono.len().min(n);
        let pad = n - take;
        self.input[..pad].fill(0.0);
        self.input[pad..].copy_from_slice(&mono[mono.len() - take..]);
    }

    /// Drop smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
        self.input.fill(0.0);
    }
}

impl Default for FftAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrequencyAnalyzer for FftAnalyzer {
    fn bin_count(&self) -> usize {
        BIN_COUNT
    }

    fn magnitude_snapshot(&mut self, out: &mut [u8]) {
        let n = FFT_SIZE;
        for (i, c) in self.buf.iter_mut().enumerate() {
            c.re = self.input[i] * self.window[i];
            c.im = 0.0;
        }
        self.fft.process(&mut self.buf);

        let tau = self.smoothing;
        let range = self.max_db - self.min_db;
        for (k, slot) in out.iter_mut().enumerate() {
            if k >= BIN_COUNT {
                *slot = 0;
                continue;
            }
            let mag = self.buf[k].norm() / n as f32;
            let s = tau * self.smoothed[k] + (1.0 - tau) * mag;
            self.smoothed[k] = if s.is_finite() { s } else { 0.0 };

            let db = 20.0 * self.smoothed[k].log10();
            let scaled = (255.0 / range) * (db - self.min_db);
            *slot = if scaled.is_finite() {
                scaled.floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
    }
}

/// Analyzer returning a fixed snapshot, for tests and stills.
#[derive(Clone, Debug)]
pub struct StaticAnalyzer {
    bins: Vec<u8>,
}

impl StaticAnalyzer {
    /// Analyzer that always reports `bins`.
    pub fn new(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    /// Analyzer reporting `value` in every one of [`BIN_COUNT`] bins.
    pub fn flat(value: u8) -> Self {
        Self::new(vec![value; BIN_COUNT])
    }
}

impl FrequencyAnalyzer for StaticAnalyzer {
    fn bin_count(&self) -> usize {
        self.bins.len()
    }

    fn magnitude_snapshot(&mut self, out: &mut [u8]) {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.bins.get(i).copied().unwrap_or(0);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/analyzer.rs"]
mod tests;
