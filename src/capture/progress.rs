use std::time::Duration;

use crate::audio::playlist::PROGRESS_CAP;

/// Export progress sampled at a fixed interval.
///
/// Reported values never decrease, stay at or below the cap while recording, and reach 100
/// exactly once on [`ProgressTracker::complete`].
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressTracker {
    interval_ms: f64,
    cap: f64,
    last_sample_ms: Option<f64>,
    value: f64,
    completed: bool,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), PROGRESS_CAP)
    }
}

impl ProgressTracker {
    /// Tracker sampling every `interval` and holding at `cap` until completion.
    pub fn new(interval: Duration, cap: f64) -> Self {
        Self {
            interval_ms: interval.as_secs_f64() * 1000.0,
            cap,
            last_sample_ms: None,
            value: 0.0,
            completed: false,
        }
    }

    /// Back to zero for a new recording.
    pub fn reset(&mut self) {
        self.last_sample_ms = None;
        self.value = 0.0;
        self.completed = false;
    }

    /// Latest reported value in percent.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// `true` once 100 has been reported.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Offer a sample taken at `now_ms`. Returns the new value when one is recorded.
    ///
    /// Samples closer than the interval to the previous one are ignored, as is everything
    /// after completion.
    pub fn sample(&mut self, now_ms: f64, elapsed_secs: f64, total_secs: f64) -> Option<f64> {
        if self.completed {
            return None;
        }
        if self
            .last_sample_ms
            .is_some_and(|last| now_ms - last < self.interval_ms)
        {
            return None;
        }
        self.last_sample_ms = Some(now_ms);
        let raw = if total_secs > 0.0 {
            elapsed_secs / total_secs * 100.0
        } else {
            0.0
        };
        let clamped = if raw.is_finite() {
            raw.clamp(0.0, self.cap)
        } else {
            0.0
        };
        self.value = self.value.max(clamped);
        Some(self.value)
    }

    /// Report 100. Returns `false` if already complete.
    pub fn complete(&mut self) -> bool {
        if self.completed {
            return false;
        }
        self.completed = true;
        self.value = 100.0;
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/capture/progress.rs"]
mod tests;
