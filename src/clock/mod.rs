//! Frame clock with interchangeable tick sources.

/// Tick sources: display refresh, fixed-interval timer, immediate and manual.
pub mod source;

use tracing::info;

use crate::foundation::core::Fps;
use crate::foundation::error::StudioResult;
pub use source::{ImmediateTicks, ManualTicks, RefreshTicks, TickSource, TimerTicks};

/// Simulated time added per export tick (one frame at 30 fps).
pub const EXPORT_STEP_MS: f64 = 33.333;
/// Constant delta scalar used while exporting.
pub const EXPORT_DELTA: f64 = 2.0;
/// Preview deltas are wall-clock milliseconds over this value (one 60 Hz frame).
pub const PREVIEW_FRAME_MS: f64 = 16.666;
/// Preview deltas are computed from at most this many milliseconds.
pub const PREVIEW_MAX_DT_MS: f64 = 100.0;

/// How tick sources are built for each mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Pacing {
    /// Display-refresh preview ticks and a timer thread for export.
    #[default]
    Realtime,
    /// Ticks fire as soon as they are requested (offline renders and tests).
    Unthrottled,
}

impl Pacing {
    /// Source for preview mode.
    pub fn preview_source(self) -> Box<dyn TickSource> {
        match self {
            Self::Realtime => Box::new(RefreshTicks::new()),
            Self::Unthrottled => Box::new(ImmediateTicks::new()),
        }
    }

    /// Source for export mode at `fps`.
    pub fn export_source(self, fps: Fps) -> StudioResult<Box<dyn TickSource>> {
        match self {
            Self::Realtime => Ok(Box::new(TimerTicks::start(fps.frame_duration_ms())?)),
            Self::Unthrottled => Ok(Box::new(ImmediateTicks::new())),
        }
    }
}

/// How time advances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockMode {
    /// Wall-clock timestamps, refresh-driven.
    Preview,
    /// Fixed timestep, timer-driven.
    Export,
}

/// One clock tick handed to the compositor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTick {
    /// Absolute time in milliseconds.
    pub time_ms: f64,
    /// Delta scalar, 1.0 per 60 Hz frame.
    pub delta: f64,
    /// Ticks since the current mode was entered.
    pub index: u64,
}

/// Produces `(time, delta)` pairs in either preview or export mode.
///
/// Switching modes is a hard transition: the previous source is dropped (stopping a timer
/// thread) and export time restarts at zero.
pub struct FrameClock {
    mode: ClockMode,
    source: Box<dyn TickSource>,
    last_wall_ms: f64,
    index: u64,
}

impl std::fmt::Debug for FrameClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameClock")
            .field("mode", &self.mode)
            .field("last_wall_ms", &self.last_wall_ms)
            .field("index", &self.index)
            .finish()
    }
}

impl FrameClock {
    /// Preview clock driven by `source`.
    pub fn preview(source: Box<dyn TickSource>) -> Self {
        let last_wall_ms = source.now_ms();
        Self {
            mode: ClockMode::Preview,
            source,
            last_wall_ms,
            index: 0,
        }
    }

    /// Active mode.
    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    /// Ticks since the current mode was entered.
    pub fn ticks_in_mode(&self) -> u64 {
        self.index
    }

    /// Simulated export time reached so far; zero in preview.
    pub fn export_time_ms(&self) -> f64 {
        match self.mode {
            ClockMode::Export => self.index as f64 * EXPORT_STEP_MS,
            ClockMode::Preview => 0.0,
        }
    }

    /// Switch to fixed-timestep ticking from `source`; simulated time restarts at zero.
    pub fn enter_export(&mut self, source: Box<dyn TickSource>) {
        self.source = source;
        self.mode = ClockMode::Export;
        self.index = 0;
        info!("frame clock: export mode");
    }

    /// Resume wall-clock ticking from `source`.
    pub fn enter_preview(&mut self, source: Box<dyn TickSource>) {
        self.last_wall_ms = source.now_ms();
        self.source = source;
        self.mode = ClockMode::Preview;
        self.index = 0;
        info!("frame clock: preview mode");
    }

    /// Wait for the next tick from the active source.
    pub fn tick(&mut self) -> StudioResult<FrameTick> {
        let stamp = self.source.next_tick()?;
        Ok(self.step(stamp))
    }

    /// Advance by one tick that fired at host time `stamp_ms`.
    ///
    /// Export ticks ignore the stamp.
    pub fn step(&mut self, stamp_ms: f64) -> FrameTick {
        self.index += 1;
        match self.mode {
            ClockMode::Export => FrameTick {
                time_ms: self.index as f64 * EXPORT_STEP_MS,
                delta: EXPORT_DELTA,
                index: self.index,
            },
            ClockMode::Preview => {
                let dt = (stamp_ms - self.last_wall_ms).clamp(0.0, PREVIEW_MAX_DT_MS);
                self.last_wall_ms = stamp_ms;
                FrameTick {
                    time_ms: stamp_ms,
                    delta: dt / PREVIEW_FRAME_MS,
                    index: self.index,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/clock/clock.rs"]
mod tests;
