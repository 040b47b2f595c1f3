//! Schedulers that decide when the next frame tick fires.
//!
//! Preview uses [`RefreshTicks`]; export uses [`TimerTicks`], whose thread keeps its cadence
//! regardless of how long drawing takes.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::foundation::error::{StudioError, StudioResult};

/// Display refresh interval emulated by [`RefreshTicks`].
pub const REFRESH_INTERVAL_MS: f64 = 1000.0 / 60.0;

/// Scheduler feeding the frame clock.
///
/// Timestamps are host milliseconds on the source's own monotonic timeline.
pub trait TickSource: Send {
    /// Current host time, without waiting.
    fn now_ms(&self) -> f64;

    /// Block until the next tick and return its timestamp.
    fn next_tick(&mut self) -> StudioResult<f64>;
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Wall-clock ticks at display refresh cadence.
///
/// Late ticks are coalesced: after a slow frame the next tick fires immediately and the
/// schedule restarts from there.
#[derive(Debug)]
pub struct RefreshTicks {
    start: Instant,
    interval: Duration,
    next: Instant,
}

impl RefreshTicks {
    /// 60 Hz refresh ticks.
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs_f64(REFRESH_INTERVAL_MS / 1000.0))
    }

    /// Ticks every `interval`.
    pub fn with_interval(interval: Duration) -> Self {
        let start = Instant::now();
        Self {
            start,
            interval,
            next: start + interval,
        }
    }
}

impl Default for RefreshTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for RefreshTicks {
    fn now_ms(&self) -> f64 {
        elapsed_ms(self.start)
    }

    fn next_tick(&mut self) -> StudioResult<f64> {
        let now = Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
            self.next += self.interval;
        } else {
            self.next = now + self.interval;
        }
        Ok(self.now_ms())
    }
}

/// Fixed-interval ticks produced by a dedicated timer thread.
///
/// The timer keeps its cadence regardless of how long the consumer takes; pending ticks queue
/// up and are delivered late rather than dropped. Dropping the source stops the thread.
#[derive(Debug)]
pub struct TimerTicks {
    start: Instant,
    rx: mpsc::Receiver<f64>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TimerTicks {
    /// Start a timer firing every `interval_ms`.
    pub fn start(interval_ms: f64) -> StudioResult<Self> {
        if !interval_ms.is_finite() || interval_ms <= 0.0 {
            return Err(StudioError::validation("timer interval must be finite and > 0"));
        }
        let interval = Duration::from_secs_f64(interval_ms / 1000.0);
        let start = Instant::now();
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<f64>();

        let stop_flag = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("export-timer".to_owned())
            .spawn(move || {
                let mut n: u32 = 1;
                while !stop_flag.load(Ordering::Acquire) {
                    let deadline = start + interval * n;
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::sleep(deadline - now);
                    }
                    if stop_flag.load(Ordering::Acquire) {
                        break;
                    }
                    if tx.send(elapsed_ms(start)).is_err() {
                        break;
                    }
                    n = n.saturating_add(1);
                }
            })
            .map_err(|e| StudioError::render(format!("failed to spawn export timer: {e}")))?;
        debug!(interval_ms, "export timer started");

        Ok(Self {
            start,
            rx,
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the timer thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("export timer stopped");
        }
    }
}

impl TickSource for TimerTicks {
    fn now_ms(&self) -> f64 {
        elapsed_ms(self.start)
    }

    fn next_tick(&mut self) -> StudioResult<f64> {
        self.rx
            .recv()
            .map_err(|_| StudioError::render("export timer is not running"))
    }
}

impl Drop for TimerTicks {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Ticks as fast as they are requested. Used for offline renders.
#[derive(Debug)]
pub struct ImmediateTicks {
    start: Instant,
}

impl ImmediateTicks {
    /// Source starting now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for ImmediateTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for ImmediateTicks {
    fn now_ms(&self) -> f64 {
        elapsed_ms(self.start)
    }

    fn next_tick(&mut self) -> StudioResult<f64> {
        Ok(self.now_ms())
    }
}

/// Scripted timestamps.
#[derive(Clone, Debug, Default)]
pub struct ManualTicks {
    now: f64,
    queue: VecDeque<f64>,
}

impl ManualTicks {
    /// Source whose clock reads `now` until the first tick is consumed.
    pub fn new(now: f64) -> Self {
        Self {
            now,
            queue: VecDeque::new(),
        }
    }

    /// Source that will yield `stamps` in order.
    pub fn with_stamps(now: f64, stamps: impl IntoIterator<Item = f64>) -> Self {
        Self {
            now,
            queue: stamps.into_iter().collect(),
        }
    }

    /// Queue another timestamp.
    pub fn push(&mut self, stamp: f64) {
        self.queue.push_back(stamp);
    }
}

impl TickSource for ManualTicks {
    fn now_ms(&self) -> f64 {
        self.now
    }

    fn next_tick(&mut self) -> StudioResult<f64> {
        let stamp = self
            .queue
            .pop_front()
            .ok_or_else(|| StudioError::render("manual tick source exhausted"))?;
        self.now = stamp;
        Ok(stamp)
    }
}
