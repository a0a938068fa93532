//! Turns a monotonic time source into discrete beats. A driver calls
//! [`BeatClock::poll`]; the first beat after a (re)start waits twice as long.
//! Each start, resume, stop or retune opens a new epoch carried in [`BeatId`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::constants::{beat_interval, FIRST_BEAT_GRACE_MULTIPLIER, MIN_BPM, TIMING_TOLERANCE};

/// Monotonic time measured from an arbitrary origin.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Duration;
}

#[derive(Clone, Copy, Debug)]
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven time. Clones share the same reading, so a test can keep one
/// handle and give another to the engine.
#[derive(Clone, Debug, Default)]
pub struct ManualTime {
    nanos: Arc<AtomicU64>,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, at: Duration) {
        self.nanos.store(at.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BeatId {
    pub epoch: u64,
    pub beat: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
    Paused,
}

#[derive(Clone, Debug)]
pub struct BeatClock {
    bpm: f64,
    interval: Duration,
    state: ClockState,
    beat: u64,
    epoch: u64,
    first_beat: bool,
    last_beat_at: Duration,
}

impl Default for BeatClock {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatClock {
    pub fn new() -> Self {
        Self {
            bpm: MIN_BPM,
            interval: beat_interval(MIN_BPM),
            state: ClockState::Stopped,
            beat: 0,
            epoch: 0,
            first_beat: true,
            last_beat_at: Duration::ZERO,
        }
    }

    pub fn load(&mut self, bpm: f64) {
        self.bpm = if bpm.is_finite() && bpm > 0.0 {
            bpm
        } else {
            MIN_BPM
        };
        self.interval = beat_interval(self.bpm);
    }

    pub fn play(&mut self, now: Duration) {
        if self.state == ClockState::Running {
            return;
        }
        self.start_polling(now);
    }

    /// Only a paused clock can resume; the beat counter carries over.
    pub fn resume(&mut self, now: Duration) {
        if self.state != ClockState::Paused {
            return;
        }
        self.start_polling(now);
    }

    pub fn pause(&mut self) {
        if self.state == ClockState::Running {
            self.state = ClockState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
        self.beat = 0;
        self.first_beat = true;
        self.epoch += 1;
    }

    pub fn change_bpm(&mut self, bpm: f64, now: Duration) {
        self.stop();
        self.load(bpm);
        self.play(now);
    }

    fn start_polling(&mut self, now: Duration) {
        self.state = ClockState::Running;
        self.first_beat = true;
        self.last_beat_at = now;
        self.epoch += 1;
    }

    /// Samples the clock. Emits at most one beat per call.
    pub fn poll(&mut self, now: Duration) -> Option<BeatId> {
        if self.state != ClockState::Running {
            return None;
        }
        let elapsed = now.saturating_sub(self.last_beat_at);
        if elapsed < self.required_interval() {
            return None;
        }
        self.beat += 1;
        self.first_beat = false;
        self.last_beat_at = now;
        Some(self.current_id())
    }

    fn required_interval(&self) -> Duration {
        if self.first_beat {
            self.interval * FIRST_BEAT_GRACE_MULTIPLIER
        } else {
            self.interval
        }
    }

    pub fn time_to_next_beat(&self, now: Duration) -> Duration {
        if self.state != ClockState::Running {
            return Duration::ZERO;
        }
        let elapsed = now.saturating_sub(self.last_beat_at);
        self.required_interval().saturating_sub(elapsed)
    }

    /// Share of the current interval still left before the next beat, 0..=1.
    pub fn time_until_next_beat(&self, now: Duration) -> f64 {
        let required = self.required_interval().as_secs_f64();
        if self.state != ClockState::Running || required <= 0.0 {
            return 0.0;
        }
        (self.time_to_next_beat(now).as_secs_f64() / required).clamp(0.0, 1.0)
    }

    /// Whether `now` falls within the tolerance window around a beat boundary.
    /// Feedback only; move validity never depends on it.
    pub fn is_within_tolerance(&self, now: Duration) -> bool {
        if self.state != ClockState::Running {
            return false;
        }
        let since_last = now.saturating_sub(self.last_beat_at);
        let until_next = self.time_to_next_beat(now);
        let tolerance = self.interval.mul_f64(TIMING_TOLERANCE);
        since_last.min(until_next) <= tolerance
    }

    pub fn current_id(&self) -> BeatId {
        BeatId {
            epoch: self.epoch,
            beat: self.beat,
        }
    }

    pub fn current_beat(&self) -> u64 {
        self.beat
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == ClockState::Running
    }
}
