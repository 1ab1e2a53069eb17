//! Wall-clock backed tick counter.

use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use crate::types::Ticks;

/// Maps wall time since [`SimClock::start`] to ticks of a fixed length.
/// Reads as tick 0 until started.
#[derive(Debug)]
pub struct SimClock {
    start: OnceLock<Instant>,
    tick: Duration,
}

impl SimClock {
    pub fn new(tick: Duration) -> Self {
        assert!(!tick.is_zero(), "tick length must be non-zero");
        SimClock {
            start: OnceLock::new(),
            tick,
        }
    }

    /// Start counting. Later calls are no-ops.
    pub fn start(&self) {
        let _ = self.start.set(Instant::now());
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn now(&self) -> Ticks {
        match self.start.get() {
            Some(start) => (start.elapsed().as_nanos() / self.tick.as_nanos()) as Ticks,
            None => 0,
        }
    }

    /// Wall-clock instant at which tick `at` begins.
    pub fn deadline(&self, at: Ticks) -> Instant {
        let start = *self.start.get_or_init(Instant::now);
        let nanos = (self.tick.as_nanos() as u64).saturating_mul(at);
        start + Duration::from_nanos(nanos)
    }

    /// Spend one tick of wall time.
    pub fn sleep_tick(&self) {
        thread::sleep(self.tick);
    }
}
