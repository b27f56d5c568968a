//! Time source for the cycle driver and orchestrator.
//!
//! Every wait in a run goes through [`Clock::sleep`], so a [`ManualClock`]
//! can drive a whole multi-hour run in microseconds of real time.

use chrono::{DateTime, Local};
use std::cell::Cell;
use std::time::{Duration, Instant};

pub trait Clock {
    /// Monotonic instant, used for every elapsed-time measurement.
    fn now(&self) -> Instant;
    /// Wall-clock time, used only for timestamps shown to humans.
    fn wall(&self) -> DateTime<Local>;
    fn sleep(&self, duration: Duration);
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn wall(&self) -> DateTime<Local> {
        (**self).wall()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Real time; `sleep` blocks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Virtual time that only moves when something sleeps or calls [`advance`].
///
/// [`advance`]: ManualClock::advance
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: DateTime<Local>,
    offset: Cell<Duration>,
    slept: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Local::now())
    }

    pub fn starting_at(wall_origin: DateTime<Local>) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            offset: Cell::new(Duration::ZERO),
            slept: Cell::new(Duration::ZERO),
        }
    }

    /// Move time forward without counting it as sleep.
    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }

    /// Total time spent inside `sleep`.
    pub fn total_slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }

    fn wall(&self) -> DateTime<Local> {
        let offset = chrono::Duration::from_std(self.offset.get())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall_origin + offset
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        self.slept.set(self.slept.get() + duration);
    }
}
