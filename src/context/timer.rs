//! Scoped millisecond stopwatch
//!
//! `Timer::scoped(&mut slot)` returns a guard that writes the elapsed time into
//! `slot` when dropped, so the measurement lands on every exit path of the
//! enclosing block (early return, `?`, or unwinding).

use std::time::{Duration, Instant};

/// Round a duration to milliseconds with two decimal places.
pub fn duration_ms(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

/// Monotonic stopwatch
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Elapsed milliseconds since `start`, rounded to two decimals
    pub fn elapsed_ms(&self) -> f64 {
        duration_ms(self.started.elapsed())
    }

    /// Start timing into `slot`; the value is written when the guard drops.
    pub fn scoped(slot: &mut f64) -> TimerGuard<'_> {
        TimerGuard {
            timer: Self::start(),
            slot,
        }
    }
}

/// Writes the elapsed time into its slot on drop
#[must_use = "the measurement is recorded when the guard is dropped"]
pub struct TimerGuard<'a> {
    timer: Timer,
    slot: &'a mut f64,
}

impl TimerGuard<'_> {
    /// Elapsed time so far, without stopping the guard
    pub fn elapsed_ms(&self) -> f64 {
        self.timer.elapsed_ms()
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        *self.slot = self.timer.elapsed_ms();
    }
}
