//! Monotonic clock abstraction for the sampling loop.
//!
//! The engine never calls `Instant::now` or `thread::sleep` directly; it goes
//! through [Clock] so deterministic runs (tests, offline replay) can substitute
//! a virtual clock that advances only when the loop sleeps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Trait representing a monotonic time source plus the loop's pacing sleep.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Default clock backed by `Instant::now` and `thread::sleep`.
#[derive(Default)]
pub struct SystemClock {
    _unit: (),
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock for tests and offline replay.
///
/// Time stands still between calls; `sleep` advances the virtual offset
/// instead of blocking, so a full simulated minute runs in microseconds of
/// wall time while timestamps keep their exact spacing.
pub struct ManualClock {
    start: Instant,
    offset_us: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_us: AtomicU64::new(0),
        }
    }

    /// Advance virtual time without going through `sleep`.
    pub fn advance(&self, duration: Duration) {
        self.offset_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    /// Virtual time elapsed since the clock was created.
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.offset_us.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
