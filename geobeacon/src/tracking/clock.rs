//! Monotonic time source for the coordinator.
//!
//! Production code reads tokio's clock so that paused-time tests drive it
//! too. Unit tests use [`SimulatedClock`] and move time by hand.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of "now" for freshness checks, budgets and upload cadence.
pub trait Clock: Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;
}

/// Clock backed by `tokio::time::Instant`.
///
/// Honours `tokio::time::pause()` and `advance()`, so runtime tests with
/// `start_paused = true` see the same timeline as the scheduler.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

/// Manually driven clock.
///
/// Clones share the same instant.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    now: Arc<Mutex<Instant>>,
}

impl SimulatedClock {
    /// Create a clock frozen at the current real instant.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a clock frozen at `start`.
    pub fn starting_at(start: Instant) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: Instant) {
        *self.now.lock().unwrap() = instant;
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}
