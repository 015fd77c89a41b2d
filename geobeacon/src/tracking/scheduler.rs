//! Cancellable timers for the coordinator.
//!
//! The coordinator owns two timers: the repeating upload check and the
//! one-shot background restart. Both go through the [`Scheduler`] trait so
//! that the coordinator never touches tokio directly.
//!
//! A firing is delivered as a [`TimerFired`] message carrying the generation
//! it was scheduled with. Rescheduling or cancelling bumps the generation in
//! the coordinator, so a firing that was already in flight is recognised as
//! stale and dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

use super::clock::{Clock, SimulatedClock};

/// Deadline used when `now + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The coordinator's timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Repeating upload cadence check.
    Upload,
    /// One-shot restart of background polling.
    BackgroundRestart,
}

/// How a timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSchedule {
    /// Every period, first firing one period from now.
    Repeating(Duration),
    /// Once, after the delay.
    Once(Duration),
}

impl TimerSchedule {
    fn delay(&self) -> Duration {
        match self {
            Self::Repeating(d) | Self::Once(d) => *d,
        }
    }
}

/// A timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub generation: u64,
}

/// Timer facility used by the coordinator.
///
/// At most one timer per [`TimerKind`] is live; scheduling a kind replaces
/// any existing timer of that kind. `cancel` is idempotent.
pub trait Scheduler: Send {
    /// Schedule (or reschedule) the timer of the given kind.
    fn schedule(&mut self, kind: TimerKind, generation: u64, schedule: TimerSchedule);

    /// Cancel the timer of the given kind, if any.
    fn cancel(&mut self, kind: TimerKind);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokio scheduler
// ─────────────────────────────────────────────────────────────────────────────

/// Scheduler that spawns one tokio task per live timer.
///
/// Firings are sent on the channel handed to [`TokioScheduler::new`]. Must be
/// used from within a tokio runtime.
#[derive(Debug)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerFired>,
    tasks: HashMap<TimerKind, JoinHandle<()>>,
}

impl TokioScheduler {
    /// Create a scheduler and the receiver its firings arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TimerFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                tasks: HashMap::new(),
            },
            rx,
        )
    }

    /// Number of live timer tasks.
    pub fn active_count(&self) -> usize {
        self.tasks.values().filter(|t| !t.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, kind: TimerKind, generation: u64, schedule: TimerSchedule) {
        self.cancel(kind);

        let tx = self.tx.clone();
        let fired = TimerFired { kind, generation };

        let now = tokio::time::Instant::now();
        let deadline = now.checked_add(schedule.delay()).unwrap_or_else(|| {
            warn!(?kind, delay = ?schedule.delay(), "Timer delay out of range, clamping");
            now + FAR_FUTURE
        });

        let handle = match schedule {
            TimerSchedule::Repeating(period) => tokio::spawn(async move {
                let mut interval = tokio::time::interval_at(deadline, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    if tx.send(fired).is_err() {
                        break;
                    }
                }
            }),
            TimerSchedule::Once(_) => tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                let _ = tx.send(fired);
            }),
        };

        self.tasks.insert(kind, handle);
    }

    fn cancel(&mut self, kind: TimerKind) {
        if let Some(handle) = self.tasks.remove(&kind) {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Simulated scheduler
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct SimulatedTimer {
    generation: u64,
    schedule: TimerSchedule,
    deadline: Instant,
}

/// Deterministic scheduler driven together with a [`SimulatedClock`].
///
/// Clones share state, so a test can hand one clone to the coordinator and
/// keep another to inspect and advance time.
#[derive(Debug, Clone)]
pub struct SimulatedScheduler {
    clock: SimulatedClock,
    timers: Arc<Mutex<HashMap<TimerKind, SimulatedTimer>>>,
}

impl SimulatedScheduler {
    /// Create a scheduler reading deadlines off `clock`.
    pub fn new(clock: SimulatedClock) -> Self {
        Self {
            clock,
            timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns true if a timer of `kind` is live.
    pub fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.timers.lock().unwrap().contains_key(&kind)
    }

    /// Next firing instant of `kind`, if live.
    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        self.timers.lock().unwrap().get(&kind).map(|t| t.deadline)
    }

    /// Number of live timers.
    pub fn scheduled_count(&self) -> usize {
        self.timers.lock().unwrap().len()
    }

    /// Advance the clock by `by`, firing every timer that comes due in
    /// deadline order.
    ///
    /// The clock is moved to each deadline before `fire` is called, and the
    /// internal lock is not held during the call, so `fire` may schedule or
    /// cancel timers.
    pub fn advance(&self, by: Duration, mut fire: impl FnMut(TimerFired)) {
        let target = self.clock.now() + by;

        loop {
            let due = {
                let mut timers = self.timers.lock().unwrap();
                let next = timers
                    .iter()
                    .filter(|(_, t)| t.deadline <= target)
                    .min_by_key(|(_, t)| t.deadline)
                    .map(|(kind, t)| (*kind, *t));

                match next {
                    Some((kind, timer)) => {
                        match timer.schedule {
                            TimerSchedule::Repeating(period) => {
                                if let Some(t) = timers.get_mut(&kind) {
                                    t.deadline += period;
                                }
                            }
                            TimerSchedule::Once(_) => {
                                timers.remove(&kind);
                            }
                        }
                        Some((
                            timer.deadline,
                            TimerFired {
                                kind,
                                generation: timer.generation,
                            },
                        ))
                    }
                    None => None,
                }
            };

            let Some((deadline, fired)) = due else { break };
            self.clock.set(deadline);
            fire(fired);
        }

        self.clock.set(target);
    }
}

impl Scheduler for SimulatedScheduler {
    fn schedule(&mut self, kind: TimerKind, generation: u64, schedule: TimerSchedule) {
        let now = self.clock.now();
        let deadline = now
            .checked_add(schedule.delay())
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.timers.lock().unwrap().insert(
            kind,
            SimulatedTimer {
                generation,
                schedule,
                deadline,
            },
        );
    }

    fn cancel(&mut self, kind: TimerKind) {
        self.timers.lock().unwrap().remove(&kind);
    }
}
