//! Background execution budget.
//!
//! While the app is backgrounded the OS grants work in bounded windows,
//! represented by a token acquired through [`BackgroundTasks::begin`] and
//! handed back with [`BackgroundTasks::end`]. [`BackgroundBudget`] wraps the
//! host and enforces two rules:
//!
//! - a token is released exactly once per acquisition, and any held token is
//!   released before a new one is acquired
//! - once more than the configured budget has elapsed since entering the
//!   background, background polling must stop

use std::time::{Duration, Instant};

use super::source::BackgroundTaskId;

/// Host for OS-granted background execution windows.
pub trait BackgroundTasks: Send {
    /// Request a new background execution window.
    fn begin(&mut self) -> BackgroundTaskId;

    /// Hand a window back to the OS.
    fn end(&mut self, id: BackgroundTaskId);
}

/// In-process task host that hands out sequential ids.
///
/// Used by the CLI and in tests where no OS is granting real windows.
#[derive(Debug, Default)]
pub struct LocalBackgroundTasks {
    next_id: u64,
    active: Vec<BackgroundTaskId>,
}

impl LocalBackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids that have been begun and not yet ended.
    pub fn active(&self) -> &[BackgroundTaskId] {
        &self.active
    }
}

impl BackgroundTasks for LocalBackgroundTasks {
    fn begin(&mut self) -> BackgroundTaskId {
        self.next_id += 1;
        let id = BackgroundTaskId(self.next_id);
        self.active.push(id);
        tracing::debug!(task = %id, "Background task started");
        id
    }

    fn end(&mut self, id: BackgroundTaskId) {
        self.active.retain(|a| *a != id);
        tracing::debug!(task = %id, "Background task ended");
    }
}

/// Time spent in the background, present only while backgrounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundWindow {
    /// When the app entered the background.
    pub entered_at: Instant,

    /// Ceiling on background polling time.
    pub budget: Duration,
}

impl BackgroundWindow {
    /// Time elapsed since entering the background.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.entered_at)
    }
}

/// Tracks the background window and the held execution token.
pub struct BackgroundBudget {
    tasks: Box<dyn BackgroundTasks>,
    budget: Duration,
    window: Option<BackgroundWindow>,
    held: Option<BackgroundTaskId>,
}

impl BackgroundBudget {
    /// Create a budget manager. A zero `budget` disables the ceiling.
    pub fn new(tasks: Box<dyn BackgroundTasks>, budget: Duration) -> Self {
        Self {
            tasks,
            budget,
            window: None,
            held: None,
        }
    }

    /// Configured ceiling.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Record entry into the background and acquire a token.
    pub fn enter(&mut self, now: Instant) {
        self.window = Some(BackgroundWindow {
            entered_at: now,
            budget: self.budget,
        });
        self.acquire();
    }

    /// Leave the background: clear the window and release any token.
    pub fn leave(&mut self) {
        self.window = None;
        self.release();
    }

    /// Swap the held token for a fresh one, releasing the old one first.
    ///
    /// Returns the new token, or `None` outside the background.
    pub fn renew(&mut self) -> Option<BackgroundTaskId> {
        self.window?;
        self.acquire();
        self.held
    }

    /// Release the held token, if any.
    pub fn release(&mut self) {
        if let Some(id) = self.held.take() {
            self.tasks.end(id);
        }
    }

    /// Handle an OS expiration signal for `id`.
    ///
    /// Returns true if `id` was the held token. Unknown or already released
    /// ids are ignored.
    pub fn mark_expired(&mut self, id: BackgroundTaskId) -> bool {
        if self.held != Some(id) {
            return false;
        }
        self.release();
        true
    }

    /// Elapsed background time, if backgrounded.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.window.map(|w| w.elapsed(now))
    }

    /// Returns true once more than the budget has elapsed in the background.
    pub fn is_exhausted(&self, now: Instant) -> bool {
        match self.window {
            Some(w) if !w.budget.is_zero() => w.elapsed(now) > w.budget,
            _ => false,
        }
    }

    /// Current window, if backgrounded.
    pub fn window(&self) -> Option<BackgroundWindow> {
        self.window
    }

    /// Currently held token.
    pub fn held_task(&self) -> Option<BackgroundTaskId> {
        self.held
    }

    /// Returns true if a token is held.
    pub fn holds_task(&self) -> bool {
        self.held.is_some()
    }

    /// Clear the window and release any token.
    pub fn reset(&mut self) {
        self.leave();
    }

    fn acquire(&mut self) {
        self.release();
        self.held = Some(self.tasks.begin());
    }
}

impl std::fmt::Debug for BackgroundBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundBudget")
            .field("budget", &self.budget)
            .field("window", &self.window)
            .field("held", &self.held)
            .finish()
    }
}
