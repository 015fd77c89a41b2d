//! Coordinator state types and the read-only snapshot.

use std::fmt;
use std::time::Instant;

use super::budget::BackgroundWindow;
use super::position::Position;
use super::source::SubscriptionHandle;

/// Tracking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    #[default]
    Idle,
    ForegroundTracking,
    BackgroundTracking,
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::ForegroundTracking => write!(f, "ForegroundTracking"),
            Self::BackgroundTracking => write!(f, "BackgroundTracking"),
        }
    }
}

/// The most recent position the coordinator attempted to upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastSentRecord {
    pub position: Position,

    /// When the upload completed.
    pub sent_at: Instant,
}

/// Live subscription handles, at most one per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveSubscriptions {
    pub foreground: Option<SubscriptionHandle>,
    pub background: Option<SubscriptionHandle>,
    pub significant: Option<SubscriptionHandle>,
    pub heading: Option<SubscriptionHandle>,
}

impl ActiveSubscriptions {
    /// Returns true if no subscription is live.
    pub fn is_empty(&self) -> bool {
        self.foreground.is_none()
            && self.background.is_none()
            && self.significant.is_none()
            && self.heading.is_none()
    }

    /// Number of live subscriptions.
    pub fn count(&self) -> usize {
        [self.foreground, self.background, self.significant, self.heading]
            .iter()
            .filter(|h| h.is_some())
            .count()
    }
}

/// Point-in-time view of the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSnapshot {
    pub state: TrackingState,
    pub best_fit: Option<Position>,
    pub last_sent: Option<LastSentRecord>,
    pub heading: f64,
    pub background_window: Option<BackgroundWindow>,
    pub subscriptions: ActiveSubscriptions,
    pub upload_timer_active: bool,
    pub background_restart_pending: bool,
    pub holds_background_task: bool,
    pub lifecycle_registered: bool,
}

impl TrackingSnapshot {
    /// Returns true if the snapshot matches a freshly constructed coordinator.
    pub fn is_pristine(&self) -> bool {
        self.state == TrackingState::Idle
            && self.best_fit.is_none()
            && self.last_sent.is_none()
            && self.heading == 0.0
            && self.background_window.is_none()
            && self.subscriptions.is_empty()
            && !self.upload_timer_active
            && !self.background_restart_pending
            && !self.holds_background_task
            && !self.lifecycle_registered
    }
}
