//! App lifecycle notifications.
//!
//! The host application publishes foreground/background transitions on a
//! [`LifecycleBus`]. The tracking runtime holds one receiver; the
//! coordinator only acts on events while it is registered, which it is
//! between `start()` and `stop()`.

use std::fmt;

use tokio::sync::broadcast;

/// Default capacity of the lifecycle channel.
const DEFAULT_CAPACITY: usize = 16;

/// A foreground/background transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The app moved to the background.
    EnteredBackground,
    /// The app returned to the foreground.
    BecameActive,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnteredBackground => write!(f, "EnteredBackground"),
            Self::BecameActive => write!(f, "BecameActive"),
        }
    }
}

/// Cloneable publisher of lifecycle events.
#[derive(Debug, Clone)]
pub struct LifecycleBus {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Returns the number of receivers that will see it.
    pub fn publish(&self, event: LifecycleEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Create a new receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }
}

impl Default for LifecycleBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
