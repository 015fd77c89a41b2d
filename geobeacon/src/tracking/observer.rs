//! Observer notifications emitted by the coordinator.
//!
//! Observers receive read-only, one-way notifications on the runtime task.
//! They must not block; anything slow belongs behind a channel, which is
//! what [`BroadcastObserver`] provides.

use tokio::sync::broadcast;

use super::position::Position;
use super::source::ServicesState;
use crate::upload::UploadOutcome;

/// Default capacity of the broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Receiver of coordinator notifications.
///
/// All methods default to no-ops so implementors pick what they need.
pub trait TrackingObserver: Send + Sync {
    /// A valid sample was accepted as the best-fit position.
    fn on_position(&self, _position: &Position, _heading: f64) {}

    /// An upload of `position` completed.
    fn on_upload_result(&self, _position: &Position, _outcome: &UploadOutcome) {}

    /// An upload is about to be issued `distance_m` away from the last sent
    /// position.
    fn on_local_log_entry(&self, _position: &Position, _distance_m: f64) {}

    /// Location services need user attention.
    fn on_services_unavailable(&self, _state: ServicesState) {}
}

/// Owned form of an observer notification.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    Position { position: Position, heading: f64 },
    UploadResult { position: Position, outcome: UploadOutcome },
    LocalLogEntry { position: Position, distance_m: f64 },
    ServicesUnavailable(ServicesState),
}

/// Observer that republishes notifications on a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<TrackingEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn publish(&self, event: TrackingEvent) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl TrackingObserver for BroadcastObserver {
    fn on_position(&self, position: &Position, heading: f64) {
        self.publish(TrackingEvent::Position {
            position: *position,
            heading,
        });
    }

    fn on_upload_result(&self, position: &Position, outcome: &UploadOutcome) {
        self.publish(TrackingEvent::UploadResult {
            position: *position,
            outcome: outcome.clone(),
        });
    }

    fn on_local_log_entry(&self, position: &Position, distance_m: f64) {
        self.publish(TrackingEvent::LocalLogEntry {
            position: *position,
            distance_m,
        });
    }

    fn on_services_unavailable(&self, state: ServicesState) {
        self.publish(TrackingEvent::ServicesUnavailable(state));
    }
}

/// Observer that logs every notification through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TrackingObserver for TracingObserver {
    fn on_position(&self, position: &Position, heading: f64) {
        tracing::debug!(
            latitude = position.latitude,
            longitude = position.longitude,
            accuracy = position.horizontal_accuracy,
            heading,
            "Position updated"
        );
    }

    fn on_upload_result(&self, position: &Position, outcome: &UploadOutcome) {
        if outcome.success {
            tracing::info!(
                latitude = position.latitude,
                longitude = position.longitude,
                "Position sent"
            );
        } else {
            tracing::warn!(
                latitude = position.latitude,
                longitude = position.longitude,
                error = ?outcome.error,
                "Position upload failed"
            );
        }
    }

    fn on_local_log_entry(&self, position: &Position, distance_m: f64) {
        tracing::info!(
            latitude = position.latitude,
            longitude = position.longitude,
            distance_m,
            "Moved since last upload"
        );
    }

    fn on_services_unavailable(&self, state: ServicesState) {
        tracing::warn!(%state, "Location services unavailable, enable them in settings");
    }
}
