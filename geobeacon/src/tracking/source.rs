//! Location source contract.
//!
//! A [`LocationSource`] hands out cancellable [`SubscriptionHandle`]s. It
//! never holds a reference to the coordinator: deliveries are pushed as
//! [`PlatformEvent`]s onto a channel that the tracking runtime drains on its
//! single task, tagged with the handle they belong to. Deliveries for a
//! handle that has since been cancelled are discarded by the coordinator.
//!
//! ```text
//! LocationSource ──PlatformEvent{handle, update}──▶ mpsc ──▶ runtime task
//!                                                              │
//!                                                   TrackingCoordinator
//! ```

use std::fmt;

use super::position::{HeadingSample, Position};

/// Opaque token for one live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Wrap a source-assigned identifier.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The source-assigned identifier.
    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Desired accuracy tier for continuous subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyTier {
    /// ~5m, highest power draw.
    Best,
    /// ~15m. Used for both foreground and background tracking.
    High,
    /// ~100m.
    Medium,
    /// ~1km.
    Low,
}

/// Status attached to every location delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStatus {
    /// A sample (possibly absent) was produced.
    Success,
    /// The user has denied location access for this app.
    PermissionDenied,
    /// Location services are switched off system-wide.
    ServicesDisabled,
}

impl LocationStatus {
    /// Returns true for the degraded-mode statuses.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::ServicesDisabled)
    }
}

impl fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::PermissionDenied => write!(f, "PermissionDenied"),
            Self::ServicesDisabled => write!(f, "ServicesDisabled"),
        }
    }
}

/// App-level location authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Authorization {
    /// The user has not been asked yet.
    #[default]
    NotDetermined,
    /// Location access is blocked by policy.
    Restricted,
    /// The user denied location access.
    Denied,
    /// Location access while the app is in use only.
    WhenInUse,
    /// Location access at all times, including in the background.
    Always,
}

impl Authorization {
    /// Returns true if background tracking is permitted.
    pub fn allows_background(&self) -> bool {
        *self == Self::Always
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDetermined => write!(f, "NotDetermined"),
            Self::Restricted => write!(f, "Restricted"),
            Self::Denied => write!(f, "Denied"),
            Self::WhenInUse => write!(f, "WhenInUse"),
            Self::Always => write!(f, "Always"),
        }
    }
}

/// System-wide location services state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServicesState {
    /// Services are on and the app may use them.
    #[default]
    Available,
    /// The app has not requested access yet.
    NotDetermined,
    /// The user denied access for this app.
    Denied,
    /// Access is blocked by policy.
    Restricted,
    /// Location services are switched off.
    Disabled,
}

impl ServicesState {
    /// Returns true when the user needs to act before tracking can work.
    pub fn needs_attention(&self) -> bool {
        matches!(self, Self::Denied | Self::Restricted | Self::Disabled)
    }
}

impl fmt::Display for ServicesState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "Available"),
            Self::NotDetermined => write!(f, "NotDetermined"),
            Self::Denied => write!(f, "Denied"),
            Self::Restricted => write!(f, "Restricted"),
            Self::Disabled => write!(f, "Disabled"),
        }
    }
}

/// One delivery on a position subscription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationUpdate {
    /// The fix, if the source produced one.
    pub position: Option<Position>,

    /// Accuracy tier the source managed to achieve, if known.
    pub achieved_accuracy: Option<AccuracyTier>,

    /// Delivery status.
    pub status: LocationStatus,
}

impl LocationUpdate {
    /// A successful delivery carrying a fix.
    pub fn fix(position: Position) -> Self {
        Self {
            position: Some(position),
            achieved_accuracy: None,
            status: LocationStatus::Success,
        }
    }

    /// A delivery carrying only a status.
    pub fn status(status: LocationStatus) -> Self {
        Self {
            position: None,
            achieved_accuracy: None,
            status,
        }
    }

    /// Attach the achieved accuracy tier.
    pub fn with_achieved_accuracy(mut self, tier: AccuracyTier) -> Self {
        self.achieved_accuracy = Some(tier);
        self
    }
}

/// One delivery on a heading subscription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingUpdate {
    /// The reading, if the source produced one.
    pub heading: Option<HeadingSample>,

    /// Delivery status.
    pub status: LocationStatus,
}

impl HeadingUpdate {
    /// A successful delivery carrying a reading.
    pub fn reading(heading: HeadingSample) -> Self {
        Self {
            heading: Some(heading),
            status: LocationStatus::Success,
        }
    }
}

/// Opaque token for an OS-granted background execution window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundTaskId(pub u64);

impl fmt::Display for BackgroundTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Asynchronous platform deliveries marshalled onto the runtime task.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    /// Delivery on a position subscription (continuous or significant-change).
    Location {
        handle: SubscriptionHandle,
        update: LocationUpdate,
    },
    /// Delivery on a heading subscription.
    Heading {
        handle: SubscriptionHandle,
        update: HeadingUpdate,
    },
    /// The OS revoked a background execution window before it was released.
    BackgroundTaskExpired(BackgroundTaskId),
}

/// Subscription contract of the platform location service.
///
/// Registration is fire-and-forget: each call returns immediately with a
/// handle, and samples arrive later as [`PlatformEvent`]s. Implementations
/// must make [`cancel`](Self::cancel) idempotent and must not deliver
/// further samples for a cancelled handle once `cancel` returns (any already
/// queued are filtered out by the coordinator).
pub trait LocationSource: Send {
    /// Subscribe to continuous position updates at the given accuracy.
    fn subscribe_continuous(&mut self, accuracy: AccuracyTier) -> SubscriptionHandle;

    /// Subscribe to low-power significant-change updates.
    fn subscribe_significant_changes(&mut self) -> SubscriptionHandle;

    /// Subscribe to continuous heading updates.
    fn subscribe_heading(&mut self) -> SubscriptionHandle;

    /// Cancel a subscription of any kind.
    fn cancel(&mut self, handle: SubscriptionHandle);

    /// Current app-level authorization.
    fn authorization(&self) -> Authorization;

    /// Current system-wide services state.
    fn services_state(&self) -> ServicesState;
}
