//! Location tracking core.
//!
//! This module merges asynchronous position samples into a single best-fit
//! position, decides when that position is worth uploading, and moves
//! between foreground and background operation within a bounded background
//! execution budget.
//!
//! # Components
//!
//! - [`TrackingCoordinator`] - Synchronous state machine owning all tracking
//!   state
//! - [`TrackingService`] / [`TrackingHandle`] - Runs the coordinator on a
//!   single tokio task and exposes commands
//! - [`LocationSource`] - Subscription contract of the platform location
//!   service
//! - [`BackgroundBudget`] - Background execution token and time ceiling
//! - [`Scheduler`] / [`Clock`] - Time seams, tokio-backed or simulated
//! - [`TrackingObserver`] - Read-only notifications for UI or logging
//!
//! # Example
//!
//! ```ignore
//! let bus = LifecycleBus::default();
//! let (events_tx, events_rx) = mpsc::unbounded_channel();
//! let source = MyPlatformSource::new(events_tx);
//!
//! let (handle, task) = TrackingService::builder(TrackingConfig::default())
//!     .source(Box::new(source), events_rx)
//!     .lifecycle(&bus)
//!     .observer(Arc::new(TracingObserver))
//!     .spawn(Arc::new(HttpUploadClient::new(UploadConfig::default())?))?;
//!
//! handle.start()?;
//! ```

mod budget;
mod clock;
mod config;
mod coordinator;
mod dispatch;
mod lifecycle;
mod observer;
mod position;
mod runtime;
mod scheduler;
mod source;
mod state;

pub use budget::{BackgroundBudget, BackgroundTasks, BackgroundWindow, LocalBackgroundTasks};
pub use clock::{Clock, SimulatedClock, TokioClock};
pub use config::{
    TrackingConfig, DEFAULT_BACKGROUND_BUDGET, DEFAULT_DISTANCE_FILTER_M, DEFAULT_UPLOAD_INTERVAL,
    DEFAULT_UPLOAD_PATH, DEFAULT_UPLOAD_RETRY_COUNT,
};
pub use coordinator::TrackingCoordinator;
pub use dispatch::{SpawnedUploads, UploadCompleted, UploadDispatcher, UploadRequest, UploadTicket};
pub use lifecycle::{LifecycleBus, LifecycleEvent};
pub use observer::{BroadcastObserver, TracingObserver, TrackingEvent, TrackingObserver};
pub use position::{HeadingSample, Position, DEFAULT_MAX_SAMPLE_AGE};
pub use runtime::{TrackingCommand, TrackingError, TrackingHandle, TrackingService};
pub use scheduler::{
    Scheduler, SimulatedScheduler, TimerFired, TimerKind, TimerSchedule, TokioScheduler,
};
pub use source::{
    AccuracyTier, Authorization, BackgroundTaskId, HeadingUpdate, LocationSource, LocationStatus,
    LocationUpdate, PlatformEvent, ServicesState, SubscriptionHandle,
};
pub use state::{ActiveSubscriptions, LastSentRecord, TrackingSnapshot, TrackingState};
