//! The tracking coordinator.
//!
//! [`TrackingCoordinator`] owns every piece of mutable tracking state and is
//! driven entirely by method calls from a single task: caller commands,
//! platform deliveries, lifecycle events, timer firings and upload
//! completions. It never blocks and never awaits; side effects go out
//! through the [`LocationSource`], [`Scheduler`], [`UploadDispatcher`] and
//! [`BackgroundTasks`] seams.
//!
//! # Mode transitions
//!
//! ```text
//!          start()                 EnteredBackground (Always only)
//!   Idle ──────────▶ Foreground ─────────────────────────▶ Background
//!    ▲                   ▲                                     │
//!    │     stop()        └─────────── BecameActive ────────────┘
//!    └──────────────── (from any state)
//! ```
//!
//! # Upload cadence
//!
//! A repeating timer fires every upload interval. If no upload has completed
//! within that interval the last-sent record is cleared and the best-fit
//! position is uploaded unconditionally. Otherwise uploads are gated by the
//! distance filter: a position within `distance_filter_m` of the last sent
//! one is not uploaded again.
//!
//! # Background budget
//!
//! On entering the background the coordinator acquires an execution token
//! and starts both a background polling subscription and significant-change
//! monitoring. The first sample of each polling subscription rotates the
//! token, uploads, and schedules a one-shot restart of polling one upload
//! interval later. Once more than the background budget has elapsed the
//! token is released and polling stops for good; significant-change
//! monitoring keeps running until the app is foregrounded or stopped.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use super::budget::{BackgroundBudget, BackgroundTasks, LocalBackgroundTasks};
use super::clock::{Clock, TokioClock};
use super::config::TrackingConfig;
use super::dispatch::{UploadCompleted, UploadDispatcher, UploadRequest, UploadTicket};
use super::lifecycle::LifecycleEvent;
use super::observer::TrackingObserver;
use super::position::Position;
use super::scheduler::{Scheduler, TimerFired, TimerKind, TimerSchedule};
use super::source::{
    AccuracyTier, Authorization, BackgroundTaskId, HeadingUpdate, LocationSource, LocationStatus,
    LocationUpdate, PlatformEvent, ServicesState, SubscriptionHandle,
};
use super::state::{ActiveSubscriptions, LastSentRecord, TrackingSnapshot, TrackingState};
use crate::upload::LocationBody;

/// Which position subscription a delivery arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PositionFeed {
    Foreground,
    Background,
    Significant,
}

// ─────────────────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────────────────

/// Stateful tracking coordinator.
///
/// Construct with [`TrackingCoordinator::new`], then hand it to
/// [`TrackingService`](super::TrackingService) or drive it directly.
pub struct TrackingCoordinator {
    config: TrackingConfig,
    source: Box<dyn LocationSource>,
    scheduler: Box<dyn Scheduler>,
    uploads: Box<dyn UploadDispatcher>,
    clock: Arc<dyn Clock>,
    budget: BackgroundBudget,
    observers: Vec<Arc<dyn TrackingObserver>>,

    state: TrackingState,
    registered: bool,
    subscriptions: ActiveSubscriptions,

    /// Whether the current background subscription has delivered a valid
    /// sample yet.
    background_sample_seen: bool,

    best_fit: Option<Position>,
    last_sent: Option<LastSentRecord>,
    last_updated: Option<Instant>,
    heading: f64,
    coordinate: (f64, f64),

    /// Generation of the live upload timer.
    upload_timer: Option<u64>,
    /// Generation of the live background restart timer.
    restart_timer: Option<u64>,
    generation: u64,

    /// Bumped by `stop()` so uploads from a previous session are ignored.
    session: u64,
}

impl std::fmt::Debug for TrackingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingCoordinator")
            .field("state", &self.state)
            .field("registered", &self.registered)
            .field("subscriptions", &self.subscriptions)
            .field("best_fit", &self.best_fit)
            .field("last_sent", &self.last_sent)
            .field("heading", &self.heading)
            .field("budget", &self.budget)
            .field("observers", &self.observers.len())
            .field("session", &self.session)
            .finish()
    }
}

impl TrackingCoordinator {
    /// Create an idle coordinator.
    ///
    /// Uses the tokio clock and an in-process background task host; override
    /// with [`with_clock`](Self::with_clock) and
    /// [`with_background_tasks`](Self::with_background_tasks).
    pub fn new(
        config: TrackingConfig,
        source: Box<dyn LocationSource>,
        scheduler: Box<dyn Scheduler>,
        uploads: Box<dyn UploadDispatcher>,
    ) -> Self {
        let budget = BackgroundBudget::new(
            Box::new(LocalBackgroundTasks::new()),
            config.background_budget,
        );

        Self {
            config,
            source,
            scheduler,
            uploads,
            clock: Arc::new(TokioClock),
            budget,
            observers: Vec::new(),
            state: TrackingState::Idle,
            registered: false,
            subscriptions: ActiveSubscriptions::default(),
            background_sample_seen: false,
            best_fit: None,
            last_sent: None,
            last_updated: None,
            heading: 0.0,
            coordinate: (0.0, 0.0),
            upload_timer: None,
            restart_timer: None,
            generation: 0,
            session: 0,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the background task host.
    pub fn with_background_tasks(mut self, tasks: Box<dyn BackgroundTasks>) -> Self {
        self.budget = BackgroundBudget::new(tasks, self.config.background_budget);
        self
    }

    /// Add an observer.
    pub fn with_observer(mut self, observer: Arc<dyn TrackingObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Add an observer after construction.
    pub fn add_observer(&mut self, observer: Arc<dyn TrackingObserver>) {
        self.observers.push(observer);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start (or restart) foreground tracking.
    ///
    /// Replaces any foreground subscription, subscribes to heading once per
    /// session, registers for lifecycle events and restarts the upload timer.
    pub fn start(&mut self) {
        if self.state == TrackingState::BackgroundTracking {
            self.leave_background();
        }

        if let Some(handle) = self.subscriptions.foreground.take() {
            self.source.cancel(handle);
        }
        self.subscriptions.foreground = Some(self.source.subscribe_continuous(AccuracyTier::High));

        if self.subscriptions.heading.is_none() {
            self.subscriptions.heading = Some(self.source.subscribe_heading());
        }

        self.registered = true;
        self.start_upload_timer();
        self.state = TrackingState::ForegroundTracking;

        info!(
            interval_secs = self.config.upload_interval.as_secs(),
            "Foreground tracking started"
        );
    }

    /// Stop tracking and return to the just-constructed state.
    ///
    /// Safe to call repeatedly and from any state.
    pub fn stop(&mut self) {
        let was_active = self.state != TrackingState::Idle || self.registered;

        self.registered = false;

        for handle in [
            self.subscriptions.foreground.take(),
            self.subscriptions.heading.take(),
            self.subscriptions.background.take(),
            self.subscriptions.significant.take(),
        ]
        .into_iter()
        .flatten()
        {
            self.source.cancel(handle);
        }

        self.cancel_upload_timer();
        self.cancel_restart_timer();
        self.budget.reset();

        self.background_sample_seen = false;
        self.best_fit = None;
        self.last_sent = None;
        self.last_updated = None;
        self.heading = 0.0;
        self.coordinate = (0.0, 0.0);
        self.session += 1;
        self.state = TrackingState::Idle;

        if was_active {
            info!("Tracking stopped");
        }
    }

    /// Clear the last-sent record and run the upload path.
    pub fn resend(&mut self) {
        self.last_sent = None;
        self.send_location();
    }

    /// Inspect the services state and notify observers if the user needs to
    /// act.
    pub fn check_location_services(&self) -> ServicesState {
        let state = self.source.services_state();
        if state.needs_attention() {
            warn!(%state, "Location services unavailable");
            for observer in &self.observers {
                observer.on_services_unavailable(state);
            }
        }
        state
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event handlers
    // ─────────────────────────────────────────────────────────────────────────

    /// Handle a delivery from the location source.
    pub fn handle_platform_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::Location { handle, update } => self.on_location(handle, update),
            PlatformEvent::Heading { handle, update } => self.on_heading(handle, update),
            PlatformEvent::BackgroundTaskExpired(id) => self.on_background_task_expired(id),
        }
    }

    /// Handle an app lifecycle transition.
    pub fn handle_lifecycle(&mut self, event: LifecycleEvent) {
        if !self.registered {
            trace!(%event, "Lifecycle event ignored, not registered");
            return;
        }

        match event {
            LifecycleEvent::EnteredBackground => self.enter_background(),
            LifecycleEvent::BecameActive => self.become_active(),
        }
    }

    /// Handle a timer firing.
    pub fn handle_timer(&mut self, fired: TimerFired) {
        match fired.kind {
            TimerKind::Upload => {
                if self.upload_timer != Some(fired.generation) {
                    trace!(generation = fired.generation, "Stale upload timer ignored");
                    return;
                }
                self.on_upload_tick();
            }
            TimerKind::BackgroundRestart => {
                if self.restart_timer != Some(fired.generation) {
                    trace!(generation = fired.generation, "Stale restart timer ignored");
                    return;
                }
                self.restart_timer = None;
                debug!("Restarting background polling");
                self.start_background_polling();
            }
        }
    }

    /// Handle a finished upload.
    ///
    /// The attempted position becomes the last-sent record whether or not the
    /// upload succeeded.
    pub fn handle_upload_completed(&mut self, completed: UploadCompleted) {
        let UploadCompleted { ticket, outcome } = completed;

        if ticket.session != self.session {
            trace!(session = ticket.session, "Upload from a stopped session ignored");
            return;
        }

        let now = self.clock.now();
        self.last_sent = Some(LastSentRecord {
            position: ticket.attempted,
            sent_at: now,
        });
        self.last_updated = Some(now);

        if outcome.success {
            info!(
                latitude = ticket.attempted.latitude,
                longitude = ticket.attempted.longitude,
                "Location uploaded"
            );
        } else {
            warn!(
                latitude = ticket.attempted.latitude,
                longitude = ticket.attempted.longitude,
                error = ?outcome.error,
                "Location upload failed"
            );
        }

        for observer in &self.observers {
            observer.on_upload_result(&ticket.attempted, &outcome);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Most recently accepted valid sample.
    pub fn best_fit(&self) -> Option<Position> {
        self.best_fit
    }

    pub fn last_sent(&self) -> Option<LastSentRecord> {
        self.last_sent
    }

    /// Last valid heading in degrees, zero before any.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// Best-fit position, falling back to the last sent one.
    pub fn current_position(&self) -> Option<Position> {
        self.best_fit.or(self.last_sent.map(|r| r.position))
    }

    /// Last accepted (lat, lon), zero before any sample.
    pub fn current_coordinate(&self) -> (f64, f64) {
        self.coordinate
    }

    /// Current app authorization as reported by the source.
    pub fn authorization(&self) -> Authorization {
        self.source.authorization()
    }

    /// Whether lifecycle events are being acted on.
    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn subscriptions(&self) -> ActiveSubscriptions {
        self.subscriptions
    }

    /// Read-only view of the coordinator.
    pub fn snapshot(&self) -> TrackingSnapshot {
        TrackingSnapshot {
            state: self.state,
            best_fit: self.best_fit,
            last_sent: self.last_sent,
            heading: self.heading,
            background_window: self.budget.window(),
            subscriptions: self.subscriptions,
            upload_timer_active: self.upload_timer.is_some(),
            background_restart_pending: self.restart_timer.is_some(),
            holds_background_task: self.budget.holds_task(),
            lifecycle_registered: self.registered,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Position pipeline
    // ─────────────────────────────────────────────────────────────────────────

    fn feed_for(&self, handle: SubscriptionHandle) -> Option<PositionFeed> {
        let subs = &self.subscriptions;
        if subs.foreground == Some(handle) {
            Some(PositionFeed::Foreground)
        } else if subs.background == Some(handle) {
            Some(PositionFeed::Background)
        } else if subs.significant == Some(handle) {
            Some(PositionFeed::Significant)
        } else {
            None
        }
    }

    fn on_location(&mut self, handle: SubscriptionHandle, update: LocationUpdate) {
        let Some(feed) = self.feed_for(handle) else {
            trace!(%handle, "Delivery for cancelled subscription dropped");
            return;
        };

        if update.status.is_unavailable() {
            self.on_location_unavailable(feed, update.status);
            return;
        }

        let Some(position) = update.position else {
            trace!(%handle, "Delivery without a position");
            return;
        };

        let now = self.clock.now();
        if !position.is_valid_at(now, self.config.max_sample_age) {
            trace!(
                %handle,
                accuracy = position.horizontal_accuracy,
                age = ?position.age(now),
                "Sample rejected"
            );
            return;
        }

        self.accept(position, feed);

        if feed == PositionFeed::Background && !self.background_sample_seen {
            self.background_sample_seen = true;
            self.begin_new_background_task();
            self.send_location();
        }
    }

    fn on_location_unavailable(&mut self, feed: PositionFeed, status: LocationStatus) {
        match feed {
            PositionFeed::Foreground => {
                warn!(%status, "Location unavailable, upload timer halted");
                self.cancel_upload_timer();
            }
            PositionFeed::Background => {
                warn!(%status, "Location unavailable, background polling halted");
                self.stop_background_polling();
                self.begin_new_background_task();
            }
            PositionFeed::Significant => {
                warn!(%status, "Location unavailable, significant-change monitoring halted");
                self.stop_significant_monitoring();
            }
        }
    }

    fn accept(&mut self, position: Position, feed: PositionFeed) {
        self.best_fit = Some(position);
        self.coordinate = position.coordinate();

        debug!(
            ?feed,
            latitude = position.latitude,
            longitude = position.longitude,
            accuracy = position.horizontal_accuracy,
            "Position accepted"
        );

        for observer in &self.observers {
            observer.on_position(&position, self.heading);
        }
    }

    fn on_heading(&mut self, handle: SubscriptionHandle, update: HeadingUpdate) {
        if self.subscriptions.heading != Some(handle) {
            trace!(%handle, "Heading for cancelled subscription dropped");
            return;
        }

        match update.heading {
            Some(sample) if update.status == LocationStatus::Success && sample.is_valid() => {
                self.heading = sample.effective_heading();
                trace!(heading = self.heading, "Heading updated");
            }
            _ => debug!(status = %update.status, "Invalid heading sample discarded"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upload path
    // ─────────────────────────────────────────────────────────────────────────

    fn on_upload_tick(&mut self) {
        let now = self.clock.now();
        let due = match self.last_updated {
            Some(at) => now.saturating_duration_since(at) > self.config.upload_interval,
            None => true,
        };

        if due {
            debug!("Upload interval elapsed, forcing upload");
            self.resend();
        } else {
            trace!("Upload tick, recent upload on record");
        }
    }

    /// Run the upload path: skip if there is no best fit or it is within the
    /// distance filter of the last sent position, otherwise upload it.
    pub fn send_location(&mut self) {
        let Some(best_fit) = self.best_fit else {
            trace!("No position to upload");
            return;
        };

        if let Some(last) = self.last_sent {
            let distance = best_fit.distance_to(&last.position);
            if distance < self.config.distance_filter_m {
                debug!(
                    distance_m = distance,
                    filter_m = self.config.distance_filter_m,
                    "Within distance filter, upload skipped"
                );
                return;
            }

            for observer in &self.observers {
                observer.on_local_log_entry(&best_fit, distance);
            }
        }

        self.uploads.dispatch(UploadRequest {
            path: self.config.upload_path.clone(),
            body: LocationBody::from(&best_fit),
            retry_count: self.config.upload_retry_count,
            ticket: UploadTicket {
                attempted: best_fit,
                session: self.session,
            },
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Background mode
    // ─────────────────────────────────────────────────────────────────────────

    fn enter_background(&mut self) {
        if self.state == TrackingState::BackgroundTracking {
            debug!("Already tracking in background");
            return;
        }

        let authorization = self.source.authorization();
        if !authorization.allows_background() {
            info!(%authorization, "Background tracking not permitted");
            return;
        }

        self.cancel_upload_timer();
        if let Some(handle) = self.subscriptions.foreground.take() {
            self.source.cancel(handle);
        }

        self.budget.enter(self.clock.now());
        self.cancel_restart_timer();
        self.state = TrackingState::BackgroundTracking;

        self.start_background_polling();
        self.start_significant_monitoring();

        info!(
            budget_secs = self.config.background_budget.as_secs(),
            "Background tracking started"
        );
    }

    fn become_active(&mut self) {
        if self.state == TrackingState::BackgroundTracking {
            info!("Returned to foreground");
        }
        self.leave_background();
        self.start();
        self.check_location_services();
    }

    fn leave_background(&mut self) {
        self.stop_background_polling();
        self.cancel_restart_timer();
        self.budget.leave();
        self.stop_significant_monitoring();
    }

    fn start_background_polling(&mut self) {
        self.stop_background_polling();
        self.subscriptions.background = Some(self.source.subscribe_continuous(AccuracyTier::High));
        self.background_sample_seen = false;
    }

    fn stop_background_polling(&mut self) {
        if let Some(handle) = self.subscriptions.background.take() {
            self.source.cancel(handle);
        }
    }

    fn start_significant_monitoring(&mut self) {
        self.stop_significant_monitoring();
        self.subscriptions.significant = Some(self.source.subscribe_significant_changes());
    }

    fn stop_significant_monitoring(&mut self) {
        if let Some(handle) = self.subscriptions.significant.take() {
            self.source.cancel(handle);
        }
    }

    /// Rotate the execution token and either schedule a polling restart or,
    /// once over budget, stop background polling.
    fn begin_new_background_task(&mut self) {
        if self.state != TrackingState::BackgroundTracking {
            return;
        }

        let now = self.clock.now();
        self.budget.renew();
        self.cancel_restart_timer();

        let elapsed = self.budget.elapsed(now).unwrap_or_default();
        debug!(elapsed_secs = elapsed.as_secs(), "Time spent in background");

        if self.budget.is_exhausted(now) {
            warn!(
                elapsed_secs = elapsed.as_secs(),
                budget_secs = self.budget.budget().as_secs(),
                "Background budget exhausted, stopping background polling"
            );
            self.budget.release();
            self.stop_background_polling();
            return;
        }

        let generation = self.next_generation();
        self.restart_timer = Some(generation);
        self.scheduler.schedule(
            TimerKind::BackgroundRestart,
            generation,
            TimerSchedule::Once(self.config.background_restart_delay()),
        );
    }

    fn on_background_task_expired(&mut self, id: BackgroundTaskId) {
        if self.budget.mark_expired(id) {
            warn!(task = %id, "Background task expired by the system");
        } else {
            trace!(task = %id, "Expiry for a released background task ignored");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Timers
    // ─────────────────────────────────────────────────────────────────────────

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn start_upload_timer(&mut self) {
        self.cancel_upload_timer();
        let generation = self.next_generation();
        self.upload_timer = Some(generation);
        self.scheduler.schedule(
            TimerKind::Upload,
            generation,
            TimerSchedule::Repeating(self.config.upload_interval),
        );
    }

    fn cancel_upload_timer(&mut self) {
        if self.upload_timer.take().is_some() {
            self.scheduler.cancel(TimerKind::Upload);
        }
    }

    fn cancel_restart_timer(&mut self) {
        if self.restart_timer.take().is_some() {
            self.scheduler.cancel(TimerKind::BackgroundRestart);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::clock::SimulatedClock;
    use crate::tracking::position::HeadingSample;
    use crate::tracking::scheduler::SimulatedScheduler;
    use crate::upload::{UploadError, UploadOutcome};
    use std::sync::Mutex;
    use std::time::Duration;

    // ─────────────────────────────────────────────────────────────────────────
    // Test doubles
    // ─────────────────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct SourceLog {
        next_id: u64,
        continuous: Vec<SubscriptionHandle>,
        significant: Vec<SubscriptionHandle>,
        heading: Vec<SubscriptionHandle>,
        cancelled: Vec<SubscriptionHandle>,
        authorization: Authorization,
        services: ServicesState,
    }

    #[derive(Clone, Default)]
    struct FakeSource(Arc<Mutex<SourceLog>>);

    impl FakeSource {
        fn with_authorization(authorization: Authorization) -> Self {
            let source = Self::default();
            source.0.lock().unwrap().authorization = authorization;
            source
        }

        fn next(&self) -> SubscriptionHandle {
            let mut log = self.0.lock().unwrap();
            log.next_id += 1;
            SubscriptionHandle::new(log.next_id)
        }

        fn cancelled(&self) -> Vec<SubscriptionHandle> {
            self.0.lock().unwrap().cancelled.clone()
        }
    }

    impl LocationSource for FakeSource {
        fn subscribe_continuous(&mut self, _accuracy: AccuracyTier) -> SubscriptionHandle {
            let handle = self.next();
            self.0.lock().unwrap().continuous.push(handle);
            handle
        }

        fn subscribe_significant_changes(&mut self) -> SubscriptionHandle {
            let handle = self.next();
            self.0.lock().unwrap().significant.push(handle);
            handle
        }

        fn subscribe_heading(&mut self) -> SubscriptionHandle {
            let handle = self.next();
            self.0.lock().unwrap().heading.push(handle);
            handle
        }

        fn cancel(&mut self, handle: SubscriptionHandle) {
            self.0.lock().unwrap().cancelled.push(handle);
        }

        fn authorization(&self) -> Authorization {
            self.0.lock().unwrap().authorization
        }

        fn services_state(&self) -> ServicesState {
            self.0.lock().unwrap().services
        }
    }

    #[derive(Clone, Default)]
    struct RecordingUploads(Arc<Mutex<Vec<UploadRequest>>>);

    impl RecordingUploads {
        fn count(&self) -> usize {
            self.0.lock().unwrap().len()
        }

        fn last(&self) -> Option<UploadRequest> {
            self.0.lock().unwrap().last().cloned()
        }
    }

    impl UploadDispatcher for RecordingUploads {
        fn dispatch(&mut self, request: UploadRequest) {
            self.0.lock().unwrap().push(request);
        }
    }

    #[derive(Default)]
    struct TaskLedger {
        begun: Vec<BackgroundTaskId>,
        ended: Vec<BackgroundTaskId>,
    }

    #[derive(Clone, Default)]
    struct RecordingTasks(Arc<Mutex<TaskLedger>>);

    impl RecordingTasks {
        fn begun(&self) -> Vec<BackgroundTaskId> {
            self.0.lock().unwrap().begun.clone()
        }

        fn ended(&self) -> Vec<BackgroundTaskId> {
            self.0.lock().unwrap().ended.clone()
        }
    }

    impl BackgroundTasks for RecordingTasks {
        fn begin(&mut self) -> BackgroundTaskId {
            let mut ledger = self.0.lock().unwrap();
            let id = BackgroundTaskId(ledger.begun.len() as u64 + 1);
            ledger.begun.push(id);
            id
        }

        fn end(&mut self, id: BackgroundTaskId) {
            self.0.lock().unwrap().ended.push(id);
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        positions: Mutex<Vec<(Position, f64)>>,
        results: Mutex<Vec<(Position, UploadOutcome)>>,
        log_entries: Mutex<Vec<(Position, f64)>>,
        unavailable: Mutex<Vec<ServicesState>>,
    }

    impl TrackingObserver for RecordingObserver {
        fn on_position(&self, position: &Position, heading: f64) {
            self.positions.lock().unwrap().push((*position, heading));
        }

        fn on_upload_result(&self, position: &Position, outcome: &UploadOutcome) {
            self.results.lock().unwrap().push((*position, outcome.clone()));
        }

        fn on_local_log_entry(&self, position: &Position, distance_m: f64) {
            self.log_entries.lock().unwrap().push((*position, distance_m));
        }

        fn on_services_unavailable(&self, state: ServicesState) {
            self.unavailable.lock().unwrap().push(state);
        }
    }

    struct Harness {
        coord: TrackingCoordinator,
        clock: SimulatedClock,
        scheduler: SimulatedScheduler,
        source: FakeSource,
        uploads: RecordingUploads,
        tasks: RecordingTasks,
        observer: Arc<RecordingObserver>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_authorization(Authorization::Always)
        }

        fn with_authorization(authorization: Authorization) -> Self {
            let clock = SimulatedClock::new();
            let scheduler = SimulatedScheduler::new(clock.clone());
            let source = FakeSource::with_authorization(authorization);
            let uploads = RecordingUploads::default();
            let tasks = RecordingTasks::default();
            let observer = Arc::new(RecordingObserver::default());

            let coord = TrackingCoordinator::new(
                TrackingConfig::default(),
                Box::new(source.clone()),
                Box::new(scheduler.clone()),
                Box::new(uploads.clone()),
            )
            .with_clock(Arc::new(clock.clone()))
            .with_background_tasks(Box::new(tasks.clone()))
            .with_observer(observer.clone());

            Self {
                coord,
                clock,
                scheduler,
                source,
                uploads,
                tasks,
                observer,
            }
        }

        /// A fix with 5m accuracy measured one second ago.
        fn fix(&self, lat: f64, lon: f64) -> Position {
            Position::new(lat, lon, 5.0, self.clock.now() - Duration::from_secs(1))
        }

        fn deliver(&mut self, handle: SubscriptionHandle, position: Position) {
            self.coord.handle_platform_event(PlatformEvent::Location {
                handle,
                update: LocationUpdate::fix(position),
            });
        }

        fn deliver_status(&mut self, handle: SubscriptionHandle, status: LocationStatus) {
            self.coord.handle_platform_event(PlatformEvent::Location {
                handle,
                update: LocationUpdate::status(status),
            });
        }

        fn foreground(&self) -> SubscriptionHandle {
            self.coord.subscriptions().foreground.unwrap()
        }

        fn background(&self) -> SubscriptionHandle {
            self.coord.subscriptions().background.unwrap()
        }

        fn significant(&self) -> SubscriptionHandle {
            self.coord.subscriptions().significant.unwrap()
        }

        fn complete_last_upload(&mut self, outcome: UploadOutcome) {
            let request = self.uploads.last().unwrap();
            self.coord.handle_upload_completed(UploadCompleted {
                ticket: request.ticket,
                outcome,
            });
        }

        fn advance(&mut self, secs: u64) {
            let coord = &mut self.coord;
            self.scheduler
                .advance(Duration::from_secs(secs), |fired| coord.handle_timer(fired));
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Start / stop
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_new_coordinator_is_pristine() {
        let h = Harness::new();
        assert!(h.coord.snapshot().is_pristine());
        assert_eq!(h.coord.current_position(), None);
        assert_eq!(h.coord.current_coordinate(), (0.0, 0.0));
    }

    #[test]
    fn test_start_subscribes_and_schedules_upload_timer() {
        let mut h = Harness::new();
        h.coord.start();

        let snapshot = h.coord.snapshot();
        assert_eq!(snapshot.state, TrackingState::ForegroundTracking);
        assert!(snapshot.subscriptions.foreground.is_some());
        assert!(snapshot.subscriptions.heading.is_some());
        assert!(snapshot.lifecycle_registered);
        assert!(h.scheduler.is_scheduled(TimerKind::Upload));
        assert_eq!(
            h.scheduler.deadline(TimerKind::Upload),
            Some(h.clock.now() + Duration::from_secs(120))
        );
    }

    #[test]
    fn test_restart_replaces_foreground_but_keeps_heading() {
        let mut h = Harness::new();
        h.coord.start();
        let first_fg = h.foreground();
        let heading = h.coord.subscriptions().heading;

        h.coord.start();

        assert_ne!(h.foreground(), first_fg);
        assert_eq!(h.coord.subscriptions().heading, heading);
        assert_eq!(h.source.cancelled(), vec![first_fg]);
        assert_eq!(h.source.0.lock().unwrap().heading.len(), 1);
    }

    #[test]
    fn test_stop_restores_pristine_state() {
        let mut h = Harness::new();
        h.coord.start();
        let fg = h.foreground();
        h.deliver(fg, h.fix(10.0, 20.0));
        h.coord.resend();
        h.complete_last_upload(UploadOutcome::succeeded(None));
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);

        h.coord.stop();

        assert!(h.coord.snapshot().is_pristine());
        assert_eq!(h.scheduler.scheduled_count(), 0);
        assert_eq!(h.coord.current_coordinate(), (0.0, 0.0));
        assert_eq!(h.tasks.begun().len(), h.tasks.ended().len());
    }

    #[test]
    fn test_stop_twice_is_idempotent() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);

        h.coord.stop();
        let once = h.coord.snapshot();
        let cancelled_once = h.source.cancelled();
        let ended_once = h.tasks.ended();

        h.coord.stop();

        assert_eq!(h.coord.snapshot(), once);
        assert_eq!(h.source.cancelled(), cancelled_once);
        assert_eq!(h.tasks.ended(), ended_once);

        let mut unique = cancelled_once.clone();
        unique.sort_by_key(|handle| handle.id());
        unique.dedup();
        assert_eq!(unique.len(), cancelled_once.len(), "no handle cancelled twice");
    }

    #[test]
    fn test_stop_on_idle_coordinator_is_safe() {
        let mut h = Harness::new();
        h.coord.stop();
        assert!(h.coord.snapshot().is_pristine());
        assert!(h.source.cancelled().is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sample acceptance
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_valid_sample_accepted_with_default_heading() {
        let mut h = Harness::new();
        h.coord.start();
        let fix = h.fix(10.0, 20.0);

        h.deliver(h.foreground(), fix);

        assert_eq!(h.coord.best_fit(), Some(fix));
        assert_eq!(h.coord.current_coordinate(), (10.0, 20.0));
        assert_eq!(*h.observer.positions.lock().unwrap(), vec![(fix, 0.0)]);
    }

    #[test]
    fn test_invalid_samples_rejected() {
        let mut h = Harness::new();
        h.coord.start();
        let good = h.fix(10.0, 20.0);
        h.deliver(h.foreground(), good);

        let now = h.clock.now();
        let rejected = [
            Position::new(11.0, 21.0, 0.0, now),
            Position::new(11.0, 21.0, -3.0, now),
            Position::new(11.0, 21.0, 5.0, now - Duration::from_secs(5)),
            Position::new(11.0, 21.0, 5.0, now - Duration::from_secs(30)),
        ];
        for sample in rejected {
            h.deliver(h.foreground(), sample);
        }

        assert_eq!(h.coord.best_fit(), Some(good));
        assert_eq!(h.observer.positions.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_newest_valid_sample_overwrites() {
        let mut h = Harness::new();
        h.coord.start();
        let first = h.fix(10.0, 20.0);
        let second = Position::new(10.5, 20.5, 50.0, h.clock.now());

        h.deliver(h.foreground(), first);
        h.deliver(h.foreground(), second);

        assert_eq!(h.coord.best_fit(), Some(second));
    }

    #[test]
    fn test_delivery_on_cancelled_handle_dropped() {
        let mut h = Harness::new();
        h.coord.start();
        let old = h.foreground();
        h.coord.start();

        h.deliver(old, h.fix(10.0, 20.0));

        assert_eq!(h.coord.best_fit(), None);
    }

    #[test]
    fn test_heading_reported_with_positions() {
        let mut h = Harness::new();
        h.coord.start();
        let heading_handle = h.coord.subscriptions().heading.unwrap();

        h.coord.handle_platform_event(PlatformEvent::Heading {
            handle: heading_handle,
            update: HeadingUpdate::reading(HeadingSample::new(0.0, 87.0, 10.0)),
        });
        let fix = h.fix(10.0, 20.0);
        h.deliver(h.foreground(), fix);

        assert_eq!(h.coord.heading(), 87.0);
        assert_eq!(*h.observer.positions.lock().unwrap(), vec![(fix, 87.0)]);
    }

    #[test]
    fn test_invalid_heading_discarded() {
        let mut h = Harness::new();
        h.coord.start();
        let heading_handle = h.coord.subscriptions().heading.unwrap();

        h.coord.handle_platform_event(PlatformEvent::Heading {
            handle: heading_handle,
            update: HeadingUpdate::reading(HeadingSample::new(45.0, 40.0, 5.0)),
        });
        h.coord.handle_platform_event(PlatformEvent::Heading {
            handle: heading_handle,
            update: HeadingUpdate::reading(HeadingSample::new(90.0, 90.0, -1.0)),
        });
        h.coord.handle_platform_event(PlatformEvent::Heading {
            handle: heading_handle,
            update: HeadingUpdate {
                heading: None,
                status: LocationStatus::ServicesDisabled,
            },
        });

        assert_eq!(h.coord.heading(), 45.0);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upload path
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_no_upload_without_best_fit() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.send_location();
        h.coord.resend();
        h.advance(360);

        assert_eq!(h.uploads.count(), 0);
    }

    #[test]
    fn test_upload_skipped_within_distance_filter() {
        let mut h = Harness::new();
        h.coord.start();
        h.deliver(h.foreground(), h.fix(10.0, 20.0));
        h.coord.send_location();
        h.complete_last_upload(UploadOutcome::succeeded(None));

        // ~48m north
        h.deliver(h.foreground(), h.fix(10.00043, 20.0));
        h.coord.send_location();

        assert_eq!(h.uploads.count(), 1);
        assert!(h.observer.log_entries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_upload_issued_beyond_distance_filter() {
        let mut h = Harness::new();
        h.coord.start();
        h.deliver(h.foreground(), h.fix(10.0, 20.0));
        h.coord.send_location();
        h.complete_last_upload(UploadOutcome::succeeded(None));

        // ~156m north
        let moved = h.fix(10.0014, 20.0);
        h.deliver(h.foreground(), moved);
        h.coord.send_location();

        assert_eq!(h.uploads.count(), 2);
        let request = h.uploads.last().unwrap();
        assert_eq!(request.path, "location");
        assert_eq!(request.retry_count, 2);
        assert_eq!(request.body, LocationBody::new(10.0014, 20.0));

        let entries = h.observer.log_entries.lock().unwrap().clone();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, moved);
        assert!(entries[0].1 > 155.0 && entries[0].1 < 157.0);
        drop(entries);

        h.complete_last_upload(UploadOutcome::succeeded(Some(b"ok".to_vec())));
        assert_eq!(h.coord.last_sent().map(|r| r.position), Some(moved));
    }

    #[test]
    fn test_first_upload_emits_no_log_entry() {
        let mut h = Harness::new();
        h.coord.start();
        h.deliver(h.foreground(), h.fix(10.0, 20.0));
        h.coord.send_location();

        assert_eq!(h.uploads.count(), 1);
        assert!(h.observer.log_entries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_upload_still_records_attempt() {
        let mut h = Harness::new();
        h.coord.start();
        let fix = h.fix(10.0, 20.0);
        h.deliver(h.foreground(), fix);
        h.coord.send_location();

        let error = UploadError::Http {
            message: "offline".into(),
            timeout: false,
        };
        h.complete_last_upload(UploadOutcome::failed(error.clone()));

        let results = h.observer.results.lock().unwrap().clone();
        assert_eq!(results.len(), 1);
        assert!(!results[0].1.success);
        assert_eq!(results[0].1.payload, None);
        assert_eq!(results[0].1.error, Some(error));
        assert_eq!(h.coord.last_sent().map(|r| r.position), Some(fix));

        // Identical sample is now suppressed by the distance filter
        h.deliver(h.foreground(), h.fix(10.0, 20.0));
        h.coord.send_location();
        assert_eq!(h.uploads.count(), 1);
    }

    #[test]
    fn test_resend_bypasses_distance_filter() {
        let mut h = Harness::new();
        h.coord.start();
        h.deliver(h.foreground(), h.fix(10.0, 20.0));
        h.coord.send_location();
        h.complete_last_upload(UploadOutcome::succeeded(None));

        h.coord.resend();

        assert_eq!(h.uploads.count(), 2);
        assert_eq!(h.coord.last_sent(), None);
    }

    #[test]
    fn test_timer_forces_upload_when_interval_elapsed() {
        let mut h = Harness::new();
        h.coord.start();
        h.deliver(h.foreground(), h.fix(10.0, 20.0));
        h.coord.send_location();
        h.complete_last_upload(UploadOutcome::succeeded(None));

        // First tick at 120s: exactly one interval since the upload, not due
        h.advance(120);
        assert_eq!(h.uploads.count(), 1);

        // Second tick at 240s: forced, even though we have not moved
        h.deliver(h.foreground(), h.fix(10.0, 20.0));
        h.advance(120);
        assert_eq!(h.uploads.count(), 2);

        h.complete_last_upload(UploadOutcome::succeeded(None));
        let snapshot = h.coord.snapshot();
        assert_eq!(snapshot.last_sent.map(|r| r.sent_at), Some(h.clock.now()));
    }

    #[test]
    fn test_first_tick_uploads_when_nothing_sent() {
        let mut h = Harness::new();
        h.coord.start();
        h.deliver(h.foreground(), h.fix(10.0, 20.0));

        h.advance(120);

        assert_eq!(h.uploads.count(), 1);
    }

    #[test]
    fn test_upload_after_stop_is_ignored() {
        let mut h = Harness::new();
        h.coord.start();
        h.deliver(h.foreground(), h.fix(10.0, 20.0));
        h.coord.send_location();

        h.coord.stop();
        h.complete_last_upload(UploadOutcome::succeeded(None));

        assert!(h.coord.snapshot().is_pristine());
        assert!(h.observer.results.lock().unwrap().is_empty());
    }

    #[test]
    fn test_foreground_denial_halts_upload_timer_only() {
        let mut h = Harness::new();
        h.coord.start();
        let fg = h.foreground();

        h.deliver_status(fg, LocationStatus::PermissionDenied);

        assert!(!h.scheduler.is_scheduled(TimerKind::Upload));
        assert_eq!(h.coord.state(), TrackingState::ForegroundTracking);
        assert_eq!(h.coord.subscriptions().foreground, Some(fg));

        // Subscription still feeds best fit
        let fix = h.fix(10.0, 20.0);
        h.deliver(fg, fix);
        assert_eq!(h.coord.best_fit(), Some(fix));
    }

    #[test]
    fn test_stale_upload_timer_generation_ignored() {
        let mut h = Harness::new();
        h.coord.start();
        h.deliver(h.foreground(), h.fix(10.0, 20.0));

        h.coord.handle_timer(TimerFired {
            kind: TimerKind::Upload,
            generation: 999,
        });

        assert_eq!(h.uploads.count(), 0);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Background mode
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_background_requires_always_authorization() {
        for authorization in [
            Authorization::WhenInUse,
            Authorization::Denied,
            Authorization::NotDetermined,
            Authorization::Restricted,
        ] {
            let mut h = Harness::with_authorization(authorization);
            h.coord.start();
            let fg = h.foreground();

            h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);

            let snapshot = h.coord.snapshot();
            assert_eq!(snapshot.state, TrackingState::ForegroundTracking);
            assert_eq!(snapshot.subscriptions.background, None);
            assert_eq!(snapshot.subscriptions.significant, None);
            assert_eq!(snapshot.subscriptions.foreground, Some(fg));
            assert!(snapshot.upload_timer_active);
            assert!(h.tasks.begun().is_empty());
        }
    }

    #[test]
    fn test_lifecycle_ignored_before_start() {
        let mut h = Harness::new();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);
        h.coord.handle_lifecycle(LifecycleEvent::BecameActive);

        assert!(h.coord.snapshot().is_pristine());
    }

    #[test]
    fn test_enter_background_switches_subscriptions() {
        let mut h = Harness::new();
        h.coord.start();
        let fg = h.foreground();

        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);

        let snapshot = h.coord.snapshot();
        assert_eq!(snapshot.state, TrackingState::BackgroundTracking);
        assert_eq!(snapshot.subscriptions.foreground, None);
        assert!(snapshot.subscriptions.background.is_some());
        assert!(snapshot.subscriptions.significant.is_some());
        assert!(snapshot.subscriptions.heading.is_some());
        assert!(!snapshot.upload_timer_active);
        assert!(snapshot.holds_background_task);
        assert_eq!(
            snapshot.background_window.map(|w| w.entered_at),
            Some(h.clock.now())
        );
        assert!(h.source.cancelled().contains(&fg));
        assert!(!h.scheduler.is_scheduled(TimerKind::Upload));
    }

    #[test]
    fn test_duplicate_enter_background_ignored() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);
        let before = h.coord.snapshot();

        h.clock.advance(Duration::from_secs(10));
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);

        assert_eq!(h.coord.snapshot(), before);
        assert_eq!(h.tasks.begun().len(), 1);
    }

    #[test]
    fn test_first_background_sample_uploads_and_schedules_restart() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);
        let bg = h.background();

        h.deliver(bg, h.fix(10.0, 20.0));
        h.deliver(bg, h.fix(10.0, 20.0));

        assert_eq!(h.uploads.count(), 1);
        assert!(h.scheduler.is_scheduled(TimerKind::BackgroundRestart));
        // Entry token rotated on the first sample
        assert_eq!(h.tasks.begun().len(), 2);
        assert_eq!(h.tasks.ended(), vec![BackgroundTaskId(1)]);
    }

    #[test]
    fn test_restart_timer_resubscribes_background_polling() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);
        let first_bg = h.background();
        h.deliver(first_bg, h.fix(10.0, 20.0));

        h.advance(120);

        let second_bg = h.background();
        assert_ne!(second_bg, first_bg);
        assert!(h.source.cancelled().contains(&first_bg));
        assert!(!h.scheduler.is_scheduled(TimerKind::BackgroundRestart));
    }

    #[test]
    fn test_background_budget_exhaustion_stops_polling() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);
        h.deliver(h.background(), h.fix(10.0, 20.0));

        // Restart fires at 120s; the next sample arrives at 130s
        h.advance(120);
        let restarted = h.background();
        h.clock.advance(Duration::from_secs(10));
        h.deliver(restarted, h.fix(10.0, 20.0));

        let snapshot = h.coord.snapshot();
        assert_eq!(snapshot.subscriptions.background, None);
        assert!(!snapshot.holds_background_task);
        assert!(!snapshot.background_restart_pending);
        assert!(snapshot.subscriptions.significant.is_some());
        assert_eq!(snapshot.state, TrackingState::BackgroundTracking);
        assert!(h.source.cancelled().contains(&restarted));

        // Every acquired token released exactly once
        let begun = h.tasks.begun();
        let mut ended = h.tasks.ended();
        ended.sort_by_key(|id| id.0);
        assert_eq!(begun, ended);
    }

    #[test]
    fn test_budget_exhaustion_releases_once_across_later_events() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);
        h.deliver(h.background(), h.fix(10.0, 20.0));
        h.advance(120);
        h.clock.advance(Duration::from_secs(10));
        h.deliver(h.background(), h.fix(10.0, 20.0));
        let ended_after_exhaustion = h.tasks.ended();

        h.coord.handle_lifecycle(LifecycleEvent::BecameActive);
        h.coord.stop();

        assert_eq!(h.tasks.ended(), ended_after_exhaustion);
    }

    #[test]
    fn test_significant_changes_feed_best_fit_without_upload() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);
        let fix = h.fix(11.0, 21.0);

        h.deliver(h.significant(), fix);

        assert_eq!(h.coord.best_fit(), Some(fix));
        assert_eq!(h.uploads.count(), 0);
    }

    #[test]
    fn test_background_denial_stops_polling_and_schedules_restart() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);
        let bg = h.background();

        h.deliver_status(bg, LocationStatus::ServicesDisabled);

        assert_eq!(h.coord.subscriptions().background, None);
        assert!(h.source.cancelled().contains(&bg));
        assert!(h.scheduler.is_scheduled(TimerKind::BackgroundRestart));
    }

    #[test]
    fn test_significant_denial_cancels_monitoring() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);
        let sig = h.significant();

        h.deliver_status(sig, LocationStatus::PermissionDenied);

        assert_eq!(h.coord.subscriptions().significant, None);
        assert!(h.source.cancelled().contains(&sig));
        assert!(h.coord.subscriptions().background.is_some());
    }

    #[test]
    fn test_became_active_restores_foreground() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);
        let bg = h.background();
        let sig = h.significant();
        h.deliver(bg, h.fix(10.0, 20.0));

        h.coord.handle_lifecycle(LifecycleEvent::BecameActive);

        let snapshot = h.coord.snapshot();
        assert_eq!(snapshot.state, TrackingState::ForegroundTracking);
        assert_eq!(snapshot.background_window, None);
        assert_eq!(snapshot.subscriptions.background, None);
        assert_eq!(snapshot.subscriptions.significant, None);
        assert!(snapshot.subscriptions.foreground.is_some());
        assert!(snapshot.upload_timer_active);
        assert!(!snapshot.background_restart_pending);
        assert!(!snapshot.holds_background_task);
        assert!(h.source.cancelled().contains(&bg));
        assert!(h.source.cancelled().contains(&sig));
        assert!(!h.scheduler.is_scheduled(TimerKind::BackgroundRestart));
    }

    #[test]
    fn test_became_active_surfaces_disabled_services() {
        let mut h = Harness::new();
        h.coord.start();
        h.source.0.lock().unwrap().services = ServicesState::Disabled;

        h.coord.handle_lifecycle(LifecycleEvent::BecameActive);

        assert_eq!(
            *h.observer.unavailable.lock().unwrap(),
            vec![ServicesState::Disabled]
        );
    }

    #[test]
    fn test_check_location_services_quiet_when_available() {
        let mut h = Harness::new();
        h.coord.start();

        assert_eq!(h.coord.check_location_services(), ServicesState::Available);
        assert!(h.observer.unavailable.lock().unwrap().is_empty());
    }

    #[test]
    fn test_os_expiry_releases_held_token() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);

        h.coord
            .handle_platform_event(PlatformEvent::BackgroundTaskExpired(BackgroundTaskId(1)));
        h.coord
            .handle_platform_event(PlatformEvent::BackgroundTaskExpired(BackgroundTaskId(1)));

        assert!(!h.coord.snapshot().holds_background_task);
        assert_eq!(h.tasks.ended(), vec![BackgroundTaskId(1)]);
        assert_eq!(h.coord.state(), TrackingState::BackgroundTracking);
    }

    #[test]
    fn test_stale_restart_timer_after_foreground_ignored() {
        let mut h = Harness::new();
        h.coord.start();
        h.coord.handle_lifecycle(LifecycleEvent::EnteredBackground);
        h.deliver(h.background(), h.fix(10.0, 20.0));
        let pending = h.coord.restart_timer.unwrap();

        h.coord.handle_lifecycle(LifecycleEvent::BecameActive);
        h.coord.handle_timer(TimerFired {
            kind: TimerKind::BackgroundRestart,
            generation: pending,
        });

        assert_eq!(h.coord.subscriptions().background, None);
    }

    #[test]
    fn test_current_position_falls_back_to_last_sent() {
        let mut h = Harness::new();
        h.coord.start();
        let fix = h.fix(10.0, 20.0);
        h.deliver(h.foreground(), fix);
        h.coord.send_location();
        h.complete_last_upload(UploadOutcome::succeeded(None));

        h.coord.best_fit = None;

        assert_eq!(h.coord.current_position(), Some(fix));
    }
}
