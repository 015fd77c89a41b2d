//! Async runtime for the tracking coordinator.
//!
//! [`TrackingService`] assembles a [`TrackingCoordinator`] with the tokio
//! scheduler, the tokio clock and a spawned upload dispatcher, then runs it
//! on a single task. Everything that touches coordinator state arrives as a
//! message on that task:
//!
//! ```text
//!  TrackingHandle ──commands──┐
//!  LocationSource ──events────┤
//!  LifecycleBus ───lifecycle──┼──▶ runner task ──▶ TrackingCoordinator
//!  TokioScheduler ──timers────┤
//!  SpawnedUploads ──results───┘
//! ```
//!
//! The loop uses biased `tokio::select!` polling with cancellation first,
//! then caller commands, then platform and lifecycle deliveries, then timers
//! and upload completions. On exit the coordinator is stopped.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::budget::BackgroundTasks;
use super::clock::TokioClock;
use super::config::TrackingConfig;
use super::coordinator::TrackingCoordinator;
use super::dispatch::{SpawnedUploads, UploadCompleted};
use super::lifecycle::{LifecycleBus, LifecycleEvent};
use super::observer::TrackingObserver;
use super::scheduler::{TimerFired, TokioScheduler};
use super::source::{LocationSource, PlatformEvent};
use super::state::TrackingSnapshot;
use crate::upload::UploadClient;

/// Errors from the tracking runtime.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackingError {
    /// The runner task has exited.
    #[error("Tracking service has stopped")]
    ServiceStopped,

    /// `spawn` was called without a location source.
    #[error("No location source configured")]
    MissingSource,
}

/// Requests sent from a [`TrackingHandle`] to the runner.
#[derive(Debug)]
pub enum TrackingCommand {
    Start,
    Stop,
    Resend,
    CheckServices,
    Snapshot(oneshot::Sender<TrackingSnapshot>),
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable control surface for a running tracking service.
#[derive(Debug, Clone)]
pub struct TrackingHandle {
    tx: mpsc::UnboundedSender<TrackingCommand>,
    cancel: CancellationToken,
}

impl TrackingHandle {
    /// Begin foreground tracking.
    pub fn start(&self) -> Result<(), TrackingError> {
        self.send(TrackingCommand::Start)
    }

    /// Stop tracking and clear all state. The service keeps running.
    pub fn stop(&self) -> Result<(), TrackingError> {
        self.send(TrackingCommand::Stop)
    }

    /// Force an upload of the current best fit.
    pub fn resend(&self) -> Result<(), TrackingError> {
        self.send(TrackingCommand::Resend)
    }

    /// Ask the coordinator to re-check location services.
    pub fn check_location_services(&self) -> Result<(), TrackingError> {
        self.send(TrackingCommand::CheckServices)
    }

    /// Fetch a snapshot of the coordinator state.
    pub async fn snapshot(&self) -> Result<TrackingSnapshot, TrackingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(TrackingCommand::Snapshot(reply_tx))?;
        reply_rx.await.map_err(|_| TrackingError::ServiceStopped)
    }

    /// Shut the service down. Tracking is stopped before the task exits.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Returns true while the runner task is accepting commands.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, command: TrackingCommand) -> Result<(), TrackingError> {
        self.tx
            .send(command)
            .map_err(|_| TrackingError::ServiceStopped)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder that wires a coordinator to tokio and spawns its runner task.
pub struct TrackingService {
    config: TrackingConfig,
    source: Option<(Box<dyn LocationSource>, mpsc::UnboundedReceiver<PlatformEvent>)>,
    background_tasks: Option<Box<dyn BackgroundTasks>>,
    lifecycle: Option<broadcast::Receiver<LifecycleEvent>>,
    observers: Vec<Arc<dyn TrackingObserver>>,
    cancellation: Option<CancellationToken>,
}

impl TrackingService {
    pub fn builder(config: TrackingConfig) -> Self {
        Self {
            config,
            source: None,
            background_tasks: None,
            lifecycle: None,
            observers: Vec::new(),
            cancellation: None,
        }
    }

    /// Location source and the receiver its deliveries arrive on.
    pub fn source(
        mut self,
        source: Box<dyn LocationSource>,
        events: mpsc::UnboundedReceiver<PlatformEvent>,
    ) -> Self {
        self.source = Some((source, events));
        self
    }

    /// Background task host. Defaults to an in-process host.
    pub fn background_tasks(mut self, tasks: Box<dyn BackgroundTasks>) -> Self {
        self.background_tasks = Some(tasks);
        self
    }

    /// Lifecycle bus to listen on.
    pub fn lifecycle(mut self, bus: &LifecycleBus) -> Self {
        self.lifecycle = Some(bus.subscribe());
        self
    }

    pub fn observer(mut self, observer: Arc<dyn TrackingObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Parent cancellation token. A child token is used internally.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Spawn the runner task uploading through `client`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<C: UploadClient>(
        self,
        client: Arc<C>,
    ) -> Result<(TrackingHandle, JoinHandle<()>), TrackingError> {
        let (source, platform) = self.source.ok_or(TrackingError::MissingSource)?;

        let (scheduler, timers) = TokioScheduler::new();
        let (uploads, completions) = SpawnedUploads::new(client);

        let mut coordinator =
            TrackingCoordinator::new(self.config, source, Box::new(scheduler), Box::new(uploads))
                .with_clock(Arc::new(TokioClock));
        if let Some(tasks) = self.background_tasks {
            coordinator = coordinator.with_background_tasks(tasks);
        }
        for observer in self.observers {
            coordinator.add_observer(observer);
        }

        let cancel = match self.cancellation {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        let (tx, commands) = mpsc::unbounded_channel();

        let runner = TrackingRunner {
            coordinator,
            commands,
            platform,
            lifecycle: self.lifecycle,
            timers,
            completions,
        };

        let join = tokio::spawn(runner.run(cancel.clone()));
        Ok((TrackingHandle { tx, cancel }, join))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runner
// ─────────────────────────────────────────────────────────────────────────────

struct TrackingRunner {
    coordinator: TrackingCoordinator,
    commands: mpsc::UnboundedReceiver<TrackingCommand>,
    platform: mpsc::UnboundedReceiver<PlatformEvent>,
    lifecycle: Option<broadcast::Receiver<LifecycleEvent>>,
    timers: mpsc::UnboundedReceiver<TimerFired>,
    completions: mpsc::UnboundedReceiver<UploadCompleted>,
}

impl TrackingRunner {
    async fn run(self, cancel: CancellationToken) {
        let TrackingRunner {
            mut coordinator,
            mut commands,
            mut platform,
            mut lifecycle,
            mut timers,
            mut completions,
        } = self;

        tracing::info!("Tracking service started");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,

                command = commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("All tracking handles dropped");
                        break;
                    };
                    apply_command(&mut coordinator, command);
                }

                Some(event) = platform.recv() => {
                    coordinator.handle_platform_event(event);
                }

                event = next_lifecycle(&mut lifecycle) => match event {
                    Ok(event) => coordinator.handle_lifecycle(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Lifecycle events dropped");
                    }
                    Err(RecvError::Closed) => {
                        tracing::debug!("Lifecycle bus closed");
                        lifecycle = None;
                    }
                },

                Some(fired) = timers.recv() => {
                    coordinator.handle_timer(fired);
                }

                Some(completed) = completions.recv() => {
                    coordinator.handle_upload_completed(completed);
                }
            }
        }

        coordinator.stop();
        tracing::info!("Tracking service stopped");
    }
}

fn apply_command(coordinator: &mut TrackingCoordinator, command: TrackingCommand) {
    match command {
        TrackingCommand::Start => coordinator.start(),
        TrackingCommand::Stop => coordinator.stop(),
        TrackingCommand::Resend => coordinator.resend(),
        TrackingCommand::CheckServices => {
            coordinator.check_location_services();
        }
        TrackingCommand::Snapshot(reply) => {
            // Caller may have given up waiting
            let _ = reply.send(coordinator.snapshot());
        }
    }
}

async fn next_lifecycle(
    rx: &mut Option<broadcast::Receiver<LifecycleEvent>>,
) -> Result<LifecycleEvent, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
