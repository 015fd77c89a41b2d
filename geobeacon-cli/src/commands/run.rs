//! Run command - replay a recorded track through the tracking runtime.
//!
//! The track drives a [`ReplayLocationSource`]; lifecycle transitions can be
//! scripted with `--background-after` / `--foreground-after` to exercise the
//! background budget without a device.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use geobeacon::config::ConfigFile;
use geobeacon::replay::{load_track, ReplayLocationSource};
use geobeacon::tracking::{
    Authorization, BroadcastObserver, LifecycleBus, LifecycleEvent, TracingObserver,
    TrackingEvent, TrackingHandle, TrackingService, TrackingSnapshot,
};
use geobeacon::upload::{DryRunUploadClient, HttpUploadClient, UploadClient};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Time allowed for in-flight uploads to land after the track ends.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Authorization the replayed location service reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum AuthorizationArg {
    /// Tracking allowed in foreground and background
    #[default]
    Always,
    /// Tracking allowed only while the app is active
    WhenInUse,
    /// Location access denied
    Denied,
}

impl From<AuthorizationArg> for Authorization {
    fn from(arg: AuthorizationArg) -> Self {
        match arg {
            AuthorizationArg::Always => Authorization::Always,
            AuthorizationArg::WhenInUse => Authorization::WhenInUse,
            AuthorizationArg::Denied => Authorization::Denied,
        }
    }
}

/// Arguments for the run command.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub track: PathBuf,
    pub authorization: AuthorizationArg,
    pub background_after: Option<u64>,
    pub foreground_after: Option<u64>,
    pub debug: bool,
    pub dry_run: bool,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("run");

    let track = load_track(&args.track)?;

    println!("geobeacon v{}", geobeacon::VERSION);
    println!("{}", "=".repeat(40));
    println!("Track:         {} ({} points)", args.track.display(), track.len());
    println!("Authorization: {:?}", args.authorization);
    if args.dry_run {
        println!("Endpoint:      (dry run, nothing is uploaded)");
    } else {
        println!("Endpoint:      {}", runner.config().endpoint.base_url);
    }
    println!("Log file:      {}", runner.log_path().display());
    println!();
    println!("Press Ctrl+C to stop.");
    println!();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let snapshot = runtime.block_on(replay(runner.config(), track, &args))?;
    print_summary(&snapshot);

    Ok(())
}

async fn replay(
    config: &ConfigFile,
    track: Vec<geobeacon::replay::TrackPoint>,
    args: &RunArgs,
) -> Result<TrackingSnapshot, CliError> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (source, feed) = ReplayLocationSource::new(track, args.authorization.into(), events_tx);

    let bus = LifecycleBus::default();
    let events = BroadcastObserver::default();
    let printer = tokio::spawn(print_events(events.subscribe()));
    let cancel = CancellationToken::new();

    let service = TrackingService::builder(config.tracking_config())
        .source(Box::new(source), events_rx)
        .lifecycle(&bus)
        .observer(Arc::new(TracingObserver))
        .observer(Arc::new(events))
        .cancellation(cancel.clone());

    let (handle, join) = if args.dry_run {
        spawn_with(service, DryRunUploadClient::new())?
    } else {
        spawn_with(service, HttpUploadClient::new(config.upload_config())?)?
    };

    handle.check_location_services()?;
    handle.start()?;

    let script = tokio::spawn(script_lifecycle(
        bus.clone(),
        args.background_after,
        args.foreground_after,
        cancel.child_token(),
    ));

    tokio::select! {
        emitted = feed.run(cancel.child_token()) => {
            info!(emitted, "Track finished");
            tokio::time::sleep(SETTLE_DELAY).await;
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for Ctrl+C");
            }
            println!();
            println!("Interrupted, stopping...");
        }
    }

    let snapshot = handle.snapshot().await?;
    handle.stop()?;
    handle.shutdown();
    cancel.cancel();

    if let Err(e) = join.await {
        warn!(error = %e, "Tracking task ended abnormally");
    }
    script.abort();
    printer.abort();

    Ok(snapshot)
}

fn spawn_with<C: UploadClient>(
    service: TrackingService,
    client: C,
) -> Result<(TrackingHandle, tokio::task::JoinHandle<()>), CliError> {
    Ok(service.spawn(Arc::new(client))?)
}

/// Publish the scripted lifecycle transitions, timed from the start of the
/// replay.
async fn script_lifecycle(
    bus: LifecycleBus,
    background_after: Option<u64>,
    foreground_after: Option<u64>,
    cancel: CancellationToken,
) {
    let start = tokio::time::Instant::now();
    let mut script: Vec<(Duration, LifecycleEvent)> = Vec::new();
    if let Some(secs) = background_after {
        script.push((Duration::from_secs(secs), LifecycleEvent::EnteredBackground));
    }
    if let Some(secs) = foreground_after {
        script.push((Duration::from_secs(secs), LifecycleEvent::BecameActive));
    }
    script.sort_by_key(|(at, _)| *at);

    for (at, event) in script {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep_until(start + at) => {}
        }
        println!("  ~ {}", event);
        bus.publish(event);
    }
}

async fn print_events(mut events: broadcast::Receiver<TrackingEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => println!("{}", format_event(&event)),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                println!("  ({} events skipped)", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn format_event(event: &TrackingEvent) -> String {
    match event {
        TrackingEvent::Position { position, heading } => format!(
            "  * {:.5}, {:.5} (+/-{:.0}m, heading {:.0})",
            position.latitude, position.longitude, position.horizontal_accuracy, heading
        ),
        TrackingEvent::UploadResult { position, outcome } => {
            if outcome.success {
                format!(
                    "  ^ uploaded {:.5}, {:.5}",
                    position.latitude, position.longitude
                )
            } else {
                let reason = outcome
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                format!(
                    "  x upload of {:.5}, {:.5} failed: {}",
                    position.latitude, position.longitude, reason
                )
            }
        }
        TrackingEvent::LocalLogEntry {
            position,
            distance_m,
        } => format!(
            "  - {:.5}, {:.5} moved {:.1}m",
            position.latitude, position.longitude, distance_m
        ),
        TrackingEvent::ServicesUnavailable(state) => {
            format!("  ! location services need attention: {}", state)
        }
    }
}

fn print_summary(snapshot: &TrackingSnapshot) {
    println!();
    println!("Session Summary");
    println!("===============");
    println!("State:          {}", snapshot.state);
    match &snapshot.last_sent {
        Some(record) => println!(
            "Last sent:      {:.5}, {:.5}",
            record.position.latitude, record.position.longitude
        ),
        None => println!("Last sent:      (nothing uploaded)"),
    }
    match &snapshot.best_fit {
        Some(position) => println!(
            "Best fit:       {:.5}, {:.5} (+/-{:.0}m)",
            position.latitude, position.longitude, position.horizontal_accuracy
        ),
        None => println!("Best fit:       (none)"),
    }
    println!("Heading:        {:.0}", snapshot.heading);
    println!("Subscriptions:  {}", snapshot.subscriptions.count());
}
