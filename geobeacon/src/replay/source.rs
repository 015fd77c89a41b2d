//! Location source that replays a recorded track.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::track::TrackPoint;
use crate::geo::distance_m;
use crate::tracking::{
    AccuracyTier, Authorization, Clock, HeadingSample, HeadingUpdate, LocationSource,
    LocationStatus, LocationUpdate, PlatformEvent, Position, ServicesState, SubscriptionHandle,
    TokioClock,
};

/// Movement needed before a significant-change subscriber hears again.
pub const SIGNIFICANT_CHANGE_DISTANCE_M: f64 = 500.0;

/// Heading accuracy reported for recorded headings (degrees).
const RECORDED_HEADING_ACCURACY: f64 = 5.0;

#[derive(Debug, Default)]
struct Subscribers {
    next_id: u64,
    continuous: Vec<SubscriptionHandle>,
    significant: Vec<(SubscriptionHandle, Option<(f64, f64)>)>,
    heading: Vec<SubscriptionHandle>,
    /// Handles already told about denied or disabled services.
    notified: HashSet<SubscriptionHandle>,
    authorization: Authorization,
    services: ServicesState,
}

impl Subscribers {
    fn next_handle(&mut self) -> SubscriptionHandle {
        self.next_id += 1;
        SubscriptionHandle::new(self.next_id)
    }

    fn unavailable_status(&self) -> Option<LocationStatus> {
        if self.services == ServicesState::Disabled {
            Some(LocationStatus::ServicesDisabled)
        } else if matches!(
            self.authorization,
            Authorization::Denied | Authorization::Restricted
        ) {
            Some(LocationStatus::PermissionDenied)
        } else {
            None
        }
    }
}

/// [`LocationSource`] backed by a recorded track.
///
/// Subscriptions are bookkeeping only; samples are pushed by the paired
/// [`ReplayFeed`].
#[derive(Debug, Clone)]
pub struct ReplayLocationSource {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl ReplayLocationSource {
    /// Create a source and the feed that drives it.
    pub fn new(
        track: Vec<TrackPoint>,
        authorization: Authorization,
        events: mpsc::UnboundedSender<PlatformEvent>,
    ) -> (Self, ReplayFeed) {
        let subscribers = Arc::new(Mutex::new(Subscribers {
            authorization,
            ..Default::default()
        }));

        let source = Self {
            subscribers: Arc::clone(&subscribers),
        };
        let feed = ReplayFeed {
            subscribers,
            track,
            events,
            clock: Arc::new(TokioClock),
        };
        (source, feed)
    }

    /// Change the reported authorization.
    pub fn set_authorization(&self, authorization: Authorization) {
        self.subscribers.lock().unwrap().authorization = authorization;
    }

    /// Change the reported services state.
    pub fn set_services_state(&self, services: ServicesState) {
        self.subscribers.lock().unwrap().services = services;
    }

    /// Number of live subscriptions of any kind.
    pub fn live_subscriptions(&self) -> usize {
        let subs = self.subscribers.lock().unwrap();
        subs.continuous.len() + subs.significant.len() + subs.heading.len()
    }
}

impl LocationSource for ReplayLocationSource {
    fn subscribe_continuous(&mut self, accuracy: AccuracyTier) -> SubscriptionHandle {
        let mut subs = self.subscribers.lock().unwrap();
        let handle = subs.next_handle();
        subs.continuous.push(handle);
        tracing::debug!(%handle, ?accuracy, "Replay: continuous subscription");
        handle
    }

    fn subscribe_significant_changes(&mut self) -> SubscriptionHandle {
        let mut subs = self.subscribers.lock().unwrap();
        let handle = subs.next_handle();
        subs.significant.push((handle, None));
        tracing::debug!(%handle, "Replay: significant-change subscription");
        handle
    }

    fn subscribe_heading(&mut self) -> SubscriptionHandle {
        let mut subs = self.subscribers.lock().unwrap();
        let handle = subs.next_handle();
        subs.heading.push(handle);
        tracing::debug!(%handle, "Replay: heading subscription");
        handle
    }

    fn cancel(&mut self, handle: SubscriptionHandle) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.continuous.retain(|h| *h != handle);
        subs.significant.retain(|(h, _)| *h != handle);
        subs.heading.retain(|h| *h != handle);
        subs.notified.remove(&handle);
    }

    fn authorization(&self) -> Authorization {
        self.subscribers.lock().unwrap().authorization
    }

    fn services_state(&self) -> ServicesState {
        self.subscribers.lock().unwrap().services
    }
}

/// Pushes a recorded track to the subscribers of a [`ReplayLocationSource`].
pub struct ReplayFeed {
    subscribers: Arc<Mutex<Subscribers>>,
    track: Vec<TrackPoint>,
    events: mpsc::UnboundedSender<PlatformEvent>,
    clock: Arc<dyn Clock>,
}

impl ReplayFeed {
    /// Replace the clock used to stamp samples.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of points in the track.
    pub fn len(&self) -> usize {
        self.track.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track.is_empty()
    }

    /// Offset of the last point.
    pub fn duration(&self) -> std::time::Duration {
        self.track.last().map(|p| p.offset).unwrap_or_default()
    }

    /// Replay the track in real (tokio) time.
    ///
    /// Returns the number of points emitted, which is less than the track
    /// length if cancelled.
    pub async fn run(self, cancel: CancellationToken) -> usize {
        let start = tokio::time::Instant::now();
        let mut emitted = 0;

        for point in &self.track {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(start + point.offset) => {}
            }

            if !self.emit(point) {
                tracing::debug!("Replay: event receiver closed");
                break;
            }
            emitted += 1;
        }

        tracing::info!(emitted, total = self.track.len(), "Replay finished");
        emitted
    }

    /// Deliver one point to every live subscriber.
    ///
    /// Returns false if the event receiver has gone away.
    pub fn emit(&self, point: &TrackPoint) -> bool {
        let now = self.clock.now();
        let mut events = Vec::new();

        {
            let mut subs = self.subscribers.lock().unwrap();

            if let Some(status) = subs.unavailable_status() {
                let position_handles: Vec<SubscriptionHandle> = subs
                    .continuous
                    .iter()
                    .copied()
                    .chain(subs.significant.iter().map(|(h, _)| *h))
                    .collect();
                for handle in position_handles {
                    if subs.notified.insert(handle) {
                        events.push(PlatformEvent::Location {
                            handle,
                            update: LocationUpdate::status(status),
                        });
                    }
                }
            } else {
                let position = Position::new(point.latitude, point.longitude, point.accuracy, now);
                let coordinate = position.coordinate();

                for handle in &subs.continuous {
                    events.push(PlatformEvent::Location {
                        handle: *handle,
                        update: LocationUpdate::fix(position)
                            .with_achieved_accuracy(AccuracyTier::High),
                    });
                }

                for (handle, last) in subs.significant.iter_mut() {
                    let moved = match last {
                        Some(prev) => distance_m(*prev, coordinate) >= SIGNIFICANT_CHANGE_DISTANCE_M,
                        None => true,
                    };
                    if moved {
                        *last = Some(coordinate);
                        events.push(PlatformEvent::Location {
                            handle: *handle,
                            update: LocationUpdate::fix(position)
                                .with_achieved_accuracy(AccuracyTier::Low),
                        });
                    }
                }

                if let Some(heading) = point.heading {
                    let sample = HeadingSample::new(heading, heading, RECORDED_HEADING_ACCURACY);
                    for handle in &subs.heading {
                        events.push(PlatformEvent::Heading {
                            handle: *handle,
                            update: HeadingUpdate::reading(sample),
                        });
                    }
                }
            }
        }

        tracing::trace!(
            latitude = point.latitude,
            longitude = point.longitude,
            deliveries = events.len(),
            "Replay: point emitted"
        );

        events.into_iter().all(|event| self.events.send(event).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::SimulatedClock;
    use std::time::Duration;

    fn point(offset: u64, lat: f64, lon: f64, heading: Option<f64>) -> TrackPoint {
        TrackPoint {
            offset: Duration::from_secs(offset),
            latitude: lat,
            longitude: lon,
            accuracy: 5.0,
            heading,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PlatformEvent>) -> Vec<PlatformEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn test_emit_reaches_continuous_subscribers_only_while_live() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut source, feed) = ReplayLocationSource::new(vec![], Authorization::Always, tx);
        let feed = feed.with_clock(Arc::new(SimulatedClock::new()));

        let handle = source.subscribe_continuous(AccuracyTier::High);
        assert!(feed.emit(&point(0, 10.0, 20.0, None)));
        source.cancel(handle);
        assert!(feed.emit(&point(1, 10.0, 20.0, None)));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            PlatformEvent::Location { handle: h, update } => {
                assert_eq!(*h, handle);
                assert_eq!(update.status, LocationStatus::Success);
                assert_eq!(update.position.map(|p| p.coordinate()), Some((10.0, 20.0)));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_significant_changes_need_distance() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut source, feed) = ReplayLocationSource::new(vec![], Authorization::Always, tx);
        source.subscribe_significant_changes();

        feed.emit(&point(0, 10.0, 20.0, None));
        // ~156m
        feed.emit(&point(1, 10.0014, 20.0, None));
        // ~1.1km from the first
        feed.emit(&point(2, 10.01, 20.0, None));

        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn test_heading_column_feeds_heading_subscribers() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut source, feed) = ReplayLocationSource::new(vec![], Authorization::Always, tx);
        let heading = source.subscribe_heading();

        feed.emit(&point(0, 10.0, 20.0, Some(90.0)));
        feed.emit(&point(1, 10.0, 20.0, None));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            PlatformEvent::Heading { handle, .. } if handle == heading
        ));
    }

    #[test]
    fn test_denied_authorization_reports_status_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut source, feed) = ReplayLocationSource::new(vec![], Authorization::Denied, tx);
        source.subscribe_continuous(AccuracyTier::High);

        feed.emit(&point(0, 10.0, 20.0, None));
        feed.emit(&point(1, 10.0, 20.0, None));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            PlatformEvent::Location { update, .. }
                if update.status == LocationStatus::PermissionDenied
        ));
    }

    #[test]
    fn test_disabled_services_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (mut source, feed) = ReplayLocationSource::new(vec![], Authorization::Always, tx);
        source.set_services_state(ServicesState::Disabled);
        source.subscribe_continuous(AccuracyTier::High);

        feed.emit(&point(0, 10.0, 20.0, None));

        let events = drain(&mut rx);
        assert!(matches!(
            &events[0],
            PlatformEvent::Location { update, .. }
                if update.status == LocationStatus::ServicesDisabled
        ));
        assert_eq!(source.services_state(), ServicesState::Disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_paces_points_by_offset() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let track = vec![point(0, 10.0, 20.0, None), point(60, 10.01, 20.0, None)];
        let (mut source, feed) = ReplayLocationSource::new(track, Authorization::Always, tx);
        source.subscribe_continuous(AccuracyTier::High);

        let start = tokio::time::Instant::now();
        let emitted = feed.run(CancellationToken::new()).await;

        assert_eq!(emitted, 2);
        assert!(start.elapsed() >= Duration::from_secs(60));
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_cancel() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let track = vec![point(0, 10.0, 20.0, None), point(600, 10.01, 20.0, None)];
        let (_source, feed) = ReplayLocationSource::new(track, Authorization::Always, tx);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(feed.run(cancel.clone()));
        tokio::time::sleep(Duration::from_secs(10)).await;
        cancel.cancel();

        assert_eq!(task.await.unwrap(), 1);
    }
}
