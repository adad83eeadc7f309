//! Fan-in of position sources through the shared throttle gate
//!
//! Each source gets one consumer task. A fix is normalized, offered to the
//! gate with its capture time, and if accepted handed to a worker task that
//! resolves the address and writes the record. Consumers never wait on
//! geocoding or the store.

use geotrack_api::{PositionSample, SourceId};
use geotrack_host_api::{HostResult, PositionSource, RawFix};
use geotrack_util::{MemberId, RecordId, ThrottleGate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::{CoreEvent, GeocodeResolver, RecordWriter};

/// Note attached to the record written when a session starts
pub const SESSION_START_NOTE: &str = "session start";

/// Scope of one recording session
struct ActiveScope {
    member_id: MemberId,
    cancel: CancellationToken,
    consumers: TaskTracker,
}

/// Everything a consumer needs to process fixes for one session
#[derive(Clone)]
struct SampleContext {
    member_id: MemberId,
    interval_ms: i64,
    gate: Arc<ThrottleGate>,
    resolver: GeocodeResolver,
    writer: RecordWriter,
    events: broadcast::Sender<CoreEvent>,
    cancel: CancellationToken,
    workers: TaskTracker,
}

pub struct LocationAggregator {
    sources: Vec<Arc<dyn PositionSource>>,
    gate: Arc<ThrottleGate>,
    resolver: GeocodeResolver,
    writer: RecordWriter,
    events: broadcast::Sender<CoreEvent>,
    workers: TaskTracker,
    active: Option<ActiveScope>,
}

impl LocationAggregator {
    pub fn new(
        sources: Vec<Arc<dyn PositionSource>>,
        resolver: GeocodeResolver,
        writer: RecordWriter,
        events: broadcast::Sender<CoreEvent>,
    ) -> Self {
        Self {
            sources,
            gate: Arc::new(ThrottleGate::new()),
            resolver,
            writer,
            events,
            workers: TaskTracker::new(),
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Capture time of the last sample let through the gate
    pub fn last_accepted(&self) -> Option<i64> {
        self.gate.last_accepted()
    }

    /// Reopen the gate so the next sample is accepted
    pub fn reset_gate(&self) {
        self.gate.reset();
    }

    /// Subscribe every source and spawn its consumer.
    ///
    /// If any subscribe fails, everything subscribed so far is torn down.
    pub fn start(&mut self, member_id: &MemberId, interval_ms: i64) -> HostResult<()> {
        if self.active.is_some() {
            self.stop();
        }

        let cancel = CancellationToken::new();
        let consumers = TaskTracker::new();
        self.workers.reopen();

        let ctx = SampleContext {
            member_id: member_id.clone(),
            interval_ms,
            gate: self.gate.clone(),
            resolver: self.resolver.clone(),
            writer: self.writer.clone(),
            events: self.events.clone(),
            cancel: cancel.clone(),
            workers: self.workers.clone(),
        };
        let min_interval = Duration::from_millis(interval_ms.max(0) as u64);

        for source in &self.sources {
            let source_id = source.source_id();
            let rx = match source.subscribe(min_interval) {
                Ok(rx) => rx,
                Err(e) => {
                    warn!(source = %source_id, error = %e, "Source subscribe failed");
                    cancel.cancel();
                    consumers.close();
                    self.unsubscribe_all();
                    return Err(e);
                }
            };
            consumers.spawn(consume(source_id, rx, ctx.clone()));
            debug!(source = %source_id, interval_ms, "Source subscribed");
        }
        consumers.close();

        self.active = Some(ActiveScope {
            member_id: member_id.clone(),
            cancel,
            consumers,
        });

        info!(
            member_id = %member_id,
            interval_ms,
            sources = self.sources.len(),
            "Aggregator started"
        );
        Ok(())
    }

    /// Write the freshest last-known position as the session-start record.
    ///
    /// Bypasses the gate. Returns `None` when no source has a position or the
    /// write fails.
    pub async fn record_initial(&self, member_id: &MemberId) -> Option<RecordId> {
        let now = geotrack_util::now_ms();
        let mut candidates = Vec::new();

        for source in &self.sources {
            match source.last_known().await {
                Ok(Some(fix)) => {
                    if let Some(sample) = normalize(source.source_id(), fix, now) {
                        candidates.push(sample);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(source = %source.source_id(), error = %e, "Last known lookup failed");
                }
            }
        }

        let Some(sample) = pick_best(candidates) else {
            debug!(member_id = %member_id, "No last known position for session start");
            return None;
        };

        let address = self
            .resolver
            .resolve(sample.latitude, sample.longitude)
            .await;
        match self
            .writer
            .write(&sample, member_id, address, Some(SESSION_START_NOTE.to_string()))
            .await
        {
            Ok(record_id) => {
                let _ = self.events.send(CoreEvent::RecordWritten {
                    record_id,
                    member_id: member_id.clone(),
                    timestamp_ms: sample.captured_at_ms,
                    source: None,
                });
                Some(record_id)
            }
            Err(e) => {
                warn!(member_id = %member_id, error = %e, "Failed to write session start record");
                None
            }
        }
    }

    /// Cancel the session scope and unsubscribe every source.
    ///
    /// Safe to call at any time. Work still waiting on the geocoder is
    /// dropped; inserts already running finish.
    pub fn stop(&mut self) {
        if let Some(scope) = self.active.take() {
            scope.cancel.cancel();
            scope.consumers.close();
            info!(member_id = %scope.member_id, "Aggregator stopped");
        }
        self.unsubscribe_all();
        self.workers.close();
    }

    /// Wait until every spawned worker has finished.
    ///
    /// Fixes still queued in a source channel when this is called are
    /// picked up only if their consumer runs before the workers drain.
    pub async fn wait_idle(&self) {
        tokio::task::yield_now().await;
        self.workers.close();
        self.workers.wait().await;
        if self.active.is_some() {
            self.workers.reopen();
        }
    }

    fn unsubscribe_all(&self) {
        for source in &self.sources {
            source.unsubscribe();
        }
    }
}

async fn consume(source_id: SourceId, mut rx: mpsc::UnboundedReceiver<RawFix>, ctx: SampleContext) {
    loop {
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => break,
            fix = rx.recv() => match fix {
                Some(fix) => ctx.on_fix(source_id, fix),
                None => {
                    debug!(source = %source_id, "Source channel closed");
                    break;
                }
            },
        }
    }
}

impl SampleContext {
    fn on_fix(&self, source_id: SourceId, fix: RawFix) {
        let Some(sample) = normalize(source_id, fix, geotrack_util::now_ms()) else {
            return;
        };

        if !self.gate.try_accept(sample.captured_at_ms, self.interval_ms) {
            debug!(
                source = %source_id,
                captured_at_ms = sample.captured_at_ms,
                "Sample rejected by gate"
            );
            return;
        }

        debug!(source = %source_id, captured_at_ms = sample.captured_at_ms, "Sample accepted");
        let ctx = self.clone();
        self.workers.spawn(async move { ctx.persist(sample).await });
    }

    async fn persist(self, sample: PositionSample) {
        let address = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(
                    captured_at_ms = sample.captured_at_ms,
                    "Session stopped; dropping queued sample"
                );
                return;
            }
            address = self.resolver.resolve(sample.latitude, sample.longitude) => address,
        };

        match self.writer.write(&sample, &self.member_id, address, None).await {
            Ok(record_id) => {
                let _ = self.events.send(CoreEvent::RecordWritten {
                    record_id,
                    member_id: self.member_id.clone(),
                    timestamp_ms: sample.captured_at_ms,
                    source: Some(sample.source),
                });
            }
            Err(e) => {
                warn!(
                    member_id = %self.member_id,
                    error = %e,
                    "Dropping sample after failed write"
                );
            }
        }
    }
}

/// Validate a raw fix. Out-of-range coordinates are dropped; unusable
/// optional fields are cleared; a missing capture time becomes `now_ms`.
pub fn normalize(source: SourceId, fix: RawFix, now_ms: i64) -> Option<PositionSample> {
    let lat_ok = fix.latitude.is_finite() && (-90.0..=90.0).contains(&fix.latitude);
    let lon_ok = fix.longitude.is_finite() && (-180.0..=180.0).contains(&fix.longitude);
    if !lat_ok || !lon_ok {
        warn!(
            source = %source,
            latitude = fix.latitude,
            longitude = fix.longitude,
            "Discarding fix with invalid coordinates"
        );
        return None;
    }

    Some(PositionSample {
        latitude: fix.latitude,
        longitude: fix.longitude,
        altitude: fix.altitude.filter(|a| a.is_finite()),
        accuracy: fix.accuracy.filter(|a| a.is_finite() && *a >= 0.0),
        source,
        captured_at_ms: if fix.time_ms > 0 { fix.time_ms } else { now_ms },
    })
}

/// Most recent capture wins; ties go to the primary source
pub fn pick_best(candidates: Vec<PositionSample>) -> Option<PositionSample> {
    candidates
        .into_iter()
        .max_by_key(|s| (s.captured_at_ms, matches!(s.source, SourceId::Primary)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack_host_api::MockSource;
    use geotrack_store::{LocationStore, SqliteStore};

    struct Harness {
        primary: Arc<MockSource>,
        secondary: Arc<MockSource>,
        store: Arc<SqliteStore>,
        aggregator: LocationAggregator,
        events: broadcast::Receiver<CoreEvent>,
    }

    fn harness() -> Harness {
        let primary = Arc::new(MockSource::new(SourceId::Primary));
        let secondary = Arc::new(MockSource::new(SourceId::Secondary));
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let (tx, rx) = broadcast::channel(64);
        let aggregator = LocationAggregator::new(
            vec![primary.clone(), secondary.clone()],
            GeocodeResolver::disabled(),
            RecordWriter::new(store.clone()),
            tx,
        );
        Harness {
            primary,
            secondary,
            store,
            aggregator,
            events: rx,
        }
    }

    fn sample(source: SourceId, captured_at_ms: i64) -> PositionSample {
        PositionSample {
            latitude: 1.0,
            longitude: 2.0,
            altitude: None,
            accuracy: None,
            source,
            captured_at_ms,
        }
    }

    #[test]
    fn normalize_rejects_bad_coordinates() {
        assert!(normalize(SourceId::Primary, RawFix::new(91.0, 0.0, 1), 5).is_none());
        assert!(normalize(SourceId::Primary, RawFix::new(0.0, f64::NAN, 1), 5).is_none());
        assert!(normalize(SourceId::Primary, RawFix::new(-90.0, 180.0, 1), 5).is_some());
    }

    #[test]
    fn normalize_cleans_fields() {
        let fix = RawFix::new(1.0, 2.0, 0)
            .with_accuracy(-1.0)
            .with_altitude(f64::INFINITY);
        let sample = normalize(SourceId::Secondary, fix, 777).unwrap();
        assert_eq!(sample.captured_at_ms, 777);
        assert!(sample.accuracy.is_none());
        assert!(sample.altitude.is_none());
    }

    #[test]
    fn pick_best_prefers_recent_then_primary() {
        let best = pick_best(vec![
            sample(SourceId::Primary, 100),
            sample(SourceId::Secondary, 200),
        ])
        .unwrap();
        assert_eq!(best.source, SourceId::Secondary);

        let tie = pick_best(vec![
            sample(SourceId::Secondary, 200),
            sample(SourceId::Primary, 200),
        ])
        .unwrap();
        assert_eq!(tie.source, SourceId::Primary);

        assert!(pick_best(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn gate_is_shared_across_sources() {
        let mut h = harness();
        let member = MemberId::new("m1");
        h.aggregator.start(&member, 60_000).unwrap();

        assert!(h.primary.emit(RawFix::new(1.0, 2.0, 5_000)));
        tokio::task::yield_now().await;
        assert!(h.secondary.emit(RawFix::new(1.5, 2.5, 5_100)));
        tokio::task::yield_now().await;
        assert!(h.primary.emit(RawFix::new(1.6, 2.6, 65_200)));
        h.aggregator.wait_idle().await;

        let times: Vec<i64> = h
            .store
            .query_by_range(&member, 0, i64::MAX)
            .unwrap()
            .iter()
            .map(|r| r.timestamp_ms)
            .collect();
        assert_eq!(times, vec![5_000, 65_200]);
        assert_eq!(h.aggregator.last_accepted(), Some(65_200));

        let mut written = 0;
        while let Ok(event) = h.events.try_recv() {
            if matches!(event, CoreEvent::RecordWritten { source: Some(_), .. }) {
                written += 1;
            }
        }
        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn initial_record_picks_freshest() {
        let h = harness();
        let member = MemberId::new("m1");
        h.primary.set_last_known(Some(RawFix::new(1.0, 1.0, 1_000)));
        h.secondary.set_last_known(Some(RawFix::new(2.0, 2.0, 2_000)));
        *h.primary.fail_last_known.lock().unwrap() = true;

        let id = h.aggregator.record_initial(&member).await.unwrap();
        let records = h.store.query_by_range(&member, 0, i64::MAX).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].latitude, 2.0);
        assert_eq!(records[0].note.as_deref(), Some(SESSION_START_NOTE));
        assert_eq!(h.aggregator.last_accepted(), None);
    }

    #[tokio::test]
    async fn initial_record_without_position() {
        let h = harness();
        assert!(h.aggregator.record_initial(&MemberId::new("m1")).await.is_none());
    }

    #[tokio::test]
    async fn stop_unsubscribes_and_is_idempotent() {
        let mut h = harness();
        h.aggregator.stop();
        assert_eq!(h.primary.active_subscriptions(), 0);

        h.aggregator.start(&MemberId::new("m1"), 1_000).unwrap();
        assert_eq!(h.primary.active_subscriptions(), 1);
        assert_eq!(h.secondary.active_subscriptions(), 1);

        h.aggregator.stop();
        h.aggregator.stop();
        assert!(!h.aggregator.is_active());
        assert_eq!(h.primary.active_subscriptions(), 0);
        assert_eq!(h.secondary.active_subscriptions(), 0);
        assert!(!h.primary.emit(RawFix::new(1.0, 2.0, 5_000)));
    }

    #[tokio::test]
    async fn failed_subscribe_tears_down() {
        let mut h = harness();
        *h.secondary.fail_subscribe.lock().unwrap() = true;

        assert!(h.aggregator.start(&MemberId::new("m1"), 1_000).is_err());
        assert!(!h.aggregator.is_active());
        assert_eq!(h.primary.active_subscriptions(), 0);
    }
}
