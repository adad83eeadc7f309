//! Mock host collaborators for testing

use async_trait::async_trait;
use geotrack_api::SourceId;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::{
    AlarmPayload, AlarmScheduler, ForegroundVisibility, Geocoder, HostError, HostResult,
    PermissionGate, PositionSource, RawFix,
};

/// Mock position source; fixes are injected with [`MockSource::emit`]
pub struct MockSource {
    id: SourceId,
    sender: Mutex<Option<mpsc::UnboundedSender<RawFix>>>,
    last_known: Mutex<Option<RawFix>>,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,

    /// Configure subscribe to fail
    pub fail_subscribe: Arc<Mutex<bool>>,

    /// Configure last_known to fail
    pub fail_last_known: Arc<Mutex<bool>>,
}

impl MockSource {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            sender: Mutex::new(None),
            last_known: Mutex::new(None),
            subscribe_calls: AtomicUsize::new(0),
            unsubscribe_calls: AtomicUsize::new(0),
            fail_subscribe: Arc::new(Mutex::new(false)),
            fail_last_known: Arc::new(Mutex::new(false)),
        }
    }

    /// Deliver a fix to the current subscriber. Returns false when nobody listens.
    pub fn emit(&self, fix: RawFix) -> bool {
        match self.sender.lock().unwrap().as_ref() {
            Some(tx) => tx.send(fix).is_ok(),
            None => false,
        }
    }

    pub fn set_last_known(&self, fix: Option<RawFix>) {
        *self.last_known.lock().unwrap() = fix;
    }

    /// Number of live subscriptions (0 or 1)
    pub fn active_subscriptions(&self) -> usize {
        match self.sender.lock().unwrap().as_ref() {
            Some(tx) if !tx.is_closed() => 1,
            _ => 0,
        }
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PositionSource for MockSource {
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn subscribe(&self, _min_interval: Duration) -> HostResult<mpsc::UnboundedReceiver<RawFix>> {
        if *self.fail_subscribe.lock().unwrap() {
            return Err(HostError::SubscribeFailed("mock subscribe failure".into()));
        }
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    fn unsubscribe(&self) {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.sender.lock().unwrap().take();
    }

    async fn last_known(&self) -> HostResult<Option<RawFix>> {
        if *self.fail_last_known.lock().unwrap() {
            return Err(HostError::SourceUnavailable("mock last_known failure".into()));
        }
        Ok(self.last_known.lock().unwrap().clone())
    }
}

/// Mock permission gate
pub struct MockPermission {
    granted: AtomicBool,
}

impl MockPermission {
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }

    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

impl PermissionGate for MockPermission {
    fn has_location_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

/// Behaviour of [`MockGeocoder`]
#[derive(Debug, Clone)]
pub enum GeocodeBehavior {
    Address(String),
    NoMatch,
    Fail,
    /// Never answers
    Hang,
}

/// Mock reverse geocoder
pub struct MockGeocoder {
    behavior: Mutex<GeocodeBehavior>,
    calls: AtomicUsize,
}

impl MockGeocoder {
    pub fn new(behavior: GeocodeBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_behavior(&self, behavior: GeocodeBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn reverse_geocode(&self, _latitude: f64, _longitude: f64) -> HostResult<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            GeocodeBehavior::Address(address) => Ok(Some(address)),
            GeocodeBehavior::NoMatch => Ok(None),
            GeocodeBehavior::Fail => Err(HostError::GeocodeFailed("mock geocoder failure".into())),
            GeocodeBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(None)
            }
        }
    }
}

/// Mock one-shot scheduler. Wakes are delivered by [`MockAlarm::fire`].
pub struct MockAlarm {
    pending: Mutex<Option<(i64, AlarmPayload)>>,
    fired_tx: mpsc::UnboundedSender<AlarmPayload>,
    fired_rx: Mutex<Option<mpsc::UnboundedReceiver<AlarmPayload>>>,
    schedule_calls: AtomicUsize,
    cancel_calls: AtomicUsize,

    /// Configure schedule_once to be refused
    pub refuse: Arc<Mutex<bool>>,
}

impl MockAlarm {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            pending: Mutex::new(None),
            fired_tx: tx,
            fired_rx: Mutex::new(Some(rx)),
            schedule_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            refuse: Arc::new(Mutex::new(false)),
        }
    }

    /// Pending wake time and payload
    pub fn pending(&self) -> Option<(i64, AlarmPayload)> {
        self.pending.lock().unwrap().clone()
    }

    /// Fire the pending wake, if any, and return its payload
    pub fn fire(&self) -> Option<AlarmPayload> {
        let (_, payload) = self.pending.lock().unwrap().take()?;
        let _ = self.fired_tx.send(payload.clone());
        Some(payload)
    }

    /// Deliver an arbitrary payload, as a late or duplicate wake would
    pub fn deliver(&self, payload: AlarmPayload) {
        let _ = self.fired_tx.send(payload);
    }

    pub fn schedule_calls(&self) -> usize {
        self.schedule_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAlarm {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmScheduler for MockAlarm {
    fn schedule_once(&self, at_ms: i64, payload: AlarmPayload) -> HostResult<()> {
        if *self.refuse.lock().unwrap() {
            return Err(HostError::SchedulingRefused("mock scheduler refused".into()));
        }
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);
        *self.pending.lock().unwrap() = Some((at_ms, payload));
        Ok(())
    }

    fn cancel(&self, _payload: &AlarmPayload) -> HostResult<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().unwrap().take();
        Ok(())
    }

    fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<AlarmPayload>> {
        self.fired_rx.lock().unwrap().take()
    }
}

/// Mock foreground indicator
pub struct MockForeground {
    held: AtomicBool,
    acquire_calls: AtomicUsize,
    release_calls: AtomicUsize,

    /// Configure acquire to fail
    pub fail_acquire: Arc<Mutex<bool>>,
}

impl MockForeground {
    pub fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
            acquire_calls: AtomicUsize::new(0),
            release_calls: AtomicUsize::new(0),
            fail_acquire: Arc::new(Mutex::new(false)),
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockForeground {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundVisibility for MockForeground {
    fn acquire(&self, _title: &str, _text: &str) -> HostResult<()> {
        if *self.fail_acquire.lock().unwrap() {
            return Err(HostError::VisibilityFailed("mock acquire failure".into()));
        }
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) -> HostResult<()> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        self.held.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Bundle of mock collaborators sharing one test's lifetime
pub struct MockHost {
    pub primary: Arc<MockSource>,
    pub secondary: Arc<MockSource>,
    pub permission: Arc<MockPermission>,
    pub geocoder: Arc<MockGeocoder>,
    pub alarm: Arc<MockAlarm>,
    pub foreground: Arc<MockForeground>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            primary: Arc::new(MockSource::new(SourceId::Primary)),
            secondary: Arc::new(MockSource::new(SourceId::Secondary)),
            permission: Arc::new(MockPermission::new(true)),
            geocoder: Arc::new(MockGeocoder::new(GeocodeBehavior::Address(
                "1 Main St".into(),
            ))),
            alarm: Arc::new(MockAlarm::new()),
            foreground: Arc::new(MockForeground::new()),
        }
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack_util::MemberId;

    #[tokio::test]
    async fn mock_source_delivers_after_subscribe() {
        let source = MockSource::new(SourceId::Primary);
        assert!(!source.emit(RawFix::new(1.0, 2.0, 100)));

        let mut rx = source.subscribe(Duration::from_secs(60)).unwrap();
        assert_eq!(source.active_subscriptions(), 1);
        assert!(source.emit(RawFix::new(1.0, 2.0, 100)));

        let fix = rx.recv().await.unwrap();
        assert_eq!(fix.time_ms, 100);

        source.unsubscribe();
        source.unsubscribe();
        assert_eq!(source.active_subscriptions(), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn mock_geocoder_behaviors() {
        let geocoder = MockGeocoder::new(GeocodeBehavior::NoMatch);
        assert_eq!(geocoder.reverse_geocode(0.0, 0.0).await.unwrap(), None);

        geocoder.set_behavior(GeocodeBehavior::Fail);
        assert!(geocoder.reverse_geocode(0.0, 0.0).await.is_err());
        assert_eq!(geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn mock_alarm_fire_and_cancel() {
        let alarm = MockAlarm::new();
        let mut rx = alarm.take_receiver().unwrap();
        assert!(alarm.take_receiver().is_none());

        let payload = AlarmPayload {
            member_id: MemberId::new("m1"),
            interval_ms: 60_000,
            generation: 1,
        };
        alarm.schedule_once(1_000, payload.clone()).unwrap();
        alarm.cancel(&payload).unwrap();
        assert!(alarm.fire().is_none());

        alarm.schedule_once(2_000, payload.clone()).unwrap();
        assert_eq!(alarm.pending().map(|(at, _)| at), Some(2_000));
        assert_eq!(alarm.fire(), Some(payload.clone()));
        assert_eq!(rx.recv().await.unwrap(), payload);
    }

    #[test]
    fn mock_foreground_tracks_calls() {
        let fg = MockForeground::new();
        fg.acquire("Tracking", "Recording location").unwrap();
        assert!(fg.is_held());
        fg.release().unwrap();
        assert!(!fg.is_held());
        assert_eq!(fg.acquire_calls(), 1);
        assert_eq!(fg.release_calls(), 1);
    }
}
