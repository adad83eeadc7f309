//! Host collaborator traits

use async_trait::async_trait;
use geotrack_api::SourceId;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{AlarmPayload, RawFix};

/// Errors from host collaborators
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Position source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    #[error("Geocoding failed: {0}")]
    GeocodeFailed(String),

    #[error("Scheduling refused: {0}")]
    SchedulingRefused(String),

    #[error("Foreground visibility failed: {0}")]
    VisibilityFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// A platform position provider.
///
/// Fixes are pushed into the channel returned by [`subscribe`] from whatever
/// thread the platform uses; each source keeps its own delivery order.
///
/// [`subscribe`]: PositionSource::subscribe
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Which slot this source fills
    fn source_id(&self) -> SourceId;

    /// Start delivering fixes, at most about once per `min_interval`.
    ///
    /// Subscribing again replaces the previous subscription.
    fn subscribe(&self, min_interval: Duration) -> HostResult<mpsc::UnboundedReceiver<RawFix>>;

    /// Stop delivering fixes. Safe to call when not subscribed.
    fn unsubscribe(&self);

    /// Most recent fix known to the platform, if any
    async fn last_known(&self) -> HostResult<Option<RawFix>>;
}

/// Capability check supplied by the host platform
pub trait PermissionGate: Send + Sync {
    fn has_location_permission(&self) -> bool;
}

/// Reverse geocoding provider
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve coordinates to a display address. `Ok(None)` means no match.
    async fn reverse_geocode(&self, latitude: f64, longitude: f64) -> HostResult<Option<String>>;
}

/// One-shot wake-up primitive.
///
/// Alarms are matched by purpose, not by payload contents: cancelling with
/// any payload removes the pending wake.
pub trait AlarmScheduler: Send + Sync {
    /// Arm a wake at `at_ms` (epoch millis), replacing any pending one
    fn schedule_once(&self, at_ms: i64, payload: AlarmPayload) -> HostResult<()>;

    /// Remove the pending wake. Safe to call when nothing is armed.
    fn cancel(&self, payload: &AlarmPayload) -> HostResult<()>;

    /// Receiver for fired payloads. Returns `None` after the first call.
    fn take_receiver(&self) -> Option<mpsc::UnboundedReceiver<AlarmPayload>>;
}

/// User-visible indication that background tracking is active
pub trait ForegroundVisibility: Send + Sync {
    fn acquire(&self, title: &str, text: &str) -> HostResult<()>;

    fn release(&self) -> HostResult<()>;
}
