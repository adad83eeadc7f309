//! Shared types for the geotrackd API

use geotrack_util::{ClientId, MemberId, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which position source produced a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// Precise source (satellite fix)
    Primary,
    /// Approximate source (network based)
    Secondary,
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Primary => write!(f, "primary"),
            SourceId::Secondary => write!(f, "secondary"),
        }
    }
}

/// A raw observation from one source, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// Horizontal accuracy radius in meters
    pub accuracy: Option<f32>,
    pub source: SourceId,
    pub captured_at_ms: i64,
}

/// A persisted sample with derived address metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub id: RecordId,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub accuracy: Option<f32>,
    pub address: Option<String>,
    /// Capture time of the underlying sample
    pub timestamp_ms: i64,
    pub member_id: MemberId,
    pub note: Option<String>,
}

impl LocationRecord {
    /// Build a record from an accepted sample
    pub fn from_sample(
        sample: &PositionSample,
        member_id: MemberId,
        address: Option<String>,
        note: Option<String>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            latitude: sample.latitude,
            longitude: sample.longitude,
            altitude: sample.altitude,
            accuracy: sample.accuracy,
            address,
            timestamp_ms: sample.captured_at_ms,
            member_id,
            note,
        }
    }
}

/// User-facing tracking settings.
///
/// Changed only while tracking is stopped; persisted across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// User consent for location access
    pub enabled: bool,
    pub interval_seconds: u64,
    pub auto_restart_delay_seconds: u64,
    /// Resume tracking when the service starts
    pub auto_start_enabled: bool,
}

impl TrackingConfig {
    pub fn interval_ms(&self) -> i64 {
        i64::try_from(self.interval_seconds.saturating_mul(1000)).unwrap_or(i64::MAX)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 60,
            auto_restart_delay_seconds: 300,
            auto_start_enabled: false,
        }
    }
}

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingStatus {
    Stopped,
    Recording,
}

/// A pending automatic restart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartInfo {
    pub member_id: MemberId,
    pub interval_ms: i64,
    pub fire_at_ms: i64,
}

/// Full tracking state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingStateView {
    pub api_version: u32,
    pub status: TrackingStatus,
    /// Member being tracked (or last tracked, when stopped)
    pub member_id: Option<MemberId>,
    pub interval_ms: i64,
    pub last_accepted_at_ms: Option<i64>,
    pub pending_restart: Option<RestartInfo>,
}

/// Role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Same user as the daemon (or root) - full control
    Owner,
    /// Read-only observer
    Observer,
}

impl ClientRole {
    pub fn can_control_tracking(&self) -> bool {
        matches!(self, ClientRole::Owner)
    }

    pub fn can_edit_records(&self) -> bool {
        matches!(self, ClientRole::Owner)
    }

    pub fn can_update_config(&self) -> bool {
        matches!(self, ClientRole::Owner)
    }
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: ClientRole,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new(role: ClientRole) -> Self {
        Self {
            client_id: ClientId::new(),
            role,
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub permission_granted: bool,
    pub store_ok: bool,
    pub status: TrackingStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PositionSample {
        PositionSample {
            latitude: 47.6062,
            longitude: -122.3321,
            altitude: Some(56.0),
            accuracy: Some(4.5),
            source: SourceId::Primary,
            captured_at_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn record_takes_capture_time() {
        let record = LocationRecord::from_sample(&sample(), MemberId::new("m1"), None, None);
        assert_eq!(record.timestamp_ms, 1_700_000_000_000);
        assert_eq!(record.member_id.as_str(), "m1");
        assert_eq!(record.altitude, Some(56.0));
        assert!(record.address.is_none());
    }

    #[test]
    fn source_id_serialization() {
        let json = serde_json::to_string(&SourceId::Secondary).unwrap();
        assert_eq!(json, "\"secondary\"");
    }

    #[test]
    fn tracking_config_interval_ms() {
        let config = TrackingConfig {
            interval_seconds: 60,
            ..TrackingConfig::default()
        };
        assert_eq!(config.interval_ms(), 60_000);

        let huge = TrackingConfig {
            interval_seconds: u64::MAX,
            ..TrackingConfig::default()
        };
        assert_eq!(huge.interval_ms(), i64::MAX);
    }

    #[test]
    fn observer_cannot_control() {
        assert!(ClientRole::Owner.can_control_tracking());
        assert!(!ClientRole::Observer.can_control_tracking());
        assert!(!ClientRole::Observer.can_update_config());
    }
}
