//! Values exchanged with the host

use geotrack_util::MemberId;
use serde::{Deserialize, Serialize};

/// A position fix as delivered by a platform source callback.
///
/// Values are passed through unvalidated; the core normalizes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub accuracy: Option<f32>,
    /// Capture time in epoch millis, as reported by the source
    pub time_ms: i64,
}

impl RawFix {
    pub fn new(latitude: f64, longitude: f64, time_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy: None,
            time_ms,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f32) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }
}

/// Payload carried by a one-shot wake-up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmPayload {
    pub member_id: MemberId,
    pub interval_ms: i64,
    /// Distinguishes successive arms so a superseded wake can be ignored
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_builders() {
        let fix = RawFix::new(1.0, 2.0, 3).with_accuracy(5.0).with_altitude(10.0);
        assert_eq!(fix.accuracy, Some(5.0));
        assert_eq!(fix.altitude, Some(10.0));
        assert_eq!(fix.time_ms, 3);
    }

    #[test]
    fn payload_serialization() {
        let payload = AlarmPayload {
            member_id: MemberId::new("m1"),
            interval_ms: 60_000,
            generation: 4,
        };
        let json = serde_json::to_string(&payload).unwrap();
        let parsed: AlarmPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload, parsed);
    }
}
