//! Event types for geotrackd -> client streaming

use chrono::{DateTime, Local};
use geotrack_util::{MemberId, RecordId};
use serde::{Deserialize, Serialize};

use crate::{SourceId, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: geotrack_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Emitted on every start/stop transition
    StatusChanged {
        is_tracking: bool,
        member_id: Option<MemberId>,
        interval_ms: i64,
    },

    /// A record was persisted
    RecordWritten {
        record_id: RecordId,
        member_id: MemberId,
        timestamp_ms: i64,
        /// None for the session-start record
        source: Option<SourceId>,
    },

    /// An automatic restart was armed
    RestartScheduled {
        member_id: MemberId,
        fire_at_ms: i64,
    },

    /// A pending automatic restart was dropped
    RestartCanceled,

    /// Service is shutting down
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_event_serialization() {
        let event = Event::new(EventPayload::StatusChanged {
            is_tracking: true,
            member_id: Some(MemberId::new("m1")),
            interval_ms: 60_000,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("status_changed"));

        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.api_version, API_VERSION);
        assert!(matches!(
            parsed.payload,
            EventPayload::StatusChanged { is_tracking: true, interval_ms: 60_000, .. }
        ));
    }

    #[test]
    fn record_event_without_source() {
        let event = Event::new(EventPayload::RecordWritten {
            record_id: RecordId::new(),
            member_id: MemberId::new("m1"),
            timestamp_ms: 5_000,
            source: None,
        });

        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();
        if let EventPayload::RecordWritten { source, timestamp_ms, .. } = parsed.payload {
            assert!(source.is_none());
            assert_eq!(timestamp_ms, 5_000);
        } else {
            panic!("Expected RecordWritten");
        }
    }
}
