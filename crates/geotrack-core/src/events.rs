//! Core events emitted by the tracking session

use geotrack_api::SourceId;
use geotrack_util::{MemberId, RecordId};

/// Events emitted by the core
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// Emitted on every start/stop transition
    StatusChanged {
        is_tracking: bool,
        member_id: Option<MemberId>,
        interval_ms: i64,
    },

    /// A record was persisted. `source` is `None` for the session-start record.
    RecordWritten {
        record_id: RecordId,
        member_id: MemberId,
        timestamp_ms: i64,
        source: Option<SourceId>,
    },

    /// An automatic restart was armed
    RestartScheduled { member_id: MemberId, fire_at_ms: i64 },

    /// A pending automatic restart was dropped
    RestartCanceled,
}
