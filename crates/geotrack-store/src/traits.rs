//! Store trait definitions

use chrono::{DateTime, Local, NaiveDate};
use geotrack_api::LocationRecord;
use geotrack_util::{MemberId, RecordId};

use crate::StoreResult;

/// Main store trait
pub trait LocationStore: Send + Sync {
    // Records

    /// Persist a record and return its id
    fn insert(&self, record: &LocationRecord) -> StoreResult<RecordId>;

    /// Records for a member with `start_ms <= timestamp_ms <= end_ms`, oldest first
    fn query_by_range(
        &self,
        member_id: &MemberId,
        start_ms: i64,
        end_ms: i64,
    ) -> StoreResult<Vec<LocationRecord>>;

    /// Number of records for a member on a local calendar day
    fn count_on_day(&self, member_id: &MemberId, day: NaiveDate) -> StoreResult<u64>;

    /// Number of records for a member today
    fn count_today(&self, member_id: &MemberId) -> StoreResult<u64> {
        self.count_on_day(member_id, geotrack_util::now().date_naive())
    }

    /// Timestamp of the member's newest record
    fn last_record_time(&self, member_id: &MemberId) -> StoreResult<Option<i64>>;

    /// Delete a whole record. `NotFound` if no such record exists.
    fn delete_record(&self, record_id: &RecordId) -> StoreResult<()>;

    // Tracking indicator

    /// Load the persisted tracking indicator
    fn load_snapshot(&self) -> StoreResult<Option<TrackingSnapshot>>;

    /// Save the tracking indicator
    fn save_snapshot(&self, snapshot: &TrackingSnapshot) -> StoreResult<()>;

    /// Remove the tracking indicator
    fn clear_snapshot(&self) -> StoreResult<()>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// Persisted "is tracking" indicator
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrackingSnapshot {
    /// Timestamp of snapshot
    pub timestamp: DateTime<Local>,

    /// Active session info (if any)
    pub active: Option<SessionSnapshot>,
}

impl TrackingSnapshot {
    pub fn recording(member_id: MemberId, interval_ms: i64, started_at_ms: i64) -> Self {
        Self {
            timestamp: geotrack_util::now(),
            active: Some(SessionSnapshot {
                member_id,
                interval_ms,
                started_at_ms,
            }),
        }
    }
}

/// Snapshot of a recording session
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionSnapshot {
    pub member_id: MemberId,
    pub interval_ms: i64,
    pub started_at_ms: i64,
}
