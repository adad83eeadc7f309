//! Record persistence

use geotrack_api::{LocationRecord, PositionSample};
use geotrack_store::{LocationStore, StoreError};
use geotrack_util::{MemberId, RecordId};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Write task failed: {0}")]
    Task(String),
}

/// Turns accepted samples into stored records
#[derive(Clone)]
pub struct RecordWriter {
    store: Arc<dyn LocationStore>,
}

impl RecordWriter {
    pub fn new(store: Arc<dyn LocationStore>) -> Self {
        Self { store }
    }

    /// Build and insert a record. The insert runs on the blocking pool.
    pub async fn write(
        &self,
        sample: &PositionSample,
        member_id: &MemberId,
        address: Option<String>,
        note: Option<String>,
    ) -> Result<RecordId, WriteError> {
        let record = LocationRecord::from_sample(sample, member_id.clone(), address, note);
        let store = self.store.clone();

        let id = tokio::task::spawn_blocking(move || store.insert(&record))
            .await
            .map_err(|e| WriteError::Task(e.to_string()))??;

        debug!(record_id = %id, member_id = %member_id, source = %sample.source, "Record written");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotrack_api::SourceId;
    use geotrack_store::SqliteStore;

    #[tokio::test]
    async fn write_uses_capture_time() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let writer = RecordWriter::new(store.clone());
        let member = MemberId::new("m1");
        let sample = PositionSample {
            latitude: 10.0,
            longitude: 20.0,
            altitude: None,
            accuracy: Some(3.0),
            source: SourceId::Secondary,
            captured_at_ms: 42_000,
        };

        let id = writer
            .write(&sample, &member, Some("Somewhere".into()), None)
            .await
            .unwrap();

        let records = store.query_by_range(&member, 0, i64::MAX).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].timestamp_ms, 42_000);
        assert_eq!(records[0].address.as_deref(), Some("Somewhere"));
    }
}
