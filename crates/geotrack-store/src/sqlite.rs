//! SQLite-based store implementation

use chrono::NaiveDate;
use geotrack_api::LocationRecord;
use geotrack_util::{MemberId, RecordId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{LocationStore, StoreError, StoreResult, TrackingSnapshot};

const RECORD_COLUMNS: &str =
    "id, latitude, longitude, altitude, accuracy, address, timestamp_ms, member_id, note";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Location records
            CREATE TABLE IF NOT EXISTS location_records (
                id TEXT PRIMARY KEY,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                altitude REAL,
                accuracy REAL,
                address TEXT,
                timestamp_ms INTEGER NOT NULL,
                member_id TEXT NOT NULL,
                note TEXT
            );

            -- Tracking indicator (single row)
            CREATE TABLE IF NOT EXISTS tracking_snapshot (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                snapshot_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_member_time
                ON location_records(member_id, timestamp_ms);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(String, LocationRecord)> {
    let id: String = row.get(0)?;
    let accuracy: Option<f64> = row.get(4)?;
    let member: String = row.get(7)?;
    let record = LocationRecord {
        // Replaced by the parsed id below
        id: RecordId::default(),
        latitude: row.get(1)?,
        longitude: row.get(2)?,
        altitude: row.get(3)?,
        accuracy: accuracy.map(|a| a as f32),
        address: row.get(5)?,
        timestamp_ms: row.get(6)?,
        member_id: MemberId::new(member),
        note: row.get(8)?,
    };
    Ok((id, record))
}

impl LocationStore for SqliteStore {
    fn insert(&self, record: &LocationRecord) -> StoreResult<RecordId> {
        let conn = self.lock()?;

        conn.execute(
            &format!(
                "INSERT INTO location_records ({RECORD_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                record.id.to_string(),
                record.latitude,
                record.longitude,
                record.altitude,
                record.accuracy.map(f64::from),
                record.address,
                record.timestamp_ms,
                record.member_id.as_str(),
                record.note,
            ],
        )?;

        debug!(
            record_id = %record.id,
            member_id = %record.member_id,
            timestamp_ms = record.timestamp_ms,
            "Record inserted"
        );
        Ok(record.id)
    }

    fn query_by_range(
        &self,
        member_id: &MemberId,
        start_ms: i64,
        end_ms: i64,
    ) -> StoreResult<Vec<LocationRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM location_records \
             WHERE member_id = ? AND timestamp_ms >= ? AND timestamp_ms <= ? \
             ORDER BY timestamp_ms ASC"
        ))?;

        let rows = stmt.query_map(params![member_id.as_str(), start_ms, end_ms], record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            let (id, mut record) = row?;
            record.id = id
                .parse()
                .map_err(|e| StoreError::Serialization(format!("bad record id '{id}': {e}")))?;
            records.push(record);
        }

        Ok(records)
    }

    fn count_on_day(&self, member_id: &MemberId, day: NaiveDate) -> StoreResult<u64> {
        let (start, end) = geotrack_util::local_day_bounds_ms(day);
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM location_records \
             WHERE member_id = ? AND timestamp_ms >= ? AND timestamp_ms < ?",
            params![member_id.as_str(), start, end],
            |row| row.get(0),
        )?;

        Ok(count.max(0) as u64)
    }

    fn last_record_time(&self, member_id: &MemberId) -> StoreResult<Option<i64>> {
        let conn = self.lock()?;

        let latest: Option<i64> = conn.query_row(
            "SELECT MAX(timestamp_ms) FROM location_records WHERE member_id = ?",
            [member_id.as_str()],
            |row| row.get(0),
        )?;

        Ok(latest)
    }

    fn delete_record(&self, record_id: &RecordId) -> StoreResult<()> {
        let conn = self.lock()?;

        let deleted = conn.execute(
            "DELETE FROM location_records WHERE id = ?",
            [record_id.to_string()],
        )?;

        if deleted == 0 {
            return Err(StoreError::NotFound(format!("record {record_id}")));
        }

        debug!(record_id = %record_id, "Record deleted");
        Ok(())
    }

    fn load_snapshot(&self) -> StoreResult<Option<TrackingSnapshot>> {
        let conn = self.lock()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT snapshot_json FROM tracking_snapshot WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    fn save_snapshot(&self, snapshot: &TrackingSnapshot) -> StoreResult<()> {
        let conn = self.lock()?;
        let json = serde_json::to_string(snapshot)?;

        conn.execute(
            r#"
            INSERT INTO tracking_snapshot (id, snapshot_json)
            VALUES (1, ?)
            ON CONFLICT(id)
            DO UPDATE SET snapshot_json = excluded.snapshot_json
            "#,
            [json],
        )?;

        debug!(active = snapshot.active.is_some(), "Snapshot saved");
        Ok(())
    }

    fn clear_snapshot(&self) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM tracking_snapshot WHERE id = 1", [])?;
        debug!("Snapshot cleared");
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionSnapshot;

    fn record(member: &str, timestamp_ms: i64) -> LocationRecord {
        LocationRecord {
            id: RecordId::new(),
            latitude: 47.6,
            longitude: -122.3,
            altitude: None,
            accuracy: Some(8.5),
            address: Some("1 Main St".into()),
            timestamp_ms,
            member_id: MemberId::new(member),
            note: None,
        }
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_insert_and_query_range() {
        let store = SqliteStore::in_memory().unwrap();
        let member = MemberId::new("m1");

        store.insert(&record("m1", 3_000)).unwrap();
        store.insert(&record("m1", 1_000)).unwrap();
        store.insert(&record("m1", 5_000)).unwrap();
        store.insert(&record("m2", 2_000)).unwrap();

        let records = store.query_by_range(&member, 1_000, 3_000).unwrap();
        let times: Vec<i64> = records.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(times, vec![1_000, 3_000]);
        assert!(records.iter().all(|r| r.member_id == member));
        assert_eq!(records[0].accuracy, Some(8.5));
        assert_eq!(records[0].address.as_deref(), Some("1 Main St"));
    }

    #[test]
    fn test_record_round_trips_id() {
        let store = SqliteStore::in_memory().unwrap();
        let original = record("m1", 1_000);
        let id = store.insert(&original).unwrap();
        assert_eq!(id, original.id);

        let loaded = store
            .query_by_range(&MemberId::new("m1"), 0, i64::MAX)
            .unwrap();
        assert_eq!(loaded, vec![original]);
    }

    #[test]
    fn test_count_on_day_and_last_time() {
        let store = SqliteStore::in_memory().unwrap();
        let member = MemberId::new("m1");
        let today = geotrack_util::now().date_naive();
        let (start, end) = geotrack_util::local_day_bounds_ms(today);

        assert_eq!(store.count_on_day(&member, today).unwrap(), 0);
        assert_eq!(store.last_record_time(&member).unwrap(), None);

        store.insert(&record("m1", start)).unwrap();
        store.insert(&record("m1", start + 60_000)).unwrap();
        store.insert(&record("m1", end)).unwrap();
        store.insert(&record("m1", start - 1)).unwrap();

        assert_eq!(store.count_on_day(&member, today).unwrap(), 2);
        assert_eq!(store.last_record_time(&member).unwrap(), Some(end));
    }

    #[test]
    fn test_delete_record() {
        let store = SqliteStore::in_memory().unwrap();
        let rec = record("m1", 1_000);
        store.insert(&rec).unwrap();

        store.delete_record(&rec.id).unwrap();
        assert!(store
            .query_by_range(&rec.member_id, 0, i64::MAX)
            .unwrap()
            .is_empty());
        assert!(matches!(
            store.delete_record(&rec.id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_snapshot() {
        let store = SqliteStore::in_memory().unwrap();

        assert!(store.load_snapshot().unwrap().is_none());

        let snapshot = TrackingSnapshot::recording(MemberId::new("m1"), 60_000, 1_000);
        store.save_snapshot(&snapshot).unwrap();

        let loaded = store.load_snapshot().unwrap().unwrap();
        assert_eq!(
            loaded.active,
            Some(SessionSnapshot {
                member_id: MemberId::new("m1"),
                interval_ms: 60_000,
                started_at_ms: 1_000,
            })
        );

        store.clear_snapshot().unwrap();
        assert!(store.load_snapshot().unwrap().is_none());
        store.clear_snapshot().unwrap();
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("geotrack.db");
        let rec = record("m1", 1_000);

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&rec).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.last_record_time(&rec.member_id).unwrap(), Some(1_000));
    }
}
