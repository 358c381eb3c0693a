use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Mutex;

use crate::data::types::MarketSnapshot;
use crate::error::{MarketError, Result};
use crate::storage::SnapshotStore;

/// Snapshot kept as a single JSON document row in SQLite.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &str) -> Result<Self> {
        Self::with_connection(Connection::open(db_path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS market_snapshot (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                document TEXT NOT NULL,
                saved_at TIMESTAMP NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl SnapshotStore for SqliteStore {
    fn try_load(&self) -> Result<MarketSnapshot> {
        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let document: Option<String> = conn
            .query_row("SELECT document FROM market_snapshot WHERE id = 1", [], |row| row.get(0))
            .optional()?;

        match document {
            Some(doc) => serde_json::from_str(&doc)
                .map_err(|e| MarketError::CorruptSnapshot(format!("market_snapshot row: {}", e))),
            None => Ok(MarketSnapshot::empty()),
        }
    }

    fn save(&self, snapshot: &MarketSnapshot) -> Result<()> {
        let document = serde_json::to_string(snapshot)
            .map_err(|e| MarketError::Storage(format!("Failed to serialize snapshot: {}", e)))?;

        let conn = self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.execute(
            "INSERT OR REPLACE INTO market_snapshot (id, document, saved_at) VALUES (1, ?1, ?2)",
            params![document, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::ListingRecord;

    #[test]
    fn test_empty_database_loads_empty_snapshot() {
        let store = SqliteStore::in_memory().unwrap();
        let snapshot = store.load();
        assert!(snapshot.is_empty());
        assert!(snapshot.last_check.is_none());
    }

    #[test]
    fn test_round_trip_and_replace() {
        let store = SqliteStore::in_memory().unwrap();
        let first = MarketSnapshot::from_listings(vec![ListingRecord::new("A").with_sell_price(5)])
            .with_last_check(Utc::now());
        store.save(&first).unwrap();
        assert_eq!(store.try_load().unwrap(), first);

        let second = MarketSnapshot::from_listings(vec![ListingRecord::new("B")]);
        store.save(&second).unwrap();
        assert_eq!(store.try_load().unwrap(), second);
    }

    #[test]
    fn test_corrupt_row_falls_back_to_empty() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO market_snapshot (id, document, saved_at) VALUES (1, 'not json', '2025-01-01')",
                [],
            )
            .unwrap();

        assert!(matches!(store.try_load(), Err(MarketError::CorruptSnapshot(_))));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let path = path.to_str().unwrap();

        let snapshot = MarketSnapshot::from_listings(vec![ListingRecord::new("Dusk Sword")]);
        SqliteStore::open(path).unwrap().save(&snapshot).unwrap();

        assert_eq!(SqliteStore::open(path).unwrap().load(), snapshot);
    }
}
