pub mod json_file;
pub mod sqlite;

use std::sync::Arc;
use tracing::warn;

use crate::config::{StorageBackend, StorageConfig};
use crate::data::types::MarketSnapshot;
use crate::error::Result;

pub use json_file::JsonFileStore;
pub use sqlite::SqliteStore;

/// Owner of the single persisted baseline snapshot.
///
/// `load` and `save` are critical sections: a reader never observes a
/// half-written snapshot from a concurrent writer.
pub trait SnapshotStore: Send + Sync {
    /// Persisted snapshot, an empty one if nothing was saved yet, or
    /// `CorruptSnapshot` if the stored data can't be read back.
    fn try_load(&self) -> Result<MarketSnapshot>;

    /// Replace the stored snapshot entirely
    fn save(&self, snapshot: &MarketSnapshot) -> Result<()>;

    /// `try_load` with corrupt state swallowed into an empty baseline.
    fn load(&self) -> MarketSnapshot {
        match self.try_load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Discarding stored snapshot, starting from empty baseline: {}", e);
                MarketSnapshot::empty()
            }
        }
    }
}

pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn SnapshotStore>> {
    Ok(match config.backend {
        StorageBackend::Json => Arc::new(JsonFileStore::new(config.path())),
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(config.path())?),
    })
}
