use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

use crate::data::types::MarketSnapshot;
use crate::error::{MarketError, Result};
use crate::storage::SnapshotStore;

/// Snapshot kept as a `{results, last_check}` JSON document on disk.
///
/// Writes land in a sibling temp file first and are renamed over the target.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileStore {
    fn try_load(&self) -> Result<MarketSnapshot> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if !self.path.exists() {
            return Ok(MarketSnapshot::empty());
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| MarketError::CorruptSnapshot(format!("{}: {}", self.path.display(), e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| MarketError::CorruptSnapshot(format!("{}: {}", self.path.display(), e)))
    }

    fn save(&self, snapshot: &MarketSnapshot) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let document = serde_json::to_string(snapshot)
            .map_err(|e| MarketError::Storage(format!("Failed to serialize snapshot: {}", e)))?;

        let temp = self.temp_path();
        fs::write(&temp, document)?;
        fs::rename(&temp, &self.path)?;

        debug!("Saved snapshot with {} listings to {}", snapshot.len(), self.path.display());
        Ok(())
    }
}
