use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

/// Used when the catalog file is missing or unreadable
const DEFAULT_ITEMS: &[&str] = &[
    "Dreams & Nightmares Case",
    "AK-47 | Redline (Field-Tested)",
    "AWP | Asiimov (Field-Tested)",
];

/// Item names the search command matches against.
#[derive(Debug, Clone)]
pub struct ItemCatalog {
    items: Vec<String>,
}

impl ItemCatalog {
    pub fn new(items: Vec<String>) -> Self {
        Self { items }
    }

    /// Read names from the first column of a CSV file with a header row.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path.as_ref())
            .with_context(|| format!("Failed to open catalog: {}", path.as_ref().display()))?;

        let mut items = Vec::new();
        for record in reader.records() {
            let record = record.context("Failed to parse catalog record")?;
            if let Some(name) = record.get(0).map(str::trim).filter(|n| !n.is_empty()) {
                items.push(name.to_string());
            }
        }

        Ok(Self { items })
    }

    /// Like `from_csv`, but falls back to a small built-in list
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_csv(&path) {
            Ok(catalog) => {
                info!("Loaded {} catalog items from {}", catalog.len(), path.as_ref().display());
                catalog
            }
            Err(e) => {
                warn!("Error loading items from CSV: {:#}", e);
                Self::new(DEFAULT_ITEMS.iter().map(|s| s.to_string()).collect())
            }
        }
    }

    /// Case-insensitive substring match, in catalog order
    pub fn search(&self, query: &str) -> Vec<&str> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.items
            .iter()
            .filter(|item| item.to_lowercase().contains(&needle))
            .map(String::as_str)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
