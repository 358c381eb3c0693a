use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::data::types::{ListingRecord, PriceCheck};

const HEADER: [&str; 4] = ["timestamp", "event", "item", "price"];

/// Append-only CSV record of what the monitor saw and what users asked for.
pub struct CsvLogger {
    log_path: PathBuf,
    lock: Mutex<()>,
}

impl CsvLogger {
    pub fn new(log_path: impl Into<PathBuf>) -> Result<Self> {
        let log_path = log_path.into();

        // Create CSV file with headers if it doesn't exist
        if !log_path.exists() {
            let mut writer = csv::Writer::from_path(&log_path)
                .with_context(|| format!("Failed to create event log: {}", log_path.display()))?;
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        Ok(Self {
            log_path,
            lock: Mutex::new(()),
        })
    }

    pub fn log_new_listing(&self, listing: &ListingRecord) -> Result<()> {
        self.append("new_listing", &listing.name, &listing.display_price())
    }

    pub fn log_price_check(&self, check: &PriceCheck) -> Result<()> {
        let price = check
            .highest_buy_order
            .map(|p| p.to_string())
            .or_else(|| check.lowest_price.clone())
            .unwrap_or_default();
        self.append("price_check", &check.name, &price)
    }

    fn append(&self, event: &str, item: &str, price: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let file = OpenOptions::new()
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open event log: {}", self.log_path.display()))?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record([Utc::now().to_rfc3339().as_str(), event, item, price])?;
        writer.flush()?;

        Ok(())
    }
}
