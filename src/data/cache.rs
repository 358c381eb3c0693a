use dashmap::DashMap;
use std::time::{Duration, Instant};

use crate::data::types::PriceCheck;

/// Recent price checks, so repeated button presses don't hit the market.
pub struct PriceCheckCache {
    cache: DashMap<String, CachedCheck>,
    ttl: Duration,
}

struct CachedCheck {
    check: PriceCheck,
    timestamp: Instant,
}

impl PriceCheckCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: DashMap::new(),
            ttl,
        }
    }

    pub fn insert(&self, check: PriceCheck) {
        self.cache.insert(
            key(&check.name),
            CachedCheck {
                check,
                timestamp: Instant::now(),
            },
        );
    }

    /// Get check if not expired (evict on read)
    pub fn get(&self, item_name: &str) -> Option<PriceCheck> {
        let key = key(item_name);
        self.cache.get(&key).and_then(|entry| {
            if entry.timestamp.elapsed() > self.ttl {
                drop(entry); // Drop the read lock
                self.cache.remove(&key);
                None
            } else {
                Some(entry.check.clone())
            }
        })
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

fn key(item_name: &str) -> String {
    item_name.trim().to_lowercase()
}
