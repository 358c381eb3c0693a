use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::data::lookup::MarketLookup;
use crate::data::types::{ListingRecord, MarketSnapshot};
use crate::error::MarketError;
use crate::storage::SnapshotStore;
use crate::tracking::differ::{diff_with, DiffOptions};

/// Receives what the polling loop finds. Implemented by the display layer.
pub trait ListingHandler: Send + Sync {
    /// Called once before the first cycle. `None` when the market could not
    /// be fetched or returned nothing.
    fn on_startup(&self, snapshot: Option<&MarketSnapshot>) -> impl Future<Output = ()> + Send;

    fn on_new_listings(&self, listings: &[ListingRecord]) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Fetching,
    Diffing,
    Notifying,
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// No previous baseline; the fetched snapshot became the baseline
    Baseline { listings: usize },
    Checked {
        listings: usize,
        new_listings: Vec<ListingRecord>,
    },
    /// Nothing was saved; the previous baseline is kept for the next cycle
    FetchFailed(MarketError),
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub interval: Duration,
    pub diff: DiffOptions,
    pub announce_on_start: bool,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            diff: DiffOptions::default(),
            announce_on_start: true,
        }
    }
}

/// Fetch → diff → notify loop over the full market listing.
///
/// Cycles never overlap. Shutdown is only observed between cycles, so a
/// snapshot is never saved from a half-finished fetch.
pub struct Poller<L, H> {
    lookup: Arc<L>,
    store: Arc<dyn SnapshotStore>,
    handler: Arc<H>,
    settings: PollerSettings,
    state: PollState,
}

impl<L: MarketLookup, H: ListingHandler> Poller<L, H> {
    pub fn new(
        lookup: Arc<L>,
        store: Arc<dyn SnapshotStore>,
        handler: Arc<H>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            lookup,
            store,
            handler,
            settings,
            state: PollState::Idle,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    fn transition(&mut self, next: PollState) {
        debug!("Poller {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting market monitor, checking every {} seconds",
            self.settings.interval.as_secs()
        );

        let mut ticker = tokio::time::interval(self.settings.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if self.settings.announce_on_start {
            self.announce_startup().await;
            // The startup fetch already stands in for the first cycle
            ticker.tick().await;
        }

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match self.run_cycle().await {
                CycleOutcome::Baseline { listings } => {
                    info!("Stored baseline of {} listings", listings)
                }
                CycleOutcome::Checked { new_listings, .. } if new_listings.is_empty() => {
                    info!("No new items found.")
                }
                CycleOutcome::Checked { new_listings, .. } => {
                    info!("Found {} new items", new_listings.len())
                }
                CycleOutcome::FetchFailed(e) => {
                    warn!("Cycle skipped, keeping previous baseline: {}", e)
                }
            }
        }

        info!("Market monitor stopped");
    }

    /// One full Idle → Fetching → Diffing → Notifying → Idle pass.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        info!("Checking market at {}...", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        self.transition(PollState::Fetching);

        let previous = self.store.load();
        let listings = match self.lookup.fetch_market_listings().await {
            Ok(listings) => listings,
            Err(e) => {
                error!("Failed to get market data: {}", e);
                self.transition(PollState::Idle);
                return CycleOutcome::FetchFailed(e);
            }
        };

        let current = MarketSnapshot::from_listings(listings).with_last_check(Utc::now());

        self.transition(PollState::Diffing);
        let new_listings = diff_with(&previous, &current, &self.settings.diff);

        if !new_listings.is_empty() {
            self.transition(PollState::Notifying);
            self.handler.on_new_listings(&new_listings).await;
        }

        if let Err(e) = self.store.save(&current) {
            error!("Failed to save snapshot: {}", e);
        }

        self.transition(PollState::Idle);

        if previous.is_empty() {
            CycleOutcome::Baseline {
                listings: current.len(),
            }
        } else {
            CycleOutcome::Checked {
                listings: current.len(),
                new_listings,
            }
        }
    }

    /// Announce the current market and store it as the first baseline.
    pub async fn announce_startup(&mut self) {
        self.transition(PollState::Fetching);

        match self.lookup.fetch_market_listings().await {
            Ok(listings) if !listings.is_empty() => {
                let snapshot = MarketSnapshot::from_listings(listings).with_last_check(Utc::now());

                self.transition(PollState::Notifying);
                self.handler.on_startup(Some(&snapshot)).await;

                if let Err(e) = self.store.save(&snapshot) {
                    error!("Failed to save startup snapshot: {}", e);
                }
            }
            Ok(_) => {
                warn!("Market returned no listings at startup");
                self.handler.on_startup(None).await;
            }
            Err(e) => {
                error!("Failed to fetch market data at startup: {}", e);
                self.handler.on_startup(None).await;
            }
        }

        self.transition(PollState::Idle);
    }
}
