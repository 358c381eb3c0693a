use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LookupConfig;
use crate::data::types::{ItemNameId, ListingRecord, OrderBookDocument, Price, PriceCheck, PriceOverview};
use crate::error::{MarketError, Result};
use crate::tracking::extractor::extract_highest_buy_order;

/// Contract every marketplace transport has to satisfy.
///
/// Implementations own all knowledge of endpoint shapes and hand back typed
/// records. Rate limiting is handled inside, following `RetryPolicy`.
pub trait MarketLookup: Send + Sync {
    /// Resolve a human-readable item name to the market's internal id
    fn fetch_item_identifier(
        &self,
        item_name: &str,
    ) -> impl Future<Output = Result<ItemNameId>> + Send;

    fn fetch_order_book(
        &self,
        item_id: ItemNameId,
    ) -> impl Future<Output = Result<OrderBookDocument>> + Send;

    /// Full-market listing page used to build a snapshot
    fn fetch_market_listings(&self) -> impl Future<Output = Result<Vec<ListingRecord>>> + Send;

    fn fetch_price_overview(
        &self,
        item_name: &str,
    ) -> impl Future<Output = Result<PriceOverview>> + Send;
}

/// Fixed cool-down retry applied when the market answers 429.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub cooldown: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(cooldown: Duration, max_attempts: u32) -> Self {
        Self {
            cooldown,
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 3)
    }
}

impl From<&LookupConfig> for RetryPolicy {
    fn from(config: &LookupConfig) -> Self {
        Self::new(Duration::from_secs(config.cooldown_secs), config.max_attempts)
    }
}

/// Run `op` until it stops reporting `RateLimited`, sleeping the cool-down
/// between attempts. Gives up with `RateLimited { attempts }` once the
/// policy's attempt budget is spent. Other errors are returned untouched.
pub async fn retry_rate_limited<F, Fut, T>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Err(MarketError::RateLimited { .. }) if attempt < policy.max_attempts => {
                warn!(
                    "Rate limited on {} (attempt {}/{}). Waiting {}s...",
                    what,
                    attempt,
                    policy.max_attempts,
                    policy.cooldown.as_secs()
                );
                tokio::time::sleep(policy.cooldown).await;
            }
            Err(MarketError::RateLimited { .. }) => {
                return Err(MarketError::RateLimited { attempts: attempt });
            }
            other => return other,
        }
    }
}

/// Resolve the item, pull its order book and extract the best bid.
pub async fn get_highest_buy_order<L: MarketLookup>(lookup: &L, item_name: &str) -> Result<Price> {
    let item_id = lookup.fetch_item_identifier(item_name).await?;
    debug!("Resolved {} to item_nameid {}", item_name, item_id);

    let order_book = lookup.fetch_order_book(item_id).await?;
    if !order_book.success.is_success() {
        return Err(MarketError::LookupFailed(format!(
            "order book request unsuccessful for {}",
            item_name
        )));
    }

    if !order_book.has_buy_orders() {
        return Err(MarketError::EmptyOrderBook);
    }

    extract_highest_buy_order(&order_book)
}

/// Overview figures plus highest buy order. Only the overview is required;
/// a missing buy order leaves that field empty.
pub async fn price_check<L: MarketLookup>(lookup: &L, item_name: &str) -> Result<PriceCheck> {
    let overview = lookup.fetch_price_overview(item_name).await?;
    if !overview.success.is_success() {
        return Err(MarketError::NotFound(item_name.to_string()));
    }

    let highest_buy_order = match get_highest_buy_order(lookup, item_name).await {
        Ok(price) => Some(price),
        Err(e) => {
            warn!("No buy order for {}: {}", item_name, e);
            None
        }
    };

    Ok(PriceCheck {
        name: item_name.to_string(),
        lowest_price: overview.lowest_price,
        volume: overview.volume,
        median_price: overview.median_price,
        highest_buy_order,
        checked_at: Utc::now(),
    })
}
