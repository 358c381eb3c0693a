use regex::Regex;
use reqwest::header::COOKIE;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

use crate::config::{LookupConfig, MarketConfig};
use crate::data::lookup::{retry_rate_limited, MarketLookup, RetryPolicy};
use crate::data::types::{ItemNameId, ListingRecord, OrderBookDocument, PriceOverview, SuccessFlag};
use crate::error::{MarketError, Result};

/// Steam Community Market client.
///
/// All endpoint shapes live here; callers only see typed records.
pub struct SteamMarketClient {
    client: Client,
    base_url: String,
    app_id: u32,
    country: String,
    language: String,
    currency: u32,
    search_count: u32,
    cookie: Option<String>,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    success: SuccessFlag,
    #[serde(default)]
    total_count: Option<u64>,
    #[serde(default)]
    results: Option<Vec<ListingRecord>>,
}

fn order_spread_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Market_LoadOrderSpread\(\s*([^)]*?)\s*\)").expect("order spread pattern is valid")
    })
}

pub fn listing_url(base_url: &str, app_id: u32, item_name: &str) -> String {
    format!(
        "{}/market/listings/{}/{}",
        base_url.trim_end_matches('/'),
        app_id,
        urlencoding::encode(item_name)
    )
}

/// Pull `item_nameid` out of a listing page's inline script.
pub fn scrape_item_nameid(page: &str, item_name: &str) -> Result<ItemNameId> {
    let cap = order_spread_pattern()
        .captures(page)
        .ok_or_else(|| MarketError::NotFound(item_name.to_string()))?;

    cap[1].parse().map_err(|_| {
        MarketError::LookupFailed(format!("unexpected item_nameid '{}' for {}", &cap[1], item_name))
    })
}

impl SteamMarketClient {
    pub fn new(market: &MarketConfig, lookup: &LookupConfig, cookie: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(lookup.timeout_secs))
            .user_agent(market.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: market.base_url.trim_end_matches('/').to_string(),
            app_id: market.app_id,
            country: market.country.clone(),
            language: market.language.clone(),
            currency: market.currency,
            search_count: market.search_count,
            cookie,
            retry: RetryPolicy::from(lookup),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Public listing page for an item; also the page the item id is scraped from
    pub fn listing_url(&self, item_name: &str) -> String {
        listing_url(&self.base_url, self.app_id, item_name)
    }

    /// GET with the market's rate-limit handling applied
    async fn get(&self, url: &str, query: &[(&str, String)], what: &str) -> Result<Response> {
        retry_rate_limited(&self.retry, what, move || async move {
            let mut request = self.client.get(url).query(query);
            if let Some(cookie) = &self.cookie {
                request = request.header(COOKIE, cookie);
            }

            let response = request.send().await?;
            check_status(response, what)
        })
        .await
    }
}

fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(MarketError::RateLimited { attempts: 1 });
    }

    if !status.is_success() {
        return Err(MarketError::LookupFailed(format!("{} returned status {}", what, status)));
    }

    Ok(response)
}

async fn parse_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| MarketError::LookupFailed(format!("malformed {} response: {}", what, e)))
}

impl MarketLookup for SteamMarketClient {
    async fn fetch_item_identifier(&self, item_name: &str) -> Result<ItemNameId> {
        let url = self.listing_url(item_name);
        let page = self.get(&url, &[], "listing page").await?.text().await?;

        let id = scrape_item_nameid(&page, item_name)?;
        debug!("item_nameid for {}: {}", item_name, id);
        Ok(id)
    }

    async fn fetch_order_book(&self, item_id: ItemNameId) -> Result<OrderBookDocument> {
        let url = format!("{}/market/itemordershistogram", self.base_url);
        let query = [
            ("country", self.country.clone()),
            ("language", self.language.clone()),
            ("currency", self.currency.to_string()),
            ("item_nameid", item_id.to_string()),
            ("two_factor", "0".to_string()),
        ];

        let response = self.get(&url, &query, "order histogram").await?;
        parse_json(response, "order histogram").await
    }

    async fn fetch_market_listings(&self) -> Result<Vec<ListingRecord>> {
        let url = format!("{}/market/search/render/", self.base_url);
        let query = [
            ("appid", self.app_id.to_string()),
            ("norender", "1".to_string()),
            ("count", self.search_count.to_string()),
        ];

        let response = self.get(&url, &query, "market search").await?;
        let search: SearchResponse = parse_json(response, "market search").await?;

        if !search.success.is_success() {
            return Err(MarketError::LookupFailed("market search unsuccessful".to_string()));
        }

        let results = search
            .results
            .ok_or_else(|| MarketError::LookupFailed("market search returned no results field".to_string()))?;

        debug!(
            "Market search returned {} listings (total_count={:?})",
            results.len(),
            search.total_count
        );
        Ok(results)
    }

    async fn fetch_price_overview(&self, item_name: &str) -> Result<PriceOverview> {
        let url = format!("{}/market/priceoverview/", self.base_url);
        let query = [
            ("appid", self.app_id.to_string()),
            ("currency", self.currency.to_string()),
            ("market_hash_name", item_name.to_string()),
        ];

        let response = self.get(&url, &query, "price overview").await?;
        parse_json(response, "price overview").await
    }
}
