use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::data::cache::PriceCheckCache;
use crate::data::catalog::ItemCatalog;
use crate::data::icons::IconClient;
use crate::data::lookup::{get_highest_buy_order, price_check, MarketLookup};
use crate::error::MarketError;
use crate::monitoring::logger::CsvLogger;
use crate::notify::format::MessageFormatter;

/// Answers user requests (search, price, buy order) with ready-to-send text.
pub struct CommandHandler<L> {
    lookup: Arc<L>,
    catalog: ItemCatalog,
    icons: Option<IconClient>,
    cache: PriceCheckCache,
    formatter: MessageFormatter,
    search_limit: usize,
    event_log: Option<Arc<CsvLogger>>,
}

impl<L: MarketLookup> CommandHandler<L> {
    pub fn new(
        lookup: Arc<L>,
        catalog: ItemCatalog,
        formatter: MessageFormatter,
        search_limit: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            lookup,
            catalog,
            icons: None,
            cache: PriceCheckCache::new(cache_ttl),
            formatter,
            search_limit,
            event_log: None,
        }
    }

    pub fn with_icons(mut self, icons: IconClient) -> Self {
        self.icons = Some(icons);
        self
    }

    pub fn with_event_log(mut self, logger: Arc<CsvLogger>) -> Self {
        self.event_log = Some(logger);
        self
    }

    pub async fn search(&self, query: &str) -> String {
        let matches = self.catalog.search(query);
        let shown: Vec<&str> = matches.iter().copied().take(self.search_limit).collect();

        let icons = match &self.icons {
            Some(client) => join_all(shown.iter().map(|name| client.icon_url(name))).await,
            None => vec![None; shown.len()],
        };

        let shown: Vec<(String, Option<String>)> = shown
            .into_iter()
            .map(str::to_string)
            .zip(icons)
            .collect();

        self.formatter.search_results(query, &matches, &shown)
    }

    pub async fn price(&self, item_name: &str) -> String {
        let item_name = item_name.trim();

        let check = match self.cache.get(item_name) {
            Some(check) => check,
            None => match price_check(self.lookup.as_ref(), item_name).await {
                Ok(check) => {
                    info!("Price check for {} complete", item_name);
                    self.cache.insert(check.clone());
                    check
                }
                Err(e) => {
                    log_failure("Price check", item_name, &e);
                    return self.formatter.failure(item_name, &e);
                }
            },
        };

        if let Some(logger) = &self.event_log {
            if let Err(e) = logger.log_price_check(&check) {
                warn!("Failed to write event log: {:#}", e);
            }
        }

        let icon = match &self.icons {
            Some(client) => client.icon_url(item_name).await,
            None => None,
        };
        self.formatter.price_check(&check, icon.as_deref())
    }

    pub async fn buy_order(&self, item_name: &str) -> String {
        let item_name = item_name.trim();
        match get_highest_buy_order(self.lookup.as_ref(), item_name).await {
            Ok(price) => self.formatter.buy_order(item_name, price),
            Err(e) => {
                log_failure("Buy order lookup", item_name, &e);
                self.formatter.failure(item_name, &e)
            }
        }
    }
}

/// Unknown items and empty books are user input, not faults
fn log_failure(what: &str, item_name: &str, error: &MarketError) {
    if error.is_absence() {
        info!("{} for {}: {}", what, item_name, error);
    } else {
        warn!("{} for {} failed: {}", what, item_name, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::lookup::tests::FakeLookup;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TABLE: &str = "<table><tr><td>$0.41</td><td>5</td></tr><tr><td>$0.38</td><td>2</td></tr></table>";

    fn handler(lookup: FakeLookup, items: &[&str]) -> CommandHandler<FakeLookup> {
        CommandHandler::new(
            Arc::new(lookup),
            ItemCatalog::new(items.iter().map(|s| s.to_string()).collect()),
            MessageFormatter::new("https://steamcommunity.com".to_string(), 216150, 1900),
            2,
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_search_limits_results() {
        let handler = handler(FakeLookup::default(), &["Red Cap", "Blue Cap", "Green Cap", "Boots"]);

        let reply = handler.search("CAP").await;
        assert!(reply.starts_with("Found 3 items matching 'CAP', showing first 2:"));
        assert!(reply.contains("1. Red Cap"));
        assert!(!reply.contains("Green Cap"));

        assert_eq!(handler.search("gloves").await, "No items found matching 'gloves'.");
    }

    #[tokio::test]
    async fn test_search_attaches_icons() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": 42}])))
            .mount(&server)
            .await;

        let handler = handler(FakeLookup::default(), &["Boots"]).with_icons(IconClient::new(server.uri()));
        let reply = handler.search("boots").await;

        assert!(reply.contains(&format!("icon: {}/item/42/iconRaw", server.uri())));
    }

    #[tokio::test]
    async fn test_buy_order_reply() {
        let lookup = FakeLookup::default().with_item("Dusk Sword", 7, TABLE);
        let handler = handler(lookup, &[]);

        assert_eq!(handler.buy_order(" Dusk Sword ").await, "Max Buy Order for Dusk Sword: USD$0.41");
        assert_eq!(
            handler.buy_order("Unknown").await,
            "could not retrieve data for `Unknown`"
        );
    }

    #[tokio::test]
    async fn test_price_reply_and_cache() {
        let lookup = FakeLookup::default()
            .with_item("Dusk Sword", 7, TABLE)
            .with_overview("Dusk Sword", "$0.55");
        let handler = handler(lookup, &[]);

        let reply = handler.price("Dusk Sword").await;
        assert!(reply.contains("Lowest Price: $0.55"));
        assert!(reply.contains("Max Buy Order: USD$0.41"));
        assert_eq!(handler.cache.len(), 1);

        // Served from cache on the second request
        assert_eq!(handler.price("dusk sword").await.lines().nth(1), reply.lines().nth(1));
    }

    #[tokio::test]
    async fn test_price_unknown_item() {
        let handler = handler(FakeLookup::default(), &[]);
        assert_eq!(handler.price("Nothing").await, "could not retrieve data for `Nothing`");
        assert!(handler.cache.is_empty());
    }
}
