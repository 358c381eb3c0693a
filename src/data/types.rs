use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Non-negative currency amount as rendered by the market (two decimals).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Build from an integer amount of cents, as the search endpoint reports it
    pub fn from_cents(cents: u64) -> Self {
        Self(cents as f64 / 100.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Internal catalog identifier (`item_nameid`) scraped from a listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemNameId(pub u64);

impl fmt::Display for ItemNameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemNameId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ItemNameId)
    }
}

/// The market reports success as `true` on some endpoints and `1` on others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuccessFlag {
    Bool(bool),
    Int(i64),
}

impl SuccessFlag {
    pub fn is_success(&self) -> bool {
        match self {
            SuccessFlag::Bool(b) => *b,
            SuccessFlag::Int(i) => *i == 1,
        }
    }
}

impl Default for SuccessFlag {
    fn default() -> Self {
        SuccessFlag::Bool(false)
    }
}

/// One row of the market search results.
///
/// Known fields are typed; everything else the market sends is kept in `raw`
/// so a persisted snapshot round-trips without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_listings: Option<u64>,
    /// Lowest ask in cents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_price: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sell_price_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_price_text: Option<String>,
    #[serde(flatten)]
    pub raw: Map<String, Value>,
}

impl ListingRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hash_name: None,
            sell_listings: None,
            sell_price: None,
            sell_price_text: None,
            sale_price_text: None,
            raw: Map::new(),
        }
    }

    pub fn with_sell_price(mut self, cents: u64) -> Self {
        self.sell_price = Some(cents);
        self.sell_price_text = Some(format!("${}", Price::from_cents(cents)));
        self
    }

    pub fn price(&self) -> Option<Price> {
        self.sell_price.map(Price::from_cents)
    }

    pub fn display_price(&self) -> String {
        match (&self.sell_price_text, self.price()) {
            (Some(text), _) => text.clone(),
            (None, Some(price)) => format!("${}", price),
            (None, None) => "N/A".to_string(),
        }
    }

    /// Name used in listing URLs; the market keys listings by hash name.
    pub fn url_name(&self) -> &str {
        self.hash_name.as_deref().unwrap_or(&self.name)
    }

    /// Listing date, when the market includes one in the raw payload
    pub fn listing_date(&self) -> Option<f64> {
        self.raw.get("listingdate").and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
    }
}

/// Point-in-time capture of all listings, keyed by name in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub results: Vec<ListingRecord>,
    #[serde(default, with = "last_check_format")]
    pub last_check: Option<DateTime<Utc>>,
}

impl MarketSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from upstream rows, keeping the first row seen for each name.
    pub fn from_listings(listings: Vec<ListingRecord>) -> Self {
        let mut seen = HashSet::new();
        let results = listings
            .into_iter()
            .filter(|listing| seen.insert(listing.name.clone()))
            .collect();

        Self {
            results,
            last_check: None,
        }
    }

    pub fn with_last_check(mut self, at: DateTime<Utc>) -> Self {
        self.last_check = Some(at);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn get(&self, name: &str) -> Option<&ListingRecord> {
        self.results.iter().find(|listing| listing.name == name)
    }
}

/// `last_check` is written as RFC 3339 but older state files carry
/// `%Y-%m-%d %H:%M:%S` local stamps, which are read as UTC.
mod last_check_format {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| parse(&s).map_err(serde::de::Error::custom))
            .transpose()
    }

    pub fn parse(s: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(s, LEGACY_FORMAT)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(|e| format!("invalid last_check '{}': {}", s, e))
    }
}

/// Order-book payload for one item.
///
/// Only `buy_order_table` is scanned for prices; it is an HTML fragment
/// with the prices embedded as `$12.34` strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBookDocument {
    #[serde(default)]
    pub success: SuccessFlag,
    #[serde(default)]
    pub buy_order_table: Option<String>,
    #[serde(default)]
    pub buy_order_graph: Option<Vec<Value>>,
    #[serde(default)]
    pub highest_buy_order: Option<String>,
    #[serde(default)]
    pub lowest_sell_order: Option<String>,
}

impl OrderBookDocument {
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            success: SuccessFlag::Int(1),
            buy_order_table: Some(table.into()),
            ..Default::default()
        }
    }

    pub fn table(&self) -> &str {
        self.buy_order_table.as_deref().unwrap_or("")
    }

    pub fn has_buy_orders(&self) -> bool {
        self.buy_order_graph
            .as_ref()
            .map(|graph| !graph.is_empty())
            .unwrap_or(false)
    }
}

/// Summary figures from the price overview endpoint, all optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceOverview {
    #[serde(default)]
    pub success: SuccessFlag,
    #[serde(default)]
    pub lowest_price: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub median_price: Option<String>,
}

/// Everything shown for one "price check" request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceCheck {
    pub name: String,
    pub lowest_price: Option<String>,
    pub volume: Option<String>,
    pub median_price: Option<String>,
    pub highest_buy_order: Option<Price>,
    pub checked_at: DateTime<Utc>,
}
