use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::data::steam_api::listing_url;
use crate::data::types::{ListingRecord, MarketSnapshot, Price, PriceCheck};
use crate::error::MarketError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TRUNCATED: &str = "... (more items not shown)";

/// Renders chat messages. Knows nothing about how they are delivered.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    market_base_url: String,
    app_id: u32,
    max_message_len: usize,
}

impl MessageFormatter {
    pub fn new(market_base_url: String, app_id: u32, max_message_len: usize) -> Self {
        Self {
            market_base_url,
            app_id,
            max_message_len,
        }
    }

    pub fn listing_url(&self, item_name: &str) -> String {
        listing_url(&self.market_base_url, self.app_id, item_name)
    }

    fn listing_entry(&self, listing: &ListingRecord) -> String {
        format!(
            "📌 **{}**: {}\n{}\n",
            listing.name,
            listing.display_price(),
            self.listing_url(listing.url_name())
        )
    }

    /// Append entries until the message would reach the length cap
    fn push_entries<'a>(&self, message: &mut String, listings: impl Iterator<Item = &'a ListingRecord>) {
        for listing in listings {
            let entry = self.listing_entry(listing);
            if message.len() + entry.len() < self.max_message_len {
                message.push_str(&entry);
            } else {
                message.push_str(TRUNCATED);
                break;
            }
        }
    }

    pub fn new_listings(&self, listings: &[ListingRecord], at: DateTime<Utc>) -> String {
        let mut message = format!(
            "**Steam Market Update ({})** 🎮\nFound {} new items for AppID {}\n\n",
            at.format(TIMESTAMP_FORMAT),
            listings.len(),
            self.app_id
        );
        self.push_entries(&mut message, listings.iter());
        message
    }

    pub fn startup(&self, snapshot: Option<&MarketSnapshot>, recent_count: usize, at: DateTime<Utc>) -> String {
        let mut message = "🚀 **Steam Market Monitor Started** 🚀\n".to_string();

        let snapshot = match snapshot {
            Some(snapshot) if !snapshot.is_empty() => snapshot,
            _ => {
                message.push_str("❌ Failed to fetch market data or no items found.");
                return message;
            }
        };

        let recent = recent_listings(snapshot, recent_count);
        message.push_str(&format!(
            "**Most Recent Steam Market Items ({})** 🎮\nTotal items available: {}\nShowing {} most recent items:\n\n",
            at.format(TIMESTAMP_FORMAT),
            snapshot.len(),
            recent.len()
        ));
        self.push_entries(&mut message, recent.into_iter());
        message
    }

    /// Numbered search results, with an icon link under each when known
    pub fn search_results(&self, query: &str, matches: &[&str], shown: &[(String, Option<String>)]) -> String {
        if matches.is_empty() {
            return format!("No items found matching '{}'.", query);
        }

        let mut message = format!("Found {} items matching '{}'", matches.len(), query);
        if matches.len() > shown.len() {
            message.push_str(&format!(", showing first {}:\n", shown.len()));
        } else {
            message.push_str(":\n");
        }

        for (i, (name, icon)) in shown.iter().enumerate() {
            message.push_str(&format!("{}. {}\n", i + 1, name));
            if let Some(icon) = icon {
                message.push_str(&format!("   icon: {}\n", icon));
            }
        }
        message
    }

    pub fn price_check(&self, check: &PriceCheck, icon: Option<&str>) -> String {
        let mut message = format!("**Steam Market Price: {}**\n", check.name);
        message.push_str(&format!("Lowest Price: {}\n", or_na(check.lowest_price.as_deref())));
        message.push_str(&format!("Volume (24h): {}\n", or_na(check.volume.as_deref())));
        message.push_str(&format!("Median Price: {}\n", or_na(check.median_price.as_deref())));
        message.push_str(&format!(
            "Max Buy Order: {}\n",
            check
                .highest_buy_order
                .map(|p| format!("USD${}", p))
                .unwrap_or_else(|| "N/A".to_string())
        ));
        message.push_str(&format!("{}\n", self.listing_url(&check.name)));
        if let Some(icon) = icon {
            message.push_str(&format!("Icon: {}\n", icon));
        }
        message.push_str(&format!("Checked at {}", check.checked_at.format(TIMESTAMP_FORMAT)));
        message
    }

    pub fn buy_order(&self, item_name: &str, price: Price) -> String {
        format!("Max Buy Order for {}: USD${}", item_name, price)
    }

    pub fn failure(&self, item_name: &str, error: &MarketError) -> String {
        error.user_message(item_name)
    }
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

/// Newest `count` listings: by `listingdate` when the market provides one,
/// otherwise in upstream order.
pub fn recent_listings(snapshot: &MarketSnapshot, count: usize) -> Vec<&ListingRecord> {
    let mut listings: Vec<&ListingRecord> = snapshot.results.iter().collect();

    let dated = listings.first().map(|l| l.listing_date().is_some()).unwrap_or(false);
    if dated {
        listings.sort_by(|a, b| {
            let a = a.listing_date().unwrap_or(0.0);
            let b = b.listing_date().unwrap_or(0.0);
            b.partial_cmp(&a).unwrap_or(Ordering::Equal)
        });
    }

    listings.truncate(count);
    listings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn formatter(max_len: usize) -> MessageFormatter {
        MessageFormatter::new("https://steamcommunity.com".to_string(), 216150, max_len)
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 20, 14, 5, 0).unwrap()
    }

    #[test]
    fn test_new_listings_message() {
        let message = formatter(1900).new_listings(
            &[ListingRecord::new("Amber Ring").with_sell_price(99), ListingRecord::new("Odd Cap")],
            at(),
        );

        assert!(message.starts_with("**Steam Market Update (2025-03-20 14:05:00)** 🎮\nFound 2 new items for AppID 216150"));
        assert!(message.contains("📌 **Amber Ring**: $0.99\nhttps://steamcommunity.com/market/listings/216150/Amber%20Ring\n"));
        assert!(message.contains("📌 **Odd Cap**: N/A\n"));
        assert!(!message.contains(TRUNCATED));
    }

    #[test]
    fn test_new_listings_truncated_under_limit() {
        let listings: Vec<ListingRecord> = (0..100)
            .map(|i| ListingRecord::new(format!("Very Long Item Name Number {}", i)).with_sell_price(i))
            .collect();

        let message = formatter(1900).new_listings(&listings, at());
        assert!(message.ends_with(TRUNCATED));
        assert!(message.len() < 1900 + TRUNCATED.len());
        assert!(message.contains("Found 100 new items"));
    }

    #[test]
    fn test_recent_listings_by_date() {
        let mut a = ListingRecord::new("A");
        a.raw.insert("listingdate".into(), serde_json::json!(100));
        let mut b = ListingRecord::new("B");
        b.raw.insert("listingdate".into(), serde_json::json!(300));
        let mut c = ListingRecord::new("C");
        c.raw.insert("listingdate".into(), serde_json::json!("200"));
        let snapshot = MarketSnapshot::from_listings(vec![a, b, c]);

        let names: Vec<&str> = recent_listings(&snapshot, 2).iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
    }

    #[test]
    fn test_recent_listings_upstream_order_without_dates() {
        let snapshot = MarketSnapshot::from_listings(
            ["C", "A", "B"].iter().map(|n| ListingRecord::new(*n)).collect(),
        );
        let names: Vec<&str> = recent_listings(&snapshot, 5).iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_startup_message() {
        let snapshot = MarketSnapshot::from_listings(vec![ListingRecord::new("A"), ListingRecord::new("B")]);
        let message = formatter(1900).startup(Some(&snapshot), 1, at());
        assert!(message.contains("Total items available: 2"));
        assert!(message.contains("Showing 1 most recent items"));
        assert!(message.contains("**A**"));
        assert!(!message.contains("**B**"));

        let failed = formatter(1900).startup(None, 5, at());
        assert!(failed.contains("Failed to fetch market data"));
    }

    #[test]
    fn test_search_results() {
        let f = formatter(1900);
        assert_eq!(f.search_results("boots", &[], &[]), "No items found matching 'boots'.");

        let matches = ["Red Cap", "Blue Cap", "Green Cap"];
        let shown = vec![
            ("Red Cap".to_string(), Some("https://icons/1".to_string())),
            ("Blue Cap".to_string(), None),
        ];
        let message = f.search_results("cap", &matches, &shown);
        assert!(message.starts_with("Found 3 items matching 'cap', showing first 2:\n"));
        assert!(message.contains("1. Red Cap\n   icon: https://icons/1\n"));
        assert!(message.contains("2. Blue Cap\n"));
        assert!(!message.contains("Green Cap"));
    }

    #[test]
    fn test_price_check_fields_fall_back_to_na() {
        let check = PriceCheck {
            name: "Amber Ring".to_string(),
            lowest_price: Some("$0.99".to_string()),
            volume: None,
            median_price: None,
            highest_buy_order: Price::new(0.75),
            checked_at: at(),
        };

        let message = formatter(1900).price_check(&check, None);
        assert!(message.contains("Lowest Price: $0.99\n"));
        assert!(message.contains("Volume (24h): N/A\n"));
        assert!(message.contains("Median Price: N/A\n"));
        assert!(message.contains("Max Buy Order: USD$0.75\n"));
        assert!(!message.contains("Icon:"));

        let no_bid = PriceCheck {
            highest_buy_order: None,
            ..check
        };
        assert!(formatter(1900).price_check(&no_bid, Some("x")).contains("Max Buy Order: N/A\n"));
    }

    #[test]
    fn test_failure_message() {
        let message = formatter(1900).failure("Dusk Sword", &MarketError::EmptyOrderBook);
        assert_eq!(message, "could not retrieve data for `Dusk Sword`");
    }
}
