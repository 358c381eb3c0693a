use regex::Regex;
use std::sync::OnceLock;

use crate::data::types::{OrderBookDocument, Price};
use crate::error::{MarketError, Result};

/// `$` then an integer part (optionally grouped with commas) then a decimal
/// point and at least two fractional digits. Whitespace between the symbol
/// and the number is tolerated.
fn price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\s*(\d{1,3}(?:,\d{3})+|\d+)\.(\d{2,})").expect("price pattern is valid")
    })
}

/// Every `$d.dd` amount found in `text`, in order of appearance.
pub fn extract_prices(text: &str) -> Vec<Price> {
    price_pattern()
        .captures_iter(text)
        .filter_map(|cap| {
            let integer = cap[1].replace(',', "");
            format!("{}.{}", integer, &cap[2])
                .parse::<f64>()
                .ok()
                .and_then(Price::new)
        })
        .collect()
}

/// Highest buy-order price in the document's order table.
///
/// Fails with `EmptyOrderBook` when the table holds no prices at all, so a
/// missing bid is never confused with a bid of zero.
pub fn extract_highest_buy_order(doc: &OrderBookDocument) -> Result<Price> {
    extract_prices(doc.table())
        .into_iter()
        .reduce(|best, price| if price > best { price } else { best })
        .ok_or(MarketError::EmptyOrderBook)
}
