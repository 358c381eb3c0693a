use std::collections::HashMap;

use crate::data::types::{ListingRecord, MarketSnapshot};

/// Knobs for what counts as "new" between two snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiffOptions {
    /// Also report known listings whose lowest ask moved by strictly more
    /// than this many currency units. Compared in whole cents. `None`
    /// reports only unseen names.
    pub price_change_threshold: Option<f64>,
}

/// Listings in `current` that `previous` has not seen, in `current`'s order.
///
/// An empty side yields nothing: without a baseline every listing would look
/// new, so the first cycle only establishes one.
pub fn diff(previous: &MarketSnapshot, current: &MarketSnapshot) -> Vec<ListingRecord> {
    diff_with(previous, current, &DiffOptions::default())
}

pub fn diff_with(
    previous: &MarketSnapshot,
    current: &MarketSnapshot,
    options: &DiffOptions,
) -> Vec<ListingRecord> {
    if previous.is_empty() || current.is_empty() {
        return Vec::new();
    }

    let known: HashMap<&str, &ListingRecord> = previous
        .results
        .iter()
        .map(|listing| (listing.name.as_str(), listing))
        .collect();

    current
        .results
        .iter()
        .filter(|listing| match known.get(listing.name.as_str()) {
            None => true,
            Some(old) => options
                .price_change_threshold
                .map(|threshold| price_moved(old, listing, threshold))
                .unwrap_or(false),
        })
        .cloned()
        .collect()
}

fn price_moved(old: &ListingRecord, new: &ListingRecord, threshold: f64) -> bool {
    let threshold_cents = (threshold * 100.0).round().max(0.0) as u64;
    match (old.sell_price, new.sell_price) {
        (Some(old), Some(new)) => old.abs_diff(new) > threshold_cents,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(names: &[&str]) -> MarketSnapshot {
        MarketSnapshot::from_listings(names.iter().map(|n| ListingRecord::new(*n)).collect())
    }

    fn names(listings: &[ListingRecord]) -> Vec<&str> {
        listings.iter().map(|l| l.name.as_str()).collect()
    }

    #[test]
    fn test_single_addition() {
        let result = diff(&snapshot(&["A", "B"]), &snapshot(&["A", "B", "C"]));
        assert_eq!(names(&result), vec!["C"]);
    }

    #[test]
    fn test_empty_previous_is_conservative() {
        assert!(diff(&snapshot(&[]), &snapshot(&["A"])).is_empty());
        assert!(diff(&MarketSnapshot::empty(), &snapshot(&["A", "B", "C"])).is_empty());
    }

    #[test]
    fn test_empty_current() {
        assert!(diff(&snapshot(&["A"]), &snapshot(&[])).is_empty());
    }

    #[test]
    fn test_identical_snapshots() {
        let s = snapshot(&["A", "B", "C"]);
        assert!(diff(&s, &s).is_empty());
    }

    #[test]
    fn test_disjoint_keeps_current_order() {
        let result = diff(&snapshot(&["X", "Y"]), &snapshot(&["C", "A", "B"]));
        assert_eq!(names(&result), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_removed_listings_are_not_reported() {
        let result = diff(&snapshot(&["A", "B", "C"]), &snapshot(&["B", "D"]));
        assert_eq!(names(&result), vec!["D"]);
    }

    #[test]
    fn test_price_change_ignored_by_default() {
        let previous = MarketSnapshot::from_listings(vec![ListingRecord::new("A").with_sell_price(100)]);
        let current = MarketSnapshot::from_listings(vec![ListingRecord::new("A").with_sell_price(900)]);
        assert!(diff(&previous, &current).is_empty());
    }

    #[test]
    fn test_price_change_threshold() {
        let previous = MarketSnapshot::from_listings(vec![
            ListingRecord::new("A").with_sell_price(100),
            ListingRecord::new("B").with_sell_price(100),
            ListingRecord::new("C"),
        ]);
        let current = MarketSnapshot::from_listings(vec![
            ListingRecord::new("A").with_sell_price(350),
            ListingRecord::new("B").with_sell_price(150),
            ListingRecord::new("C").with_sell_price(10_000),
            ListingRecord::new("D"),
        ]);
        let options = DiffOptions {
            price_change_threshold: Some(1.0),
        };

        let result = diff_with(&previous, &current, &options);
        // C had no previous price to compare against
        assert_eq!(names(&result), vec!["A", "D"]);
    }

    fn moved(from: u64, to: u64, threshold: f64) -> bool {
        let previous = MarketSnapshot::from_listings(vec![ListingRecord::new("A").with_sell_price(from)]);
        let current = MarketSnapshot::from_listings(vec![ListingRecord::new("A").with_sell_price(to)]);
        let options = DiffOptions {
            price_change_threshold: Some(threshold),
        };
        !diff_with(&previous, &current, &options).is_empty()
    }

    #[test]
    fn test_exact_threshold_move_is_never_reported() {
        for from in 0..5000 {
            assert!(!moved(from, from + 100, 1.0), "up from {} cents", from);
            assert!(moved(from, from + 101, 1.0), "up one past from {} cents", from);
        }
        for from in 100..5000 {
            assert!(!moved(from, from - 100, 1.0), "down from {} cents", from);
        }
    }

    #[test]
    fn test_fractional_threshold_rounds_to_cents() {
        assert!(!moved(110, 135, 0.25));
        assert!(moved(110, 136, 0.25));
        assert!(!moved(1999, 2009, 0.1));
        assert!(moved(1999, 2010, 0.1));
    }

    #[test]
    fn test_inputs_are_untouched() {
        let previous = snapshot(&["A"]);
        let current = snapshot(&["A", "B"]);
        let before = (previous.clone(), current.clone());
        let _ = diff(&previous, &current);
        assert_eq!((previous, current), before);
    }
}
