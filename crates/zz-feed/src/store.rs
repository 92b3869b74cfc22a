//! Last-price store keyed by feed id.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::trace;

use crate::feed_id::FeedId;

const CONSTANT_PROVIDER: &str = "constant";

/// Latest price per feed id.
///
/// Constant feeds (`constant:<price>`) are answered from the id itself and
/// can never be overwritten.
#[derive(Debug, Default, Clone)]
pub struct PriceFeedStore {
    prices: HashMap<String, Decimal>,
}

impl PriceFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current price for `feed_id`, if one has been observed.
    pub fn get(&self, feed_id: &str) -> Option<Decimal> {
        if let Some(constant) = constant_price(feed_id) {
            return Some(constant);
        }
        self.prices.get(feed_id).copied()
    }

    /// Record an observation. Writes to constant feeds are ignored.
    pub fn set(&mut self, feed_id: &str, price: Decimal) {
        if is_constant(feed_id) {
            return;
        }
        trace!(feed_id, %price, "price update");
        self.prices.insert(feed_id.to_string(), price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Provider names are case-insensitive, as in `FeedId::parse`.
pub(crate) fn is_constant(feed_id: &str) -> bool {
    feed_id
        .split_once(':')
        .is_some_and(|(provider, _)| provider.eq_ignore_ascii_case(CONSTANT_PROVIDER))
}

pub(crate) fn constant_price(feed_id: &str) -> Option<Decimal> {
    FeedId::parse(feed_id).ok()?.constant()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_set_and_get() {
        let mut store = PriceFeedStore::new();
        assert_eq!(store.get("binance:ETHUSDT"), None);

        store.set("binance:ETHUSDT", dec!(2000));
        store.set("binance:ETHUSDT", dec!(2001.5));
        assert_eq!(store.get("binance:ETHUSDT"), Some(dec!(2001.5)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_constant_feeds_are_immutable() {
        let mut store = PriceFeedStore::new();
        assert_eq!(store.get("constant:1"), Some(dec!(1)));

        store.set("constant:1", dec!(5));
        assert_eq!(store.get("constant:1"), Some(dec!(1)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_constant_provider_any_case() {
        let mut store = PriceFeedStore::new();
        assert_eq!(store.get("Constant:5"), Some(dec!(5)));
        assert_eq!(store.get("CONSTANT:0.5"), Some(dec!(0.5)));

        store.set("Constant:5", dec!(7));
        assert_eq!(store.get("Constant:5"), Some(dec!(5)));
        assert!(store.is_empty());
    }
}
