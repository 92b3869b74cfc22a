//! Primary/secondary price cross-check.

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{FeedError, FeedResult};
use crate::store::{constant_price, is_constant, PriceFeedStore};

/// Maximum relative divergence between primary and secondary feeds (3%).
pub const DEFAULT_MAX_DIVERGENCE: Decimal = Decimal::from_parts(3, 0, 0, false, 2);

/// Decides whether a market's feeds are trustworthy enough to quote on.
///
/// Fail-closed: a missing or non-positive price blocks the market, there is
/// no fallback to a previous good value.
#[derive(Debug, Clone)]
pub struct PriceValidator {
    max_divergence: Decimal,
}

impl Default for PriceValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIVERGENCE)
    }
}

impl PriceValidator {
    pub fn new(max_divergence: Decimal) -> Self {
        Self { max_divergence }
    }

    pub fn max_divergence(&self) -> Decimal {
        self.max_divergence
    }

    /// Validate the feeds of one market and return the primary (mid) price.
    ///
    /// # Errors
    /// - `FeedUnavailable` if a configured feed has no positive price
    /// - `CircuitBreaker` if `|primary - secondary| / primary` exceeds the limit
    pub fn validate(
        &self,
        store: &PriceFeedStore,
        primary: &str,
        secondary: Option<&str>,
    ) -> FeedResult<Decimal> {
        if is_constant(primary) {
            return constant_price(primary)
                .filter(|p| is_positive(*p))
                .ok_or_else(|| FeedError::FeedUnavailable(primary.to_string()));
        }

        let primary_price = store
            .get(primary)
            .filter(|p| is_positive(*p))
            .ok_or_else(|| FeedError::FeedUnavailable(primary.to_string()))?;

        let Some(secondary) = secondary else {
            return Ok(primary_price);
        };

        let secondary_price = store
            .get(secondary)
            .filter(|p| is_positive(*p))
            .ok_or_else(|| FeedError::FeedUnavailable(secondary.to_string()))?;

        let divergence = (primary_price - secondary_price).abs() / primary_price;
        if divergence > self.max_divergence {
            debug!(primary, secondary, %divergence, "feed divergence above limit");
            return Err(FeedError::CircuitBreaker {
                primary: primary_price,
                secondary: secondary_price,
                divergence,
            });
        }

        Ok(primary_price)
    }
}

fn is_positive(price: Decimal) -> bool {
    price > Decimal::ZERO
}
