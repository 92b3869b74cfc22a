//! Quote price calculation.
//!
//! Maker price for an incoming order of `base_quantity`:
//! - `spread = min_spread + slippage_rate * base_quantity`
//! - user buys (maker sells base): `quote = base * mid * (1 + spread) + quote_fee`
//! - user sells (maker buys base): `quote = (base - base_fee) * mid * (1 - spread)`
//!
//! The unit price is rounded to six significant figures.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use zz_core::{round_sig_figs, ChainId, Market, MarketId, PairConfig, Side, QUOTE_SIG_FIGS};
use zz_feed::{FeedError, PriceFeedStore, PriceValidator};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("Quote request for another chain")]
    BadChain,

    #[error("Market not quoted")]
    BadMarket,

    #[error("Side not quoted")]
    BadSide,

    #[error("Quantity must be positive")]
    BadQuantity,

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error("Amount is inadequate to pay fee")]
    InadequatePrice,

    #[error("Internal pricing error")]
    InternalPricingError,
}

pub type QuoteResult<T> = Result<T, QuoteError>;

/// Maker quote for one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Unit price (quote per base), six significant figures.
    pub price: Decimal,
    /// Quote asset amount exchanged for the base quantity.
    pub quote_quantity: Decimal,
}

/// Read-only view over the state needed to quote.
#[derive(Clone, Copy)]
pub struct QuoteGenerator<'a> {
    pub chain_id: ChainId,
    pub markets: &'a HashMap<MarketId, Market>,
    pub pairs: &'a BTreeMap<MarketId, PairConfig>,
    pub feeds: &'a PriceFeedStore,
    pub validator: &'a PriceValidator,
}

impl<'a> QuoteGenerator<'a> {
    /// Validated mid price for a configured pair.
    pub fn mid_price(&self, pair: &PairConfig) -> Result<Decimal, FeedError> {
        self.validator.validate(
            self.feeds,
            &pair.price_feed_primary,
            pair.price_feed_secondary.as_deref(),
        )
    }

    /// Quote `base_quantity` on `market_id` for an order on `side`.
    pub fn quote(
        &self,
        chain_id: ChainId,
        market_id: &str,
        side: Side,
        base_quantity: Decimal,
    ) -> QuoteResult<Quote> {
        if chain_id != self.chain_id {
            return Err(QuoteError::BadChain);
        }
        let (Some(market), Some(pair)) = (self.markets.get(market_id), self.pairs.get(market_id))
        else {
            return Err(QuoteError::BadMarket);
        };
        if pair.side.forbids(side) {
            return Err(QuoteError::BadSide);
        }
        if base_quantity <= Decimal::ZERO {
            return Err(QuoteError::BadQuantity);
        }

        let mid = self.mid_price(pair)?;
        compute_quote(market, pair, mid, side, base_quantity)
    }
}

/// Pure quote arithmetic.
pub fn compute_quote(
    market: &Market,
    pair: &PairConfig,
    mid: Decimal,
    side: Side,
    base_quantity: Decimal,
) -> QuoteResult<Quote> {
    let spread = pair
        .slippage_rate
        .checked_mul(base_quantity)
        .and_then(|slip| slip.checked_add(pair.min_spread))
        .ok_or(QuoteError::InternalPricingError)?;

    let quote_quantity = match side {
        Side::Buy => base_quantity
            .checked_mul(mid)
            .and_then(|q| Decimal::ONE.checked_add(spread).and_then(|m| q.checked_mul(m)))
            .and_then(|q| q.checked_add(market.quote_fee)),
        Side::Sell => base_quantity
            .checked_sub(market.base_fee)
            .and_then(|q| q.checked_mul(mid))
            .and_then(|q| Decimal::ONE.checked_sub(spread).and_then(|m| q.checked_mul(m))),
    }
    .ok_or(QuoteError::InternalPricingError)?;

    let price = quote_quantity
        .checked_div(base_quantity)
        .map(|p| round_sig_figs(p, QUOTE_SIG_FIGS))
        .ok_or(QuoteError::InternalPricingError)?;

    if price <= Decimal::ZERO {
        return Err(QuoteError::InadequatePrice);
    }

    Ok(Quote {
        price,
        quote_quantity,
    })
}
