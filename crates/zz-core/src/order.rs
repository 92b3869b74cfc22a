//! Order book vocabulary: sides, incoming orders, liquidity ladder entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::{ChainId, MarketId, OrderId};

/// Order side from the order owner's perspective.
///
/// An order with side `Buy` is the user buying base, so the maker sells base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "b")]
    Buy,
    #[serde(rename = "s")]
    Sell,
}

impl Side {
    /// Wire letter (`b` / `s`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "b",
            Side::Sell => "s",
        }
    }

    /// Parse the wire letter.
    pub fn from_wire(s: &str) -> Result<Self> {
        match s {
            "b" => Ok(Side::Buy),
            "s" => Ok(Side::Sell),
            other => Err(CoreError::InvalidSide(other.to_string())),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order published on the exchange book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOrder {
    pub chain_id: ChainId,
    pub order_id: OrderId,
    pub market_id: MarketId,
    pub side: Side,
    /// Limit price (quote per base).
    pub price: Decimal,
    pub base_quantity: Decimal,
    pub quote_quantity: Decimal,
    /// Unix seconds.
    pub expires: u64,
}

impl ExchangeOrder {
    /// True once `now_secs` is past the order expiry.
    pub fn is_expired(&self, now_secs: u64) -> bool {
        now_secs > self.expires
    }
}

/// One rung of the published liquidity ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityEntry {
    /// `Buy` entries are maker bids, `Sell` entries are maker asks.
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    /// Unix seconds.
    pub expires: u64,
}
