//! Per-market quoting configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::order::Side;

/// Which side(s) the maker is willing to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SideBias {
    /// Maker only buys base.
    #[serde(rename = "b")]
    BuyOnly,
    /// Maker only sells base.
    #[serde(rename = "s")]
    SellOnly,
    #[default]
    #[serde(rename = "d")]
    Both,
}

impl SideBias {
    /// True if an incoming order on `order_side` must be refused.
    ///
    /// A buy-only maker cannot fill user buys (that would sell base) and
    /// vice versa.
    pub fn forbids(&self, order_side: Side) -> bool {
        matches!(
            (self, order_side),
            (SideBias::BuyOnly, Side::Buy) | (SideBias::SellOnly, Side::Sell)
        )
    }

    /// True if maker bids are published.
    pub fn quotes_bids(&self) -> bool {
        matches!(self, SideBias::BuyOnly | SideBias::Both)
    }

    /// True if maker asks are published.
    pub fn quotes_asks(&self) -> bool {
        matches!(self, SideBias::SellOnly | SideBias::Both)
    }
}

/// Quoting configuration for one market.
///
/// `min_spread`, `max_size` and `active` are mutated at runtime by post-fill
/// reactions; every such mutation is reverted by a scheduled timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairConfig {
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub side: SideBias,
    pub min_spread: Decimal,
    #[serde(default)]
    pub slippage_rate: Decimal,
    #[serde(default)]
    pub min_size: Decimal,
    pub max_size: Decimal,
    /// Feed id `provider:id`, e.g. `binance:ETHUSDT` or `constant:1`.
    #[serde(default)]
    pub price_feed_primary: String,
    #[serde(default)]
    pub price_feed_secondary: Option<String>,
    /// Cooldown in seconds after each confirmed fill.
    #[serde(default)]
    pub delay_after_fill: Option<u64>,
    /// `[spread delta, seconds]`.
    #[serde(default)]
    pub increase_spread_after_fill: Option<(Decimal, u64)>,
    /// `[max size delta, seconds]`.
    #[serde(default)]
    pub change_size_after_fill: Option<(Decimal, u64)>,
    /// Legacy pricing mode; `constant` together with `init_price` pins the mid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_price: Option<Decimal>,
}

fn default_active() -> bool {
    true
}

impl PairConfig {
    /// Rewrite legacy `mode = "constant"` pairs to a constant primary feed.
    pub fn normalize_legacy(&mut self) {
        if self.mode.as_deref() == Some("constant") {
            if let Some(price) = self.init_price {
                self.price_feed_primary = format!("constant:{price}");
            }
        }
    }

    /// Static sanity checks performed at startup.
    pub fn validate(&self, market_id: &str) -> Result<()> {
        if self.price_feed_primary.is_empty() {
            return Err(CoreError::InvalidConfig(format!(
                "{market_id}: price_feed_primary is required"
            )));
        }
        if self.min_spread.is_sign_negative() || self.slippage_rate.is_sign_negative() {
            return Err(CoreError::InvalidConfig(format!(
                "{market_id}: spread parameters must be non-negative"
            )));
        }
        if self.min_size > self.max_size {
            return Err(CoreError::InvalidConfig(format!(
                "{market_id}: min_size {} exceeds max_size {}",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }

    /// True if `base_quantity` lies within `[min_size, max_size]`.
    pub fn size_in_range(&self, base_quantity: Decimal) -> bool {
        base_quantity >= self.min_size && base_quantity <= self.max_size
    }
}
