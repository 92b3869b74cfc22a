//! Exchange market metadata.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::MarketId;

/// One side of a market's asset pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Ticker, e.g. `ETH`.
    pub symbol: String,
    /// Decimal places of the on-chain representation.
    pub decimals: u32,
    /// Settlement-layer token id.
    #[serde(default)]
    pub id: u64,
}

impl AssetInfo {
    pub fn new(symbol: impl Into<String>, decimals: u32, id: u64) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            id,
        }
    }
}

/// Market description as announced by the exchange (`marketinfo`).
///
/// Fees are flat amounts denominated in the respective asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub base: AssetInfo,
    pub quote: AssetInfo,
    pub base_fee: Decimal,
    pub quote_fee: Decimal,
}

impl Market {
    /// True if fees differ from `other`.
    pub fn fees_changed(&self, other: &Self) -> bool {
        self.base_fee != other.base_fee || self.quote_fee != other.quote_fee
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eth_usdc(quote_fee: Decimal) -> Market {
        Market {
            id: "ETH-USDC".to_string(),
            base: AssetInfo::new("ETH", 18, 0),
            quote: AssetInfo::new("USDC", 6, 2),
            base_fee: dec!(0.0003),
            quote_fee,
        }
    }

    #[test]
    fn test_fees_changed() {
        let a = eth_usdc(dec!(1));
        let b = eth_usdc(dec!(1.2));
        assert!(a.fees_changed(&b));
        assert!(!a.fees_changed(&a.clone()));
    }
}
