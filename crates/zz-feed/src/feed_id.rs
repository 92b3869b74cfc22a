//! Feed identifiers of the form `provider:id`.

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use crate::error::{FeedError, FeedResult};

/// Supported price providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedProvider {
    /// Fixed price embedded in the id.
    Constant(Decimal),
    /// Binance trade stream, id is the symbol (`ETHUSDT`).
    Binance,
    /// Binance REST ticker polled on an interval.
    BinanceRest,
}

/// Parsed feed id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedId {
    pub provider: FeedProvider,
    /// Provider-specific identifier (symbol, or the constant text).
    pub id: String,
}

impl FeedId {
    pub fn parse(raw: &str) -> FeedResult<Self> {
        let (provider, id) = raw
            .split_once(':')
            .ok_or_else(|| FeedError::InvalidFeedId(raw.to_string()))?;
        if id.is_empty() {
            return Err(FeedError::InvalidFeedId(raw.to_string()));
        }

        let provider = match provider.to_lowercase().as_str() {
            "constant" => {
                let price = Decimal::from_str(id)
                    .map_err(|_| FeedError::InvalidFeedId(raw.to_string()))?;
                FeedProvider::Constant(price)
            }
            "binance" => FeedProvider::Binance,
            "binancerest" => FeedProvider::BinanceRest,
            other => return Err(FeedError::UnknownProvider(other.to_string())),
        };

        Ok(Self {
            provider,
            id: id.to_string(),
        })
    }

    /// The constant price, if this is a constant feed.
    pub fn constant(&self) -> Option<Decimal> {
        match self.provider {
            FeedProvider::Constant(price) => Some(price),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.constant().is_some()
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let provider = match self.provider {
            FeedProvider::Constant(_) => "constant",
            FeedProvider::Binance => "binance",
            FeedProvider::BinanceRest => "binancerest",
        };
        write!(f, "{provider}:{}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_constant() {
        let feed = FeedId::parse("constant:1.0005").unwrap();
        assert_eq!(feed.constant(), Some(dec!(1.0005)));
        assert_eq!(feed.to_string(), "constant:1.0005");
    }

    #[test]
    fn test_parse_binance() {
        let feed = FeedId::parse("binance:ETHUSDT").unwrap();
        assert_eq!(feed.provider, FeedProvider::Binance);
        assert_eq!(feed.id, "ETHUSDT");
        assert!(!feed.is_constant());
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert_eq!(
            FeedId::parse("cryptowatch:eth").unwrap_err(),
            FeedError::UnknownProvider("cryptowatch".to_string())
        );
    }

    #[test]
    fn test_malformed_ids() {
        assert!(matches!(
            FeedId::parse("ETHUSDT"),
            Err(FeedError::InvalidFeedId(_))
        ));
        assert!(matches!(
            FeedId::parse("binance:"),
            Err(FeedError::InvalidFeedId(_))
        ));
        assert!(matches!(
            FeedId::parse("constant:abc"),
            Err(FeedError::InvalidFeedId(_))
        ));
    }
}
