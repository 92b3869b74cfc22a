//! Feed error types.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("Price feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Circuit breaker: primary {primary} vs secondary {secondary} diverge by {divergence}")]
    CircuitBreaker {
        primary: Decimal,
        secondary: Decimal,
        divergence: Decimal,
    },

    #[error("Invalid feed id: {0}")]
    InvalidFeedId(String),

    #[error("Unknown price feed provider: {0}")]
    UnknownProvider(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type FeedResult<T> = Result<T, FeedError>;
