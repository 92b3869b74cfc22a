//! Core domain types for the zz market maker.
//!
//! This crate provides the types shared by every other crate:
//! - `Market`, `AssetInfo`: exchange market metadata (assets, fees)
//! - `PairConfig`, `SideBias`: per-market quoting configuration
//! - `ExchangeOrder`, `Side`, `LiquidityEntry`: order book vocabulary
//! - `Clock`: injectable time source

pub mod clock;
pub mod decimal;
pub mod error;
pub mod market;
pub mod order;
pub mod pair;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decimal::{round_sig_figs, QUOTE_SIG_FIGS};
pub use error::{CoreError, Result};
pub use market::{AssetInfo, Market};
pub use order::{ExchangeOrder, LiquidityEntry, Side};
pub use pair::{PairConfig, SideBias};

/// Exchange chain identifier.
pub type ChainId = u64;
/// Wallet account identifier on the settlement layer.
pub type AccountId = u64;
/// Exchange order identifier.
pub type OrderId = u64;
/// Market alias, e.g. `ETH-USDC`.
pub type MarketId = String;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
