//! Price feeds for the zz market maker.
//!
//! - `PriceFeedStore`: last observed price per feed id (`provider:id`)
//! - `PriceValidator`: primary/secondary cross-check with a divergence breaker
//! - `oracle`: Binance websocket and REST adapters producing `PriceSnapshot`s

pub mod error;
pub mod feed_id;
pub mod oracle;
pub mod store;
pub mod validator;

pub use error::{FeedError, FeedResult};
pub use feed_id::{FeedId, FeedProvider};
pub use oracle::{
    run_binance_stream, run_poller, BinanceRestPoller, OraclePlan, PricePoller, PriceSnapshot,
};
pub use store::PriceFeedStore;
pub use validator::{PriceValidator, DEFAULT_MAX_DIVERGENCE};
