//! Oracle adapters feeding the price store.
//!
//! Two shapes of provider exist:
//! - push: a websocket trade stream (`binance:<SYMBOL>`), reconnecting forever
//! - pull: a REST ticker polled on an interval (`binancerest:<SYMBOL>`)
//!
//! Both deliver `PriceSnapshot`s over an mpsc channel; the engine owns the
//! store and applies them on its own task.

use futures_util::StreamExt;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use zz_core::BoxFuture;

use crate::error::{FeedError, FeedResult};
use crate::feed_id::{FeedId, FeedProvider};

/// Default timeout for REST requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay before reconnecting a dropped trade stream.
const STREAM_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// One price observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSnapshot {
    pub feed_id: String,
    pub price: Decimal,
}

/// Pull-style price source.
pub trait PricePoller: Send + Sync {
    fn poll(&self) -> BoxFuture<'_, FeedResult<Vec<PriceSnapshot>>>;
}

/// Symbol → configured feed ids that resolve to it.
pub type SymbolFeeds = BTreeMap<String, Vec<String>>;

/// Which oracle tasks must run for a set of configured feed ids.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OraclePlan {
    /// Symbols served by the trade stream.
    pub stream: SymbolFeeds,
    /// Symbols served by REST polling.
    pub poll: SymbolFeeds,
}

impl OraclePlan {
    /// Build a plan from feed ids. Any unknown provider fails the whole plan.
    pub fn from_feed_ids<'a>(feed_ids: impl IntoIterator<Item = &'a str>) -> FeedResult<Self> {
        let mut plan = Self::default();
        for raw in feed_ids {
            let feed = FeedId::parse(raw)?;
            let symbol = feed.id.to_uppercase();
            let target = match feed.provider {
                FeedProvider::Constant(_) => continue,
                FeedProvider::Binance => &mut plan.stream,
                FeedProvider::BinanceRest => &mut plan.poll,
            };
            let feeds = target.entry(symbol).or_default();
            if !feeds.iter().any(|f| f == raw) {
                feeds.push(raw.to_string());
            }
        }
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.stream.is_empty() && self.poll.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

/// Binance `/api/v3/ticker/price` poller.
pub struct BinanceRestPoller {
    client: Client,
    base_url: String,
    symbols: SymbolFeeds,
}

impl BinanceRestPoller {
    /// Create a poller for `symbols` against `base_url` (e.g. `https://api.binance.com`).
    pub fn new(base_url: impl Into<String>, symbols: SymbolFeeds) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| FeedError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            symbols,
        })
    }

    async fn fetch(&self, symbol: &str) -> FeedResult<Decimal> {
        let url = format!(
            "{}/api/v3/ticker/price",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(|e| FeedError::Http(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Http(format!("HTTP {status}: {body}")));
        }

        let ticker: TickerPrice = response
            .json()
            .await
            .map_err(|e| FeedError::ParseError(format!("ticker response: {e}")))?;

        debug!(symbol = %ticker.symbol, price = %ticker.price, "ticker fetched");
        Decimal::from_str(&ticker.price)
            .map_err(|e| FeedError::ParseError(format!("ticker price {}: {e}", ticker.price)))
    }
}

impl PricePoller for BinanceRestPoller {
    fn poll(&self) -> BoxFuture<'_, FeedResult<Vec<PriceSnapshot>>> {
        Box::pin(async move {
            let mut snapshots = Vec::new();
            for (symbol, feeds) in &self.symbols {
                match self.fetch(symbol).await {
                    Ok(price) => snapshots.extend(feeds.iter().map(|feed_id| PriceSnapshot {
                        feed_id: feed_id.clone(),
                        price,
                    })),
                    Err(e) => warn!(%symbol, error = %e, "ticker poll failed"),
                }
            }
            Ok(snapshots)
        })
    }
}

/// Poll `poller` every `interval` until cancelled.
pub async fn run_poller(
    poller: Arc<dyn PricePoller>,
    interval: Duration,
    tx: mpsc::Sender<PriceSnapshot>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            _ = ticker.tick() => {}
        }

        match poller.poll().await {
            Ok(snapshots) => {
                for snapshot in snapshots {
                    if tx.send(snapshot).await.is_err() {
                        debug!("price receiver dropped, stopping poller");
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "price poll failed"),
        }
    }
}

/// Build the combined trade stream URL for `symbols`.
pub fn stream_url(ws_base: &str, symbols: &SymbolFeeds) -> String {
    let streams: Vec<String> = symbols
        .keys()
        .map(|s| format!("{}@trade", s.to_lowercase()))
        .collect();
    format!(
        "{}/stream?streams={}",
        ws_base.trim_end_matches('/'),
        streams.join("/")
    )
}

#[derive(Debug, Deserialize)]
struct StreamEnvelope {
    data: TradeEvent,
}

#[derive(Debug, Deserialize)]
struct TradeEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    price: String,
}

/// Parse a combined-stream trade frame into `(SYMBOL, price)`.
pub fn parse_trade_message(text: &str) -> Option<(String, Decimal)> {
    let envelope: StreamEnvelope = serde_json::from_str(text).ok()?;
    let price = Decimal::from_str(&envelope.data.price).ok()?;
    Some((envelope.data.symbol.to_uppercase(), price))
}

/// Run the Binance trade stream for `symbols` until cancelled.
///
/// Reconnects after a fixed delay whenever the socket drops.
pub async fn run_binance_stream(
    ws_base: String,
    symbols: SymbolFeeds,
    tx: mpsc::Sender<PriceSnapshot>,
    shutdown: CancellationToken,
) {
    if symbols.is_empty() {
        return;
    }
    let url = stream_url(&ws_base, &symbols);

    loop {
        info!(%url, "connecting trade stream");
        match connect_async(url.as_str()).await {
            Ok((mut ws, _response)) => {
                info!(count = symbols.len(), "trade stream connected");
                loop {
                    let frame = tokio::select! {
                        () = shutdown.cancelled() => return,
                        frame = ws.next() => frame,
                    };
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            let Some((symbol, price)) = parse_trade_message(&text) else {
                                continue;
                            };
                            let Some(feeds) = symbols.get(&symbol) else {
                                continue;
                            };
                            for feed_id in feeds {
                                let snapshot = PriceSnapshot {
                                    feed_id: feed_id.clone(),
                                    price,
                                };
                                if tx.send(snapshot).await.is_err() {
                                    debug!("price receiver dropped, stopping stream");
                                    return;
                                }
                            }
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(?e, "trade stream read error");
                            break;
                        }
                        None => {
                            warn!("trade stream ended");
                            break;
                        }
                    }
                }
            }
            Err(e) => error!(?e, "trade stream connect failed"),
        }

        tokio::select! {
            () = shutdown.cancelled() => return,
            () = tokio::time::sleep(STREAM_RECONNECT_DELAY) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_plan_groups_by_provider() {
        let plan = OraclePlan::from_feed_ids([
            "binance:ethusdt",
            "binancerest:ETHUSDT",
            "binance:BTCUSDT",
            "constant:1",
            "binance:ethusdt",
        ])
        .unwrap();

        assert_eq!(plan.stream.len(), 2);
        assert_eq!(plan.stream["ETHUSDT"], vec!["binance:ethusdt".to_string()]);
        assert_eq!(plan.poll["ETHUSDT"], vec!["binancerest:ETHUSDT".to_string()]);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_plan_rejects_unknown_provider() {
        let err = OraclePlan::from_feed_ids(["binance:ETHUSDT", "chainlink:0xabc"]).unwrap_err();
        assert_eq!(err, FeedError::UnknownProvider("chainlink".to_string()));
    }

    #[test]
    fn test_constant_only_plan_is_empty() {
        let plan = OraclePlan::from_feed_ids(["constant:1"]).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_stream_url() {
        let plan = OraclePlan::from_feed_ids(["binance:ETHUSDT", "binance:BTCUSDT"]).unwrap();
        assert_eq!(
            stream_url("wss://stream.binance.com:9443/", &plan.stream),
            "wss://stream.binance.com:9443/stream?streams=btcusdt@trade/ethusdt@trade"
        );
    }

    #[test]
    fn test_parse_trade_message() {
        let text = r#"{"stream":"ethusdt@trade","data":{"e":"trade","s":"ETHUSDT","p":"2001.37","q":"0.5"}}"#;
        assert_eq!(
            parse_trade_message(text),
            Some(("ETHUSDT".to_string(), dec!(2001.37)))
        );
        assert_eq!(parse_trade_message(r#"{"result":null,"id":1}"#), None);
    }

    struct FixedPoller(Vec<PriceSnapshot>);

    impl PricePoller for FixedPoller {
        fn poll(&self) -> BoxFuture<'_, FeedResult<Vec<PriceSnapshot>>> {
            let snapshots = self.0.clone();
            Box::pin(async move { Ok(snapshots) })
        }
    }

    #[tokio::test]
    async fn test_run_poller_delivers_until_cancelled() {
        let snapshot = PriceSnapshot {
            feed_id: "binancerest:ETHUSDT".to_string(),
            price: dec!(2000),
        };
        let poller: Arc<dyn PricePoller> = Arc::new(FixedPoller(vec![snapshot.clone()]));
        let (tx, mut rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(run_poller(
            poller,
            Duration::from_millis(10),
            tx,
            shutdown.clone(),
        ));

        assert_eq!(rx.recv().await, Some(snapshot));
        shutdown.cancel();
        drop(rx);
        handle.await.unwrap();
    }
}
