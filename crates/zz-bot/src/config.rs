//! Application configuration.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use zz_core::{AccountId, ChainId, MarketId, PairConfig};
use zz_engine::{DriverIntervals, EngineConfig, SimulatedWallet};
use zz_feed::{OraclePlan, DEFAULT_MAX_DIVERGENCE};
use zz_ws::{ConnectionConfig, SubscriptionTarget};

/// Top-level configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub chain_id: ChainId,
    /// Exchange websocket endpoint.
    pub ws_url: String,
    /// Identifies our liquidity indications. A fresh UUID when omitted.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Primary/secondary divergence above which a market stops quoting.
    #[serde(default = "default_max_divergence")]
    pub max_divergence: Decimal,
    #[serde(default)]
    pub websocket: WsConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub intervals: IntervalsConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    /// Market id → quoting configuration.
    #[serde(default)]
    pub pairs: BTreeMap<MarketId, PairConfig>,
}

fn default_client_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_max_divergence() -> Decimal {
    DEFAULT_MAX_DIVERGENCE
}

/// WebSocket reconnect policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Maximum reconnection attempts (0 = infinite).
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Fixed delay between reconnection attempts (ms).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 0,
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

/// Price oracle endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_binance_ws_url")]
    pub binance_ws_url: String,
    #[serde(default = "default_binance_rest_url")]
    pub binance_rest_url: String,
    /// REST polling interval for `binancerest:` feeds (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_binance_ws_url() -> String {
    "wss://stream.binance.com:9443".to_string()
}

fn default_binance_rest_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_poll_interval_ms() -> u64 {
    10_000
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            binance_ws_url: default_binance_ws_url(),
            binance_rest_url: default_binance_rest_url(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl OracleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Periodic engine work (ms).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalsConfig {
    #[serde(default = "default_retry_open_orders_ms")]
    pub retry_open_orders_ms: u64,
    #[serde(default = "default_indicate_liquidity_ms")]
    pub indicate_liquidity_ms: u64,
    #[serde(default = "default_refresh_balances_ms")]
    pub refresh_balances_ms: u64,
    #[serde(default = "default_health_log_ms")]
    pub health_log_ms: u64,
}

fn default_retry_open_orders_ms() -> u64 {
    1_000
}

fn default_indicate_liquidity_ms() -> u64 {
    5_000
}

fn default_refresh_balances_ms() -> u64 {
    15 * 60 * 1_000
}

fn default_health_log_ms() -> u64 {
    3 * 60 * 60 * 1_000
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            retry_open_orders_ms: default_retry_open_orders_ms(),
            indicate_liquidity_ms: default_indicate_liquidity_ms(),
            refresh_balances_ms: default_refresh_balances_ms(),
            health_log_ms: default_health_log_ms(),
        }
    }
}

impl From<&IntervalsConfig> for DriverIntervals {
    fn from(cfg: &IntervalsConfig) -> Self {
        Self {
            retry_open_orders: Duration::from_millis(cfg.retry_open_orders_ms),
            indicate_liquidity: Duration::from_millis(cfg.indicate_liquidity_ms),
            refresh_balances: Duration::from_millis(cfg.refresh_balances_ms),
            health_log: Duration::from_millis(cfg.health_log_ms),
        }
    }
}

/// Paper-mode wallet accounts and their starting balances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub accounts: Vec<WalletAccountConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAccountConfig {
    pub account_id: AccountId,
    /// Asset symbol → balance.
    #[serde(default)]
    pub balances: HashMap<String, Decimal>,
}

impl WalletConfig {
    /// Build the simulated wallet service for these accounts.
    pub fn simulated(&self) -> SimulatedWallet {
        self.accounts
            .iter()
            .fold(SimulatedWallet::new(), |wallet, account| {
                wallet.with_account(account.account_id, account.balances.clone())
            })
    }
}

impl AppConfig {
    /// Load, normalize and validate a configuration file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::parse(&content)
    }

    /// Parse TOML, rewrite legacy pair settings and validate.
    pub fn parse(content: &str) -> AppResult<Self> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        for pair in config.pairs.values_mut() {
            pair.normalize_legacy();
        }
        config.validate()?;
        Ok(config)
    }

    /// Startup checks. Feed ids of active pairs must all resolve to a known
    /// provider.
    pub fn validate(&self) -> AppResult<()> {
        if self.ws_url.is_empty() {
            return Err(AppError::Config("ws_url is required".to_string()));
        }
        if self.wallet.accounts.is_empty() {
            return Err(AppError::Config(
                "at least one wallet account is required".to_string(),
            ));
        }
        if !self.pairs.values().any(|p| p.active) {
            return Err(AppError::Config("no active pairs configured".to_string()));
        }
        for (market_id, pair) in &self.pairs {
            pair.validate(market_id)?;
        }
        self.oracle_plan()?;
        Ok(())
    }

    pub fn active_pairs(&self) -> impl Iterator<Item = (&MarketId, &PairConfig)> {
        self.pairs.iter().filter(|(_, p)| p.active)
    }

    /// Oracle tasks needed by the active pairs.
    pub fn oracle_plan(&self) -> AppResult<OraclePlan> {
        let feed_ids = self.active_pairs().flat_map(|(_, p)| {
            std::iter::once(p.price_feed_primary.as_str())
                .chain(p.price_feed_secondary.as_deref())
        });
        OraclePlan::from_feed_ids(feed_ids)
            .map_err(|e| AppError::Config(format!("Invalid price feed: {e}")))
    }

    /// One market subscription per active pair.
    pub fn subscription_targets(&self) -> Vec<SubscriptionTarget> {
        self.active_pairs()
            .map(|(market_id, _)| SubscriptionTarget {
                chain_id: self.chain_id,
                market_id: market_id.clone(),
            })
            .collect()
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            url: self.ws_url.clone(),
            max_reconnect_attempts: self.websocket.max_reconnect_attempts,
            reconnect_delay_ms: self.websocket.reconnect_delay_ms,
            subscriptions: self.subscription_targets(),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            chain_id: self.chain_id,
            client_id: self.client_id.clone(),
            pairs: self.pairs.clone(),
            max_divergence: self.max_divergence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const CONFIG_TOML: &str = r#"
        chain_id = 1000
        ws_url = "wss://exchange.example/ws"

        [websocket]
        reconnect_delay_ms = 2000

        [[wallet.accounts]]
        account_id = 7
        balances = { ETH = 5, USDC = 10000 }

        [pairs.ETH-USDC]
        side = "d"
        min_spread = 0.001
        slippage_rate = 0.0001
        max_size = 5
        price_feed_primary = "binance:ETHUSDT"
        price_feed_secondary = "binancerest:ETHUSDT"

        [pairs.DAI-USDC]
        min_spread = 0.0005
        max_size = 10000
        mode = "constant"
        init_price = 1

        [pairs.WBTC-USDC]
        active = false
        min_spread = 0.001
        max_size = 1
        price_feed_primary = "kraken:XBTUSD"
    "#;

    #[test]
    fn test_parse_config() {
        let config = AppConfig::parse(CONFIG_TOML).unwrap();
        assert_eq!(config.chain_id, 1000);
        assert_eq!(config.websocket.reconnect_delay_ms, 2000);
        assert_eq!(config.websocket.max_reconnect_attempts, 0);
        assert_eq!(config.oracle.poll_interval_ms, 10_000);
        assert_eq!(config.max_divergence, dec!(0.03));
        assert_eq!(config.pairs.len(), 3);
        assert_eq!(config.wallet.accounts[0].balances["USDC"], dec!(10000));
        assert!(!config.client_id.is_empty());
    }

    #[test]
    fn test_legacy_constant_pair_normalized() {
        let config = AppConfig::parse(CONFIG_TOML).unwrap();
        assert_eq!(config.pairs["DAI-USDC"].price_feed_primary, "constant:1");
    }

    #[test]
    fn test_inactive_pairs_excluded() {
        let config = AppConfig::parse(CONFIG_TOML).unwrap();
        let targets: Vec<String> = config
            .subscription_targets()
            .into_iter()
            .map(|t| t.market_id)
            .collect();
        assert_eq!(targets, vec!["DAI-USDC", "ETH-USDC"]);

        let plan = config.oracle_plan().unwrap();
        assert_eq!(plan.stream["ETHUSDT"], vec!["binance:ETHUSDT"]);
        assert_eq!(plan.poll["ETHUSDT"], vec!["binancerest:ETHUSDT"]);
        assert!(!plan.stream.contains_key("XBTUSD"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let content = CONFIG_TOML.replace("active = false", "active = true");
        assert!(matches!(
            AppConfig::parse(&content),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_missing_wallet_rejected() {
        let content = r#"
            chain_id = 1
            ws_url = "ws://localhost"

            [pairs.ETH-USDC]
            min_spread = 0.001
            max_size = 1
            price_feed_primary = "constant:2000"
        "#;
        assert!(matches!(
            AppConfig::parse(content),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_bad_toml_rejected() {
        assert!(matches!(
            AppConfig::parse("chain_id = \"x\""),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_intervals_conversion() {
        let intervals = DriverIntervals::from(&IntervalsConfig::default());
        assert_eq!(intervals.retry_open_orders, Duration::from_secs(1));
        assert_eq!(intervals.indicate_liquidity, Duration::from_secs(5));
        assert_eq!(intervals.refresh_balances, Duration::from_secs(900));
        assert_eq!(intervals.health_log, Duration::from_secs(10_800));
    }

    #[test]
    fn test_connection_config() {
        let config = AppConfig::parse(CONFIG_TOML).unwrap();
        let conn = config.connection_config();
        assert_eq!(conn.url, "wss://exchange.example/ws");
        assert_eq!(conn.reconnect_delay_ms, 2000);
        assert_eq!(conn.subscriptions.len(), 2);
        assert!(conn.subscriptions.iter().all(|t| t.chain_id == 1000));
    }
}
