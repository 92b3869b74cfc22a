//! Application wiring and main run loop.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use zz_core::SystemClock;
use zz_engine::{DriverIntervals, EngineDriver, ExchangeSender, MakerEngine, WalletService};
use zz_feed::{run_binance_stream, run_poller, BinanceRestPoller, PricePoller, PriceSnapshot};
use zz_ws::{ConnectionManager, TransportEvent};

const TRANSPORT_CHANNEL_SIZE: usize = 1000;
const PRICE_CHANNEL_SIZE: usize = 1000;

/// The market maker process.
pub struct Application {
    config: AppConfig,
    shutdown: CancellationToken,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// Cancelling this token stops `run` as if ctrl-c had been pressed.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until ctrl-c, the shutdown token, or a fatal transport error.
    pub async fn run(self) -> AppResult<()> {
        let started_at = chrono::Utc::now();
        info!(
            started_at = %started_at.to_rfc3339(),
            chain_id = self.config.chain_id,
            client_id = %self.config.client_id,
            "Starting market maker"
        );

        let wallet = Arc::new(self.config.wallet.simulated());
        let engine = MakerEngine::new(
            self.config.engine_config(),
            wallet.accounts(),
            Arc::new(SystemClock),
        );
        info!(markets = ?engine.active_markets(), "Engine configured");

        let (transport_tx, transport_rx) = mpsc::channel::<TransportEvent>(TRANSPORT_CHANNEL_SIZE);
        let ws_config = self.config.connection_config();
        info!(
            subscriptions = ?ws_config.subscriptions.iter().map(|s| &s.market_id).collect::<Vec<_>>(),
            "Configured WebSocket subscriptions"
        );
        let connection_manager = Arc::new(ConnectionManager::new(ws_config, transport_tx));
        let sender: Arc<dyn ExchangeSender> = Arc::new(connection_manager.write_handle());

        let mut driver = EngineDriver::new(
            engine,
            wallet,
            sender,
            DriverIntervals::from(&self.config.intervals),
        );
        // A maker that cannot see its balances must not start.
        driver.bootstrap().await?;

        let (price_tx, price_rx) = mpsc::channel::<PriceSnapshot>(PRICE_CHANNEL_SIZE);
        let oracles = self.start_oracles(price_tx).await?;

        let connection_manager_clone = connection_manager.clone();
        let mut ws_handle = tokio::spawn(async move { connection_manager_clone.connect().await });

        let driver_handle = tokio::spawn(driver.run(transport_rx, price_rx, self.shutdown.clone()));

        info!("Entering main event loop");
        let transport_result = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                None
            }
            () = self.shutdown.cancelled() => {
                info!("Shutdown requested");
                None
            }
            joined = &mut ws_handle => Some(joined),
        };

        self.shutdown.cancel();
        connection_manager.shutdown();

        let engine = driver_handle
            .await
            .map_err(|e| AppError::Task(format!("engine driver: {e}")))?;
        for oracle in oracles {
            if let Err(e) = oracle.await {
                warn!(error = %e, "Price oracle task failed");
            }
        }

        let transport_result = match transport_result {
            Some(joined) => joined,
            None => ws_handle.await,
        };

        info!(
            uptime_secs = (chrono::Utc::now() - started_at).num_seconds(),
            open_orders = engine.open_order_count(),
            in_flight_fills = engine.fills().len(),
            locked_wallets = engine.wallets().locked_count(),
            "Shutting down"
        );

        match transport_result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(error = %e, "WebSocket connection failed");
                Err(e.into())
            }
            Err(e) => Err(AppError::Task(format!("websocket: {e}"))),
        }
    }

    /// Spawn the price oracle tasks needed by the active pairs.
    ///
    /// Trade-stream symbols are seeded once over REST so the first quotes do
    /// not wait for a trade.
    async fn start_oracles(
        &self,
        price_tx: mpsc::Sender<PriceSnapshot>,
    ) -> AppResult<Vec<JoinHandle<()>>> {
        let plan = self.config.oracle_plan()?;
        let oracle = &self.config.oracle;
        let mut tasks = Vec::new();

        if plan.is_empty() {
            info!("Only constant price feeds configured");
            return Ok(tasks);
        }

        if !plan.stream.is_empty() {
            let seeder = BinanceRestPoller::new(oracle.binance_rest_url.clone(), plan.stream.clone())?;
            match seeder.poll().await {
                Ok(snapshots) => {
                    info!(count = snapshots.len(), "Seeded trade-stream prices");
                    for snapshot in snapshots {
                        if price_tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Price seeding failed, waiting for trades"),
            }

            info!(symbols = ?plan.stream.keys().collect::<Vec<_>>(), "Starting Binance trade stream");
            tasks.push(tokio::spawn(run_binance_stream(
                oracle.binance_ws_url.clone(),
                plan.stream,
                price_tx.clone(),
                self.shutdown.clone(),
            )));
        }

        if !plan.poll.is_empty() {
            info!(
                symbols = ?plan.poll.keys().collect::<Vec<_>>(),
                interval_ms = oracle.poll_interval_ms,
                "Starting Binance REST poller"
            );
            let poller: Arc<dyn PricePoller> =
                Arc::new(BinanceRestPoller::new(oracle.binance_rest_url.clone(), plan.poll)?);
            tasks.push(tokio::spawn(run_poller(
                poller,
                oracle.poll_interval(),
                price_tx,
                self.shutdown.clone(),
            )));
        }

        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG_TOML: &str = r#"
        chain_id = 1000
        ws_url = "ws://127.0.0.1:1"

        [websocket]
        reconnect_delay_ms = 50

        [[wallet.accounts]]
        account_id = 1
        balances = { ETH = 1, USDC = 2000 }

        [pairs.ETH-USDC]
        min_spread = 0.001
        max_size = 1
        price_feed_primary = "constant:2000"
    "#;

    #[tokio::test]
    async fn test_run_stops_on_shutdown_token() {
        let config = AppConfig::parse(CONFIG_TOML).unwrap();
        let app = Application::new(config).unwrap();
        let token = app.shutdown_token();

        let handle = tokio::spawn(app.run());
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        token.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("run did not stop")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_fails_after_max_reconnects() {
        let content = CONFIG_TOML.replace(
            "reconnect_delay_ms = 50",
            "reconnect_delay_ms = 10\nmax_reconnect_attempts = 2",
        );
        let app = Application::new(AppConfig::parse(&content).unwrap()).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), app.run())
            .await
            .expect("run did not stop");
        assert!(matches!(result, Err(AppError::WebSocket(_))));
    }
}
