//! Single-task driver around `MakerEngine`.
//!
//! All engine mutation happens inside `EngineDriver::run`. Slow work
//! (signing, settlement, balance fetches, adjustment timers) is spawned and
//! reports back through the completions channel, so the loop never blocks on
//! the wallet service.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zz_feed::PriceSnapshot;
use zz_ws::{SendError, TransportEvent};

use crate::engine::{EngineCommand, EngineEvent, MakerEngine, Tick};
use crate::error::EngineResult;
use crate::service::{ExchangeSender, WalletService};

const COMPLETION_CHANNEL_SIZE: usize = 1024;

/// Periodic tick intervals.
#[derive(Debug, Clone, Copy)]
pub struct DriverIntervals {
    pub retry_open_orders: Duration,
    pub indicate_liquidity: Duration,
    pub refresh_balances: Duration,
    pub health_log: Duration,
}

impl Default for DriverIntervals {
    fn default() -> Self {
        Self {
            retry_open_orders: Duration::from_secs(1),
            indicate_liquidity: Duration::from_secs(5),
            refresh_balances: Duration::from_secs(15 * 60),
            health_log: Duration::from_secs(3 * 60 * 60),
        }
    }
}

pub struct EngineDriver {
    engine: MakerEngine,
    wallet: Arc<dyn WalletService>,
    sender: Arc<dyn ExchangeSender>,
    intervals: DriverIntervals,
    completions_tx: mpsc::Sender<EngineEvent>,
    completions_rx: mpsc::Receiver<EngineEvent>,
    timers: JoinSet<()>,
}

impl EngineDriver {
    pub fn new(
        engine: MakerEngine,
        wallet: Arc<dyn WalletService>,
        sender: Arc<dyn ExchangeSender>,
        intervals: DriverIntervals,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::channel(COMPLETION_CHANNEL_SIZE);
        Self {
            engine,
            wallet,
            sender,
            intervals,
            completions_tx,
            completions_rx,
            timers: JoinSet::new(),
        }
    }

    pub fn engine(&self) -> &MakerEngine {
        &self.engine
    }

    /// Load every wallet's balances before trading starts.
    ///
    /// # Errors
    /// Fails if any wallet cannot report balances; the maker must not start
    /// without knowing what it can sell.
    pub async fn bootstrap(&mut self) -> EngineResult<()> {
        for account in self.engine.wallets().accounts() {
            let balances = self.wallet.balances(account).await?;
            info!(account, assets = balances.len(), "initial balances loaded");
            self.engine.handle(EngineEvent::BalancesRefreshed {
                account,
                result: Ok(balances),
            });
        }
        Ok(())
    }

    /// Run until `shutdown` is cancelled; returns the engine for inspection.
    pub async fn run(
        mut self,
        mut transport_rx: mpsc::Receiver<TransportEvent>,
        mut price_rx: mpsc::Receiver<PriceSnapshot>,
        shutdown: CancellationToken,
    ) -> MakerEngine {
        let mut retry = ticker(self.intervals.retry_open_orders);
        let mut liquidity = ticker(self.intervals.indicate_liquidity);
        let mut balances = ticker(self.intervals.refresh_balances);
        let mut health = ticker(self.intervals.health_log);

        info!("engine loop started");
        loop {
            let event = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                Some(event) = transport_rx.recv() => EngineEvent::from(event),
                Some(event) = self.completions_rx.recv() => event,
                Some(snapshot) = price_rx.recv() => EngineEvent::Price(snapshot),

                _ = retry.tick() => EngineEvent::Tick(Tick::RetryOpenOrders),
                _ = liquidity.tick() => EngineEvent::Tick(Tick::IndicateLiquidity),
                _ = balances.tick() => EngineEvent::Tick(Tick::RefreshBalances),
                _ = health.tick() => EngineEvent::Tick(Tick::HealthLog),

                Some(joined) = self.timers.join_next(), if !self.timers.is_empty() => {
                    if let Err(e) = joined {
                        if !e.is_cancelled() {
                            warn!(error = %e, "adjustment timer failed");
                        }
                    }
                    continue;
                }
            };

            for command in self.engine.handle(event) {
                self.execute(command).await;
            }
        }

        self.timers.abort_all();
        info!(pending_timers = self.timers.len(), "engine loop stopped");
        self.engine
    }

    async fn execute(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Send(msg) => {
                let op = msg.op.clone();
                match self.sender.send(msg).await {
                    Ok(()) => {}
                    Err(SendError::NotConnected) => debug!(op = %op, "dropped frame while disconnected"),
                    Err(e) => warn!(op = %op, error = %e, "exchange send failed"),
                }
            }
            EngineCommand::SignIntent {
                order_id,
                account,
                intent,
            } => {
                let wallet = self.wallet.clone();
                let tx = self.completions_tx.clone();
                tokio::spawn(async move {
                    let result = wallet.build_order_intent(account, intent).await;
                    report(
                        &tx,
                        EngineEvent::IntentSigned {
                            order_id,
                            account,
                            result,
                        },
                    )
                    .await;
                });
            }
            EngineCommand::Settle {
                order_id,
                account,
                own,
                counter,
            } => {
                let wallet = self.wallet.clone();
                let tx = self.completions_tx.clone();
                // Never cancelled: a broadcast settlement cannot be recalled.
                tokio::spawn(async move {
                    let result = match wallet.settle(account, own, counter).await {
                        Ok(pending) => {
                            report(
                                &tx,
                                EngineEvent::SettlementBroadcast {
                                    order_id,
                                    account,
                                    tx_ref: pending.tx_ref,
                                },
                            )
                            .await;
                            pending.receipt.await
                        }
                        Err(e) => Err(e),
                    };
                    report(
                        &tx,
                        EngineEvent::SettlementFinished {
                            order_id,
                            account,
                            result,
                        },
                    )
                    .await;
                });
            }
            EngineCommand::RefreshBalances { accounts } => {
                let wallet = self.wallet.clone();
                let tx = self.completions_tx.clone();
                tokio::spawn(async move {
                    for account in accounts {
                        let result = wallet.balances(account).await;
                        report(&tx, EngineEvent::BalancesRefreshed { account, result }).await;
                    }
                });
            }
            EngineCommand::Schedule { delay, event } => {
                let tx = self.completions_tx.clone();
                self.timers.spawn(async move {
                    tokio::time::sleep(delay).await;
                    report(&tx, EngineEvent::Timer(event)).await;
                });
            }
        }
    }
}

fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn report(tx: &mpsc::Sender<EngineEvent>, event: EngineEvent) {
    if tx.send(event).await.is_err() {
        debug!("engine loop gone, completion dropped");
    }
}
