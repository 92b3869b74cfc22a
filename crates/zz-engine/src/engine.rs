//! The maker decision engine.
//!
//! `MakerEngine` owns every piece of mutable state (feeds, markets, pair
//! configs, wallets, nonces, order memory, open orders, in-flight fills) and
//! is only ever touched from one task. Each `EngineEvent` is handled to
//! completion and yields the `EngineCommand`s the driver must execute.

use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use zz_core::{
    AccountId, ChainId, Clock, ExchangeOrder, Market, MarketId, OrderId, PairConfig,
};
use zz_feed::{FeedError, PriceFeedStore, PriceSnapshot, PriceValidator};
use zz_telemetry::Metrics;
use zz_ws::{ExchangeMessage, Inbound, OrderMatch, OrderStatus, StatusUpdate, TransportEvent};

use crate::adjust::{Adjustment, CooldownTracker, TimerEvent};
use crate::error::WalletResult;
use crate::fillability::{Fillability, FillabilityEvaluator};
use crate::lifecycle::{FillBook, FillState};
use crate::liquidity::build_ladder;
use crate::memory::{OrderMemory, RememberedOrder};
use crate::nonce::NonceLedger;
use crate::quote::{Quote, QuoteGenerator};
use crate::service::{OrderIntent, SettlementReceipt, SignedOrder};
use crate::wallet::WalletBook;

/// Error text reported when a settlement fails without a reason.
const UNKNOWN_ERROR: &str = "unknown";
const NONCE_REJECTED: &str = "nonce check failed";
const WALLET_BUSY: &str = "wallet busy";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub chain_id: ChainId,
    /// Identifies our liquidity indications to the exchange.
    pub client_id: String,
    pub pairs: BTreeMap<MarketId, PairConfig>,
    pub max_divergence: Decimal,
}

/// Periodic work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    RetryOpenOrders,
    IndicateLiquidity,
    RefreshBalances,
    HealthLog,
}

#[derive(Debug)]
pub enum EngineEvent {
    Connected,
    Disconnected,
    Exchange(Inbound),
    Price(PriceSnapshot),
    IntentSigned {
        order_id: OrderId,
        account: AccountId,
        result: WalletResult<SignedOrder>,
    },
    SettlementBroadcast {
        order_id: OrderId,
        account: AccountId,
        tx_ref: String,
    },
    SettlementFinished {
        order_id: OrderId,
        account: AccountId,
        result: WalletResult<SettlementReceipt>,
    },
    BalancesRefreshed {
        account: AccountId,
        result: WalletResult<HashMap<String, Decimal>>,
    },
    Timer(TimerEvent),
    Tick(Tick),
}

impl From<TransportEvent> for EngineEvent {
    fn from(event: TransportEvent) -> Self {
        match event {
            TransportEvent::Connected => EngineEvent::Connected,
            TransportEvent::Disconnected => EngineEvent::Disconnected,
            TransportEvent::Message(inbound) => EngineEvent::Exchange(inbound),
        }
    }
}

/// Side effects requested by the engine.
#[derive(Debug)]
pub enum EngineCommand {
    Send(ExchangeMessage),
    SignIntent {
        order_id: OrderId,
        account: AccountId,
        intent: OrderIntent,
    },
    Settle {
        order_id: OrderId,
        account: AccountId,
        own: Value,
        counter: Value,
    },
    RefreshBalances {
        accounts: Vec<AccountId>,
    },
    Schedule {
        delay: Duration,
        event: TimerEvent,
    },
}

pub struct MakerEngine {
    chain_id: ChainId,
    client_id: String,
    pairs: BTreeMap<MarketId, PairConfig>,
    markets: HashMap<MarketId, Market>,
    feeds: PriceFeedStore,
    validator: PriceValidator,
    wallets: WalletBook,
    fills: FillBook,
    memory: OrderMemory,
    nonces: NonceLedger,
    /// Orders rejected on price only, re-evaluated every retry tick.
    open_orders: BTreeMap<OrderId, ExchangeOrder>,
    cooldowns: CooldownTracker,
    connected: bool,
    clock: Arc<dyn Clock>,
}

impl MakerEngine {
    pub fn new(
        config: EngineConfig,
        accounts: impl IntoIterator<Item = AccountId>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            chain_id: config.chain_id,
            client_id: config.client_id,
            pairs: config.pairs,
            markets: HashMap::new(),
            feeds: PriceFeedStore::new(),
            validator: PriceValidator::new(config.max_divergence),
            wallets: WalletBook::new(accounts),
            fills: FillBook::new(),
            memory: OrderMemory::new(),
            nonces: NonceLedger::new(),
            open_orders: BTreeMap::new(),
            cooldowns: CooldownTracker::new(),
            connected: false,
            clock,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn pair(&self, market_id: &str) -> Option<&PairConfig> {
        self.pairs.get(market_id)
    }

    pub fn market(&self, market_id: &str) -> Option<&Market> {
        self.markets.get(market_id)
    }

    pub fn wallets(&self) -> &WalletBook {
        &self.wallets
    }

    pub fn fills(&self) -> &FillBook {
        &self.fills
    }

    pub fn nonces(&self) -> &NonceLedger {
        &self.nonces
    }

    pub fn memory(&self) -> &OrderMemory {
        &self.memory
    }

    pub fn open_order_count(&self) -> usize {
        self.open_orders.len()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Markets currently quoted.
    pub fn active_markets(&self) -> Vec<MarketId> {
        self.pairs
            .iter()
            .filter(|(_, p)| p.active)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Process one event.
    pub fn handle(&mut self, event: EngineEvent) -> Vec<EngineCommand> {
        let mut out = Vec::new();
        match event {
            EngineEvent::Connected => self.on_connected(&mut out),
            EngineEvent::Disconnected => self.on_disconnected(),
            EngineEvent::Exchange(inbound) => self.on_exchange(inbound, &mut out),
            EngineEvent::Price(snapshot) => self.feeds.set(&snapshot.feed_id, snapshot.price),
            EngineEvent::IntentSigned {
                order_id,
                account,
                result,
            } => self.on_intent_signed(order_id, account, result, &mut out),
            EngineEvent::SettlementBroadcast {
                order_id,
                account,
                tx_ref,
            } => self.on_broadcast(order_id, account, tx_ref, &mut out),
            EngineEvent::SettlementFinished {
                order_id,
                account,
                result,
            } => self.on_settlement_finished(order_id, account, result, &mut out),
            EngineEvent::BalancesRefreshed { account, result } => match result {
                Ok(balances) => {
                    debug!(account, assets = balances.len(), "balances refreshed");
                    self.wallets.set_balances(account, balances);
                }
                Err(e) => warn!(account, error = %e, "balance refresh failed"),
            },
            EngineEvent::Timer(timer) => self.on_timer(timer, &mut out),
            EngineEvent::Tick(tick) => self.on_tick(tick, &mut out),
        }
        Metrics::wallets_locked(self.wallets.locked_count());
        out
    }

    fn on_connected(&mut self, out: &mut Vec<EngineCommand>) {
        self.connected = true;
        Metrics::ws_connected();
        info!(markets = ?self.active_markets(), "exchange connected");
        self.publish_all(out);
    }

    fn on_disconnected(&mut self) {
        self.connected = false;
        Metrics::ws_disconnected();
        let released = self.wallets.clear_all();
        let dropped = self.fills.drop_unsent();
        warn!(
            released_locks = released,
            dropped_fills = dropped.len(),
            "exchange disconnected, wallet locks reset"
        );
    }

    fn on_exchange(&mut self, inbound: Inbound, out: &mut Vec<EngineCommand>) {
        match inbound {
            Inbound::Orders(orders) => {
                for order in orders {
                    self.on_order(order, out);
                }
            }
            Inbound::UserOrderMatch(order_match) => self.on_match(order_match, out),
            Inbound::MarketInfo(market) => self.on_market_info(market),
            Inbound::Error { op, account_id } => self.on_exchange_error(op, account_id),
            Inbound::Other(op) => debug!(op = %op, "ignoring exchange message"),
        }
    }

    fn quote_generator(&self) -> QuoteGenerator<'_> {
        QuoteGenerator {
            chain_id: self.chain_id,
            markets: &self.markets,
            pairs: &self.pairs,
            feeds: &self.feeds,
            validator: &self.validator,
        }
    }

    fn evaluate(&self, order: &ExchangeOrder) -> Fillability {
        FillabilityEvaluator {
            quotes: self.quote_generator(),
            wallets: &self.wallets,
        }
        .evaluate(order, self.clock.now_secs())
    }

    fn on_order(&mut self, order: ExchangeOrder, out: &mut Vec<EngineCommand>) {
        if self.fills.contains(order.order_id) {
            return;
        }
        match self.evaluate(&order) {
            Fillability::Fillable { wallet, quote } => {
                Metrics::evaluation("fillable");
                self.open_orders.remove(&order.order_id);
                self.start_fill(&order, wallet, quote, out);
            }
            Fillability::Rejected(reason) => {
                Metrics::evaluation(reason.as_str());
                debug!(order_id = order.order_id, reason = reason.as_str(), "order not fillable");
                if reason.is_retryable() {
                    self.open_orders.insert(order.order_id, order);
                } else {
                    self.open_orders.remove(&order.order_id);
                }
            }
        }
    }

    fn retry_open_orders(&mut self, out: &mut Vec<EngineCommand>) {
        let ids: Vec<OrderId> = self.open_orders.keys().copied().collect();
        for order_id in ids {
            let Some(order) = self.open_orders.get(&order_id).cloned() else {
                continue;
            };
            if self.fills.contains(order_id) {
                self.open_orders.remove(&order_id);
                continue;
            }
            match self.evaluate(&order) {
                Fillability::Fillable { wallet, quote } => {
                    self.open_orders.remove(&order_id);
                    self.start_fill(&order, wallet, quote, out);
                }
                Fillability::Rejected(reason) if !reason.is_retryable() => {
                    debug!(order_id, reason = reason.as_str(), "dropping open order");
                    self.open_orders.remove(&order_id);
                }
                Fillability::Rejected(_) => {}
            }
        }
    }

    /// Idle -> RequestSent: lock the wallet and ask for a signature.
    fn start_fill(
        &mut self,
        order: &ExchangeOrder,
        wallet: AccountId,
        quote: Quote,
        out: &mut Vec<EngineCommand>,
    ) {
        let Some(market) = self.markets.get(&order.market_id) else {
            return;
        };
        let Some(intent) = OrderIntent::for_fill(order, market, &quote, self.clock.now_secs())
        else {
            warn!(order_id = order.order_id, "fill amounts out of range");
            return;
        };
        if !self.wallets.try_lock(wallet) {
            warn!(order_id = order.order_id, wallet, "selected wallet already locked");
            return;
        }
        let record = self.fills.begin(
            order.order_id,
            order.chain_id,
            wallet,
            Some(order.market_id.clone()),
            FillState::RequestSent,
        );
        record.pending = Some(RememberedOrder {
            chain_id: order.chain_id,
            market_id: order.market_id.clone(),
            price: quote.price,
            sell_symbol: intent.sell_asset.symbol.clone(),
            sell_quantity: intent.sell_amount,
            buy_symbol: intent.buy_asset.symbol.clone(),
            buy_quantity: intent.buy_amount,
            expires_at_ms: 0,
        });

        info!(
            order_id = order.order_id,
            market = %order.market_id,
            side = %order.side,
            base_quantity = %order.base_quantity,
            price = %quote.price,
            wallet,
            "sending fill request"
        );
        Metrics::fill_requested(&order.market_id);
        out.push(EngineCommand::SignIntent {
            order_id: order.order_id,
            account: wallet,
            intent,
        });
    }

    fn on_intent_signed(
        &mut self,
        order_id: OrderId,
        account: AccountId,
        result: WalletResult<SignedOrder>,
        out: &mut Vec<EngineCommand>,
    ) {
        let current = self
            .fills
            .get(order_id)
            .filter(|r| r.state == FillState::RequestSent && r.account == account)
            .map(|r| (r.chain_id, r.pending.clone()));
        let Some((chain_id, pending)) = current else {
            debug!(order_id, account, "discarding stale signed order");
            return;
        };

        match result {
            Ok(SignedOrder(signed)) => {
                out.push(EngineCommand::Send(ExchangeMessage::fill_request(
                    chain_id, order_id, signed,
                )));
                if let Some(pending) = pending {
                    self.memory.remember(order_id, pending, self.clock.now_ms());
                }
            }
            Err(e) => {
                warn!(order_id, account, error = %e, "signing fill order failed");
                self.finish_fill(order_id, "sign_failed");
            }
        }
    }

    fn on_match(&mut self, m: OrderMatch, out: &mut Vec<EngineCommand>) {
        let order_id = m.order_id;
        let account = m.own.account_id;
        if m.chain_id != self.chain_id {
            warn!(order_id, chain_id = m.chain_id, "match for another chain ignored");
            return;
        }
        if !self.wallets.contains(account) {
            error!(order_id, account, "match names a wallet we do not hold");
            return;
        }

        let now_ms = self.clock.now_ms();
        let existing = self.fills.get(order_id).map(|r| (r.state, r.account));
        match existing {
            Some((FillState::RequestSent, holder)) if holder == account => {
                if let Err(e) = self.fills.advance(order_id, FillState::MatchPending) {
                    warn!(error = %e, "match rejected by fill state machine");
                    return;
                }
            }
            Some((state, holder)) => {
                warn!(order_id, account, holder, state = state.as_str(), "unexpected match ignored");
                return;
            }
            None => {
                if !self.wallets.try_lock(account) {
                    warn!(order_id, account, "late match for busy wallet rejected");
                    out.push(self.status(order_id, OrderStatus::Rejected, None, Some(WALLET_BUSY)));
                    return;
                }
                let remembered = self.memory.get(order_id, now_ms).cloned();
                info!(order_id, account, known = remembered.is_some(), "accepting late match");
                let record = self.fills.begin(
                    order_id,
                    m.chain_id,
                    account,
                    remembered.as_ref().map(|o| o.market_id.clone()),
                    FillState::MatchPending,
                );
                record.pending = remembered;
            }
        }

        if let Some(record) = self.fills.get_mut(order_id) {
            record.counter = Some((m.counter.account_id, m.counter.nonce));
            record.matched_at_ms = Some(now_ms);
        }

        if !self.nonces.accepts(m.counter.account_id, m.counter.nonce) {
            warn!(
                order_id,
                counter_account = m.counter.account_id,
                nonce = m.counter.nonce,
                last = ?self.nonces.last(m.counter.account_id),
                "counter order failed nonce check"
            );
            if let Err(e) = self.fills.advance(order_id, FillState::Rejected) {
                warn!(error = %e, "nonce rejection out of order");
            }
            out.push(self.status(order_id, OrderStatus::Rejected, None, Some(NONCE_REJECTED)));
            self.finish_fill(order_id, "rejected");
            return;
        }

        if let Err(e) = self.fills.advance(order_id, FillState::Settling) {
            warn!(error = %e, "cannot settle match");
            return;
        }
        info!(order_id, account, "settling matched order");
        out.push(EngineCommand::Settle {
            order_id,
            account,
            own: m.own.raw,
            counter: m.counter.raw,
        });
    }

    fn on_broadcast(
        &mut self,
        order_id: OrderId,
        account: AccountId,
        tx_ref: String,
        out: &mut Vec<EngineCommand>,
    ) {
        let Some(record) = self
            .fills
            .get_mut(order_id)
            .filter(|r| r.state == FillState::Settling && r.account == account)
        else {
            debug!(order_id, "broadcast for unknown fill");
            return;
        };
        record.tx_ref = Some(tx_ref.clone());
        info!(order_id, account, tx_ref = %tx_ref, "settlement broadcast");
        out.push(self.status(order_id, OrderStatus::Broadcast, Some(tx_ref), None));
    }

    fn on_settlement_finished(
        &mut self,
        order_id: OrderId,
        account: AccountId,
        result: WalletResult<SettlementReceipt>,
        out: &mut Vec<EngineCommand>,
    ) {
        let settling = self
            .fills
            .get(order_id)
            .is_some_and(|r| r.state == FillState::Settling && r.account == account);
        if !settling {
            warn!(order_id, account, "settlement result for unknown fill");
            return;
        }

        match result {
            Ok(SettlementReceipt { success: true, .. }) => self.confirm_fill(order_id, out),
            Ok(SettlementReceipt { error, .. }) => self.reject_fill(order_id, error, out),
            Err(e) => self.reject_fill(order_id, Some(e.to_string()), out),
        }
    }

    /// Settling -> Confirmed.
    fn confirm_fill(&mut self, order_id: OrderId, out: &mut Vec<EngineCommand>) {
        let record = match self.fills.advance(order_id, FillState::Confirmed) {
            Ok(record) => record.clone(),
            Err(e) => {
                warn!(error = %e, "cannot confirm fill");
                return;
            }
        };

        if let Some((counter_account, nonce)) = record.counter {
            self.nonces.confirm(counter_account, nonce);
        }

        info!(order_id, account = record.account, tx_ref = ?record.tx_ref, "fill confirmed");
        out.push(self.status(order_id, OrderStatus::Filled, record.tx_ref.clone(), None));

        let remembered = self
            .memory
            .get(order_id, self.clock.now_ms())
            .cloned()
            .or(record.pending);
        if let Some(order) = remembered {
            self.wallets.apply_fill(
                record.account,
                &order.sell_symbol,
                order.sell_quantity,
                &order.buy_symbol,
                order.buy_quantity,
            );
            self.after_fill(&order.market_id, out);
        }

        self.finish_fill(order_id, "filled");
    }

    /// Settling -> Rejected.
    fn reject_fill(&mut self, order_id: OrderId, error: Option<String>, out: &mut Vec<EngineCommand>) {
        let tx_ref = match self.fills.advance(order_id, FillState::Rejected) {
            Ok(record) => record.tx_ref.clone(),
            Err(e) => {
                warn!(error = %e, "cannot reject fill");
                return;
            }
        };
        let text = error.unwrap_or_else(|| UNKNOWN_ERROR.to_string());
        warn!(order_id, tx_ref = ?tx_ref, error = %text, "settlement failed");

        if text.to_lowercase().contains("balance") {
            out.push(EngineCommand::RefreshBalances {
                accounts: self.wallets.accounts(),
            });
        }
        out.push(self.status(
            order_id,
            OrderStatus::Rejected,
            tx_ref,
            Some(text.as_str()),
        ));
        self.finish_fill(order_id, "rejected");
    }

    /// Remove a fill and release its wallet unless another fill still holds it.
    fn finish_fill(&mut self, order_id: OrderId, status: &str) {
        let Some(record) = self.fills.finish(order_id) else {
            return;
        };
        if !self.fills.holds_wallet(record.account) {
            self.wallets.unlock(record.account);
        }
        let latency = record
            .matched_at_ms
            .map(|t| self.clock.now_ms().saturating_sub(t) as f64);
        Metrics::fill_finished(
            record.market_id.as_deref().unwrap_or("unknown"),
            status,
            latency,
        );
    }

    fn after_fill(&mut self, market_id: &str, out: &mut Vec<EngineCommand>) {
        let Some(pair) = self.pairs.get_mut(market_id) else {
            return;
        };
        let mut republish = false;

        for adjustment in Adjustment::plan_after_fill(pair) {
            adjustment.apply(pair);
            let event = match adjustment {
                Adjustment::Cooldown { secs } => {
                    let generation = self.cooldowns.start(market_id);
                    info!(market = market_id, secs, "cooling down after fill");
                    out.push(EngineCommand::Send(ExchangeMessage::indicate_liquidity(
                        self.chain_id,
                        market_id,
                        &[],
                        &self.client_id,
                    )));
                    Metrics::liquidity_published(market_id, "cancel");
                    TimerEvent::CooldownEnded {
                        market_id: market_id.to_string(),
                        generation,
                    }
                }
                Adjustment::WidenSpread { delta, .. } => {
                    republish = true;
                    TimerEvent::SpreadReverted {
                        market_id: market_id.to_string(),
                        delta,
                    }
                }
                Adjustment::ShiftSize { delta, .. } => {
                    republish = true;
                    TimerEvent::SizeReverted {
                        market_id: market_id.to_string(),
                        delta,
                    }
                }
            };
            out.push(EngineCommand::Schedule {
                delay: adjustment.delay(),
                event,
            });
        }

        if republish {
            self.publish_market(market_id, out);
        }
    }

    fn on_timer(&mut self, timer: TimerEvent, out: &mut Vec<EngineCommand>) {
        let market_id = match &timer {
            TimerEvent::CooldownEnded { market_id, .. }
            | TimerEvent::SpreadReverted { market_id, .. }
            | TimerEvent::SizeReverted { market_id, .. } => market_id.clone(),
        };
        let Some(pair) = self.pairs.get_mut(&market_id) else {
            return;
        };

        match timer {
            TimerEvent::CooldownEnded { generation, .. } => {
                if !self.cooldowns.finish(&market_id, generation) {
                    debug!(market = %market_id, generation, "superseded cooldown ignored");
                    return;
                }
                pair.active = true;
                info!(market = %market_id, "cooldown over, market active");
            }
            TimerEvent::SpreadReverted { delta, .. } => {
                pair.min_spread -= delta;
                debug!(market = %market_id, min_spread = %pair.min_spread, "spread reverted");
            }
            TimerEvent::SizeReverted { delta, .. } => {
                pair.max_size -= delta;
                debug!(market = %market_id, max_size = %pair.max_size, "size reverted");
            }
        }
        self.publish_market(&market_id, out);
    }

    fn on_market_info(&mut self, market: Market) {
        match self.markets.get(&market.id) {
            Some(previous) if previous.fees_changed(&market) => info!(
                market = %market.id,
                old_base_fee = %previous.base_fee,
                new_base_fee = %market.base_fee,
                old_quote_fee = %previous.quote_fee,
                new_quote_fee = %market.quote_fee,
                "market fees changed"
            ),
            Some(_) => {}
            None => info!(
                market = %market.id,
                base = %market.base.symbol,
                quote = %market.quote.symbol,
                "market info received"
            ),
        }
        self.markets.insert(market.id.clone(), market);
    }

    fn on_exchange_error(&mut self, op: Option<String>, account: Option<AccountId>) {
        match (op.as_deref(), account) {
            (Some("fillrequest"), Some(account)) => {
                self.fills.drop_unsent_for(account);
                if self.fills.holds_wallet(account) {
                    warn!(account, "fill request refused, wallet still settling");
                } else {
                    warn!(account, "fill request refused, releasing wallet");
                    self.wallets.unlock(account);
                }
            }
            _ => {
                let released = self.wallets.clear_all();
                let dropped = self.fills.drop_unsent();
                warn!(
                    op = ?op,
                    released_locks = released,
                    dropped_fills = dropped.len(),
                    "exchange error, releasing all wallets"
                );
            }
        }
    }

    fn on_tick(&mut self, tick: Tick, out: &mut Vec<EngineCommand>) {
        match tick {
            Tick::RetryOpenOrders if self.connected => self.retry_open_orders(out),
            Tick::IndicateLiquidity if self.connected => self.publish_all(out),
            Tick::RetryOpenOrders | Tick::IndicateLiquidity => {}
            Tick::RefreshBalances => out.push(EngineCommand::RefreshBalances {
                accounts: self.wallets.accounts(),
            }),
            Tick::HealthLog => self.log_health(),
        }
    }

    fn log_health(&self) {
        for (symbol, amount) in self.wallets.totals() {
            info!(asset = %symbol, total = %amount, "balance");
        }
        info!(
            connected = self.connected,
            in_flight = self.fills.len(),
            open_orders = self.open_orders.len(),
            locked_wallets = self.wallets.locked_count(),
            remembered = self.memory.len(),
            "health"
        );
    }

    fn publish_all(&mut self, out: &mut Vec<EngineCommand>) {
        let markets: Vec<MarketId> = self.pairs.keys().cloned().collect();
        for market_id in markets {
            self.publish_market(&market_id, out);
        }
    }

    fn publish_market(&self, market_id: &str, out: &mut Vec<EngineCommand>) {
        let (Some(pair), Some(market)) = (self.pairs.get(market_id), self.markets.get(market_id))
        else {
            return;
        };
        if !pair.active {
            return;
        }

        let mid = match self.quote_generator().mid_price(pair) {
            Ok(mid) => mid,
            Err(e @ FeedError::CircuitBreaker { .. }) => {
                Metrics::circuit_breaker(market_id);
                warn!(market = market_id, error = %e, "liquidity withheld");
                return;
            }
            Err(e) => {
                debug!(market = market_id, error = %e, "no price for liquidity");
                return;
            }
        };

        let ladder = build_ladder(
            pair,
            mid,
            self.wallets.richest(&market.base.symbol),
            self.wallets.richest(&market.quote.symbol),
            self.clock.now_secs(),
        );
        debug!(market = market_id, %mid, tiers = ladder.len(), "publishing liquidity");
        Metrics::liquidity_published(market_id, "ladder");
        out.push(EngineCommand::Send(ExchangeMessage::indicate_liquidity(
            self.chain_id,
            market_id,
            &ladder,
            &self.client_id,
        )));
    }

    fn status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        tx_ref: Option<String>,
        error: Option<&str>,
    ) -> EngineCommand {
        EngineCommand::Send(ExchangeMessage::order_status(&StatusUpdate {
            chain_id: self.chain_id,
            order_id,
            status,
            tx_ref,
            error: error.map(str::to_string),
        }))
    }
}
