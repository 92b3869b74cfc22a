//! Collaborator seams: the custodial wallet service and the exchange sender.
//!
//! Both are dyn-compatible traits returning `BoxFuture`s so the driver can
//! hold them as `Arc<dyn ...>` and tests can swap in recording mocks.

use parking_lot::Mutex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use zz_core::decimal::decimal_to_value;
use zz_core::{AccountId, AssetInfo, BoxFuture, ChainId, ExchangeOrder, Market, MarketId, Side};
use zz_ws::{ExchangeMessage, SendError, WsWriteHandle};

use crate::error::{WalletError, WalletResult};
use crate::quote::Quote;

/// Sell side is padded up and buy side trimmed by one basis point.
const SELL_PROTECTION: Decimal = Decimal::from_parts(10001, 0, 0, false, 4);
const BUY_PROTECTION: Decimal = Decimal::from_parts(9999, 0, 0, false, 4);

/// Fill intents are valid for one minute.
pub const INTENT_VALIDITY_SECS: u64 = 60;

/// What a wallet is asked to sign for a fill request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderIntent {
    pub chain_id: ChainId,
    pub market_id: MarketId,
    pub sell_asset: AssetInfo,
    pub buy_asset: AssetInfo,
    pub sell_amount: Decimal,
    pub buy_amount: Decimal,
    /// Unix seconds.
    pub valid_until: u64,
}

impl OrderIntent {
    /// Counter-intent filling `order` at `quote`; `None` if the padded
    /// amounts do not fit a decimal.
    pub fn for_fill(
        order: &ExchangeOrder,
        market: &Market,
        quote: &Quote,
        now_secs: u64,
    ) -> Option<Self> {
        let (sell_asset, sell_raw, buy_asset, buy_raw) = match order.side {
            Side::Buy => (
                &market.base,
                order.base_quantity,
                &market.quote,
                quote.quote_quantity,
            ),
            Side::Sell => (
                &market.quote,
                quote.quote_quantity,
                &market.base,
                order.base_quantity,
            ),
        };
        let sell_amount = sell_raw.checked_mul(SELL_PROTECTION)?;
        let buy_amount = buy_raw.checked_mul(BUY_PROTECTION)?;
        Some(Self {
            chain_id: order.chain_id,
            market_id: order.market_id.clone(),
            sell_amount: to_asset_units(sell_amount, sell_asset),
            buy_amount: to_asset_units(buy_amount, buy_asset),
            sell_asset: sell_asset.clone(),
            buy_asset: buy_asset.clone(),
            valid_until: now_secs.saturating_add(INTENT_VALIDITY_SECS),
        })
    }
}

fn to_asset_units(amount: Decimal, asset: &AssetInfo) -> Decimal {
    amount
        .round_dp_with_strategy(asset.decimals.min(28), RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// Signed fill order, opaque to the maker.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedOrder(pub Value);

/// Final outcome of a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReceipt {
    pub success: bool,
    pub error: Option<String>,
}

/// A submitted settlement: the tx reference is known before the receipt.
pub struct PendingSettlement {
    pub tx_ref: String,
    pub receipt: BoxFuture<'static, WalletResult<SettlementReceipt>>,
}

impl std::fmt::Debug for PendingSettlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingSettlement")
            .field("tx_ref", &self.tx_ref)
            .finish_non_exhaustive()
    }
}

/// Custodial wallet operations.
pub trait WalletService: Send + Sync {
    /// Accounts this service can sign for.
    fn accounts(&self) -> Vec<AccountId>;

    /// Committed balances by asset symbol.
    fn balances(&self, account: AccountId) -> BoxFuture<'_, WalletResult<HashMap<String, Decimal>>>;

    /// Sign a fill intent.
    fn build_order_intent(
        &self,
        account: AccountId,
        intent: OrderIntent,
    ) -> BoxFuture<'_, WalletResult<SignedOrder>>;

    /// Submit the matched pair of orders for settlement.
    fn settle(
        &self,
        account: AccountId,
        own: Value,
        counter: Value,
    ) -> BoxFuture<'_, WalletResult<PendingSettlement>>;
}

/// Outbound exchange frames.
pub trait ExchangeSender: Send + Sync {
    fn send(&self, msg: ExchangeMessage) -> BoxFuture<'_, Result<(), SendError>>;
}

impl ExchangeSender for WsWriteHandle {
    fn send(&self, msg: ExchangeMessage) -> BoxFuture<'_, Result<(), SendError>> {
        Box::pin(async move { WsWriteHandle::send(self, &msg).await })
    }
}

/// Sender that records frames instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<ExchangeMessage>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<ExchangeMessage> {
        self.sent.lock().clone()
    }

    /// Recorded frames with the given op.
    pub fn sent_with_op(&self, op: &str) -> Vec<ExchangeMessage> {
        self.sent.lock().iter().filter(|m| m.op == op).cloned().collect()
    }
}

impl ExchangeSender for RecordingSender {
    fn send(&self, msg: ExchangeMessage) -> BoxFuture<'_, Result<(), SendError>> {
        Box::pin(async move {
            self.sent.lock().push(msg);
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
struct SimState {
    balances: HashMap<AccountId, HashMap<String, Decimal>>,
    nonces: HashMap<AccountId, u64>,
    outcomes: VecDeque<WalletResult<SettlementReceipt>>,
    signed: Vec<(AccountId, OrderIntent)>,
    settlements: Vec<(AccountId, Value, Value)>,
    tx_counter: u64,
}

/// Paper-trading wallet service.
///
/// Signs intents into plain JSON orders, hands out sequential tx references
/// (`sim:00000001`, ...) and settles successfully unless an outcome was
/// queued with `push_outcome`.
#[derive(Debug, Default)]
pub struct SimulatedWallet {
    state: Mutex<SimState>,
}

impl SimulatedWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, account: AccountId, balances: HashMap<String, Decimal>) -> Self {
        self.state.lock().balances.insert(account, balances);
        self
    }

    /// Queue the receipt returned by the next settlement.
    pub fn push_outcome(&self, outcome: WalletResult<SettlementReceipt>) {
        self.state.lock().outcomes.push_back(outcome);
    }

    pub fn signed_intents(&self) -> Vec<(AccountId, OrderIntent)> {
        self.state.lock().signed.clone()
    }

    pub fn settlements(&self) -> Vec<(AccountId, Value, Value)> {
        self.state.lock().settlements.clone()
    }
}

impl WalletService for SimulatedWallet {
    fn accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = self.state.lock().balances.keys().copied().collect();
        accounts.sort_unstable();
        accounts
    }

    fn balances(&self, account: AccountId) -> BoxFuture<'_, WalletResult<HashMap<String, Decimal>>> {
        let result = self
            .state
            .lock()
            .balances
            .get(&account)
            .cloned()
            .ok_or(WalletError::UnknownAccount(account));
        Box::pin(async move { result })
    }

    fn build_order_intent(
        &self,
        account: AccountId,
        intent: OrderIntent,
    ) -> BoxFuture<'_, WalletResult<SignedOrder>> {
        let result = {
            let mut state = self.state.lock();
            if !state.balances.contains_key(&account) {
                Err(WalletError::UnknownAccount(account))
            } else {
                let nonce = state.nonces.entry(account).or_insert(0);
                *nonce += 1;
                let signed = json!({
                    "accountId": account,
                    "nonce": *nonce,
                    "tokenSell": intent.sell_asset.id,
                    "tokenBuy": intent.buy_asset.id,
                    "amount": decimal_to_value(intent.sell_amount),
                    "ratio": [
                        decimal_to_value(intent.buy_amount),
                        decimal_to_value(intent.sell_amount)
                    ],
                    "validUntil": intent.valid_until,
                });
                state.signed.push((account, intent));
                Ok(SignedOrder(signed))
            }
        };
        Box::pin(async move { result })
    }

    fn settle(
        &self,
        account: AccountId,
        own: Value,
        counter: Value,
    ) -> BoxFuture<'_, WalletResult<PendingSettlement>> {
        let result = {
            let mut state = self.state.lock();
            if !state.balances.contains_key(&account) {
                Err(WalletError::UnknownAccount(account))
            } else {
                state.tx_counter += 1;
                let tx_ref = format!("sim:{:08x}", state.tx_counter);
                let outcome = state.outcomes.pop_front().unwrap_or(Ok(SettlementReceipt {
                    success: true,
                    error: None,
                }));
                state.settlements.push((account, own, counter));
                Ok(PendingSettlement {
                    tx_ref,
                    receipt: Box::pin(async move { outcome }),
                })
            }
        };
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market() -> Market {
        Market {
            id: "ETH-USDC".to_string(),
            base: AssetInfo::new("ETH", 18, 0),
            quote: AssetInfo::new("USDC", 6, 2),
            base_fee: dec!(0),
            quote_fee: dec!(0),
        }
    }

    fn order(side: Side) -> ExchangeOrder {
        ExchangeOrder {
            chain_id: 1000,
            order_id: 42,
            market_id: "ETH-USDC".to_string(),
            side,
            price: dec!(2002.2),
            base_quantity: dec!(1),
            quote_quantity: dec!(2002.2),
            expires: 2_000,
        }
    }

    #[test]
    fn test_intent_for_user_buy_sells_base() {
        let quote = Quote {
            price: dec!(2002.2),
            quote_quantity: dec!(2002.2),
        };
        let intent = OrderIntent::for_fill(&order(Side::Buy), &market(), &quote, 1_000).unwrap();
        assert_eq!(intent.sell_asset.symbol, "ETH");
        assert_eq!(intent.sell_amount, dec!(1.0001));
        assert_eq!(intent.buy_asset.symbol, "USDC");
        // 2002.2 * 0.9999, already within 6 decimals
        assert_eq!(intent.buy_amount, dec!(2001.99978));
        assert_eq!(intent.valid_until, 1_060);
    }

    #[test]
    fn test_intent_for_user_sell_sells_quote() {
        let quote = Quote {
            price: dec!(1998),
            quote_quantity: dec!(1998),
        };
        let intent = OrderIntent::for_fill(&order(Side::Sell), &market(), &quote, 1_000).unwrap();
        assert_eq!(intent.sell_asset.symbol, "USDC");
        assert_eq!(intent.sell_amount, dec!(1998.1998));
        assert_eq!(intent.buy_asset.symbol, "ETH");
        assert_eq!(intent.buy_amount, dec!(0.9999));
    }

    #[test]
    fn test_intent_rounds_to_asset_decimals() {
        let mut market = market();
        market.quote.decimals = 2;
        let quote = Quote {
            price: dec!(2002.2),
            quote_quantity: dec!(2002.2),
        };
        let intent = OrderIntent::for_fill(&order(Side::Buy), &market, &quote, 0).unwrap();
        assert_eq!(intent.buy_amount, dec!(2002.00));
    }

    #[test]
    fn test_intent_refuses_amounts_beyond_decimal_range() {
        let mut huge = order(Side::Buy);
        huge.base_quantity = Decimal::MAX;
        let quote = Quote {
            price: dec!(2002.2),
            quote_quantity: dec!(2002.2),
        };
        assert!(OrderIntent::for_fill(&huge, &market(), &quote, 0).is_none());
    }

    #[tokio::test]
    async fn test_simulated_wallet_signs_and_settles() {
        let wallet = SimulatedWallet::new()
            .with_account(7, HashMap::from([("ETH".to_string(), dec!(3))]));
        assert_eq!(wallet.accounts(), vec![7]);
        assert_eq!(wallet.balances(7).await.unwrap()["ETH"], dec!(3));
        assert_eq!(
            wallet.balances(8).await.unwrap_err(),
            WalletError::UnknownAccount(8)
        );

        let quote = Quote {
            price: dec!(2002.2),
            quote_quantity: dec!(2002.2),
        };
        let intent = OrderIntent::for_fill(&order(Side::Buy), &market(), &quote, 0).unwrap();
        let SignedOrder(signed) = wallet.build_order_intent(7, intent).await.unwrap();
        assert_eq!(signed["accountId"], 7);
        assert_eq!(signed["nonce"], 1);
        assert_eq!(wallet.signed_intents().len(), 1);

        wallet.push_outcome(Ok(SettlementReceipt {
            success: false,
            error: Some("insufficient balance".to_string()),
        }));
        let pending = wallet.settle(7, signed.clone(), json!({})).await.unwrap();
        assert_eq!(pending.tx_ref, "sim:00000001");
        let receipt = pending.receipt.await.unwrap();
        assert!(!receipt.success);

        let pending = wallet.settle(7, signed, json!({})).await.unwrap();
        assert_eq!(pending.tx_ref, "sim:00000002");
        assert!(pending.receipt.await.unwrap().success);
        assert_eq!(wallet.settlements().len(), 2);
    }

    #[tokio::test]
    async fn test_recording_sender() {
        let sender = RecordingSender::new();
        sender
            .send(ExchangeMessage::subscribe_market(1000, "ETH-USDC"))
            .await
            .unwrap();
        assert_eq!(sender.sent_with_op("subscribemarket").len(), 1);
        assert!(sender.sent_with_op("fillrequest").is_empty());
    }
}
