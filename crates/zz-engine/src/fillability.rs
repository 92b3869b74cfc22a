//! Decides whether an incoming order should be filled, and by which wallet.

use zz_core::{AccountId, ExchangeOrder, Side};

use crate::quote::{Quote, QuoteError, QuoteGenerator};
use crate::wallet::{WalletBook, WalletSelectError};

/// Why an order was not filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    BadChain,
    BadMarket,
    InactiveMarket,
    BadBalance,
    AlreadyBroadcasting,
    Expired,
    BadSide,
    BadSize,
    Pricing(QuoteError),
    BadPrice,
}

impl RejectReason {
    /// Only price mismatches are worth re-evaluating later; the mid may move.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RejectReason::BadPrice)
    }

    /// Metric label.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::BadChain => "bad_chain",
            RejectReason::BadMarket => "bad_market",
            RejectReason::InactiveMarket => "inactive_market",
            RejectReason::BadBalance => "bad_balance",
            RejectReason::AlreadyBroadcasting => "already_broadcasting",
            RejectReason::Expired => "expired",
            RejectReason::BadSide => "bad_side",
            RejectReason::BadSize => "bad_size",
            RejectReason::Pricing(QuoteError::Feed(_)) => "feed",
            RejectReason::Pricing(_) => "pricing",
            RejectReason::BadPrice => "bad_price",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fillability {
    Fillable { wallet: AccountId, quote: Quote },
    Rejected(RejectReason),
}

pub struct FillabilityEvaluator<'a> {
    pub quotes: QuoteGenerator<'a>,
    pub wallets: &'a WalletBook,
}

impl<'a> FillabilityEvaluator<'a> {
    /// Run the checks in order, stopping at the first failure.
    pub fn evaluate(&self, order: &ExchangeOrder, now_secs: u64) -> Fillability {
        match self.check(order, now_secs) {
            Ok((wallet, quote)) => Fillability::Fillable { wallet, quote },
            Err(reason) => Fillability::Rejected(reason),
        }
    }

    fn check(&self, order: &ExchangeOrder, now_secs: u64) -> Result<(AccountId, Quote), RejectReason> {
        if order.chain_id != self.quotes.chain_id {
            return Err(RejectReason::BadChain);
        }
        let market = self
            .quotes
            .markets
            .get(&order.market_id)
            .ok_or(RejectReason::BadMarket)?;
        let pair = self
            .quotes
            .pairs
            .get(&order.market_id)
            .filter(|p| p.active)
            .ok_or(RejectReason::InactiveMarket)?;

        let (sell_symbol, sell_amount) = match order.side {
            Side::Sell => (&market.quote.symbol, order.quote_quantity),
            Side::Buy => (&market.base.symbol, order.base_quantity),
        };
        let wallet = self
            .wallets
            .select(sell_symbol, sell_amount)
            .map_err(|e| match e {
                WalletSelectError::NoBalance => RejectReason::BadBalance,
                WalletSelectError::AllBusy => RejectReason::AlreadyBroadcasting,
            })?;

        if order.is_expired(now_secs) {
            return Err(RejectReason::Expired);
        }
        if pair.side.forbids(order.side) {
            return Err(RejectReason::BadSide);
        }
        if !pair.size_in_range(order.base_quantity) {
            return Err(RejectReason::BadSize);
        }

        let quote = self
            .quotes
            .quote(order.chain_id, &order.market_id, order.side, order.base_quantity)
            .map_err(RejectReason::Pricing)?;

        let bad_price = match order.side {
            Side::Sell => order.price > quote.price,
            Side::Buy => order.price < quote.price,
        };
        if bad_price {
            return Err(RejectReason::BadPrice);
        }

        Ok((wallet, quote))
    }
}
