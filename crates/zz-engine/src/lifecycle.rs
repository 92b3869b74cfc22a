//! Fill state machine.
//!
//! ```text
//! Idle -> RequestSent -> MatchPending -> Settling -> Confirmed
//!                              |             |
//!                              +-> Rejected <+
//! ```
//!
//! Idle is the absence of a record in the `FillBook`.

use std::collections::HashMap;
use zz_core::{AccountId, ChainId, MarketId, OrderId};

use crate::error::{EngineError, EngineResult};
use crate::memory::RememberedOrder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillState {
    /// Fill request being signed or sent; awaiting a match.
    RequestSent,
    /// Match received; nonce check pending.
    MatchPending,
    /// Settlement submitted to the wallet service.
    Settling,
    Confirmed,
    Rejected,
}

impl FillState {
    pub fn can_transition_to(&self, next: FillState) -> bool {
        use FillState::*;
        matches!(
            (self, next),
            (RequestSent, MatchPending)
                | (MatchPending, Settling)
                | (MatchPending, Rejected)
                | (Settling, Confirmed)
                | (Settling, Rejected)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FillState::Confirmed | FillState::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FillState::RequestSent => "request_sent",
            FillState::MatchPending => "match_pending",
            FillState::Settling => "settling",
            FillState::Confirmed => "confirmed",
            FillState::Rejected => "rejected",
        }
    }
}

/// One in-flight fill.
#[derive(Debug, Clone)]
pub struct FillRecord {
    pub order_id: OrderId,
    pub chain_id: ChainId,
    /// Our wallet; holds the broadcasting lock while the record exists.
    pub account: AccountId,
    pub market_id: Option<MarketId>,
    pub state: FillState,
    /// Amounts agreed in the fill request, once sent.
    pub pending: Option<RememberedOrder>,
    /// Counterparty `(account, nonce)` from the match.
    pub counter: Option<(AccountId, u64)>,
    pub tx_ref: Option<String>,
    pub matched_at_ms: Option<u64>,
}

/// In-flight fills keyed by order id.
#[derive(Debug, Default)]
pub struct FillBook {
    fills: HashMap<OrderId, FillRecord>,
}

impl FillBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record in `initial` state, replacing nothing.
    pub fn begin(
        &mut self,
        order_id: OrderId,
        chain_id: ChainId,
        account: AccountId,
        market_id: Option<MarketId>,
        initial: FillState,
    ) -> &mut FillRecord {
        self.fills.entry(order_id).or_insert(FillRecord {
            order_id,
            chain_id,
            account,
            market_id,
            state: initial,
            pending: None,
            counter: None,
            tx_ref: None,
            matched_at_ms: None,
        })
    }

    pub fn get(&self, order_id: OrderId) -> Option<&FillRecord> {
        self.fills.get(&order_id)
    }

    pub fn get_mut(&mut self, order_id: OrderId) -> Option<&mut FillRecord> {
        self.fills.get_mut(&order_id)
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.fills.contains_key(&order_id)
    }

    /// Move a fill to `next`, enforcing the state machine.
    pub fn advance(&mut self, order_id: OrderId, next: FillState) -> EngineResult<&mut FillRecord> {
        let record = self
            .fills
            .get_mut(&order_id)
            .ok_or(EngineError::UnknownFill(order_id))?;
        if !record.state.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                order_id,
                from: record.state,
                to: next,
            });
        }
        record.state = next;
        Ok(record)
    }

    /// Remove a finished fill.
    pub fn finish(&mut self, order_id: OrderId) -> Option<FillRecord> {
        self.fills.remove(&order_id)
    }

    /// Drop every fill that was never matched; returns them.
    pub fn drop_unsent(&mut self) -> Vec<FillRecord> {
        self.drain_where(|r| r.state == FillState::RequestSent)
    }

    /// Drop unmatched fills held by `account`.
    pub fn drop_unsent_for(&mut self, account: AccountId) -> Vec<FillRecord> {
        self.drain_where(|r| r.state == FillState::RequestSent && r.account == account)
    }

    fn drain_where(&mut self, pred: impl Fn(&FillRecord) -> bool) -> Vec<FillRecord> {
        let ids: Vec<OrderId> = self
            .fills
            .values()
            .filter(|r| pred(r))
            .map(|r| r.order_id)
            .collect();
        ids.into_iter()
            .filter_map(|id| self.fills.remove(&id))
            .collect()
    }

    /// True while any unfinished fill, in any stage, is booked on `account`.
    pub fn holds_wallet(&self, account: AccountId) -> bool {
        self.fills
            .values()
            .any(|r| r.account == account && !r.state.is_terminal())
    }

    pub fn len(&self) -> usize {
        self.fills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fills.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use FillState::*;
        assert!(RequestSent.can_transition_to(MatchPending));
        assert!(MatchPending.can_transition_to(Settling));
        assert!(MatchPending.can_transition_to(Rejected));
        assert!(Settling.can_transition_to(Confirmed));
        assert!(Settling.can_transition_to(Rejected));

        assert!(!RequestSent.can_transition_to(Settling));
        assert!(!RequestSent.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Settling));
        assert!(Confirmed.is_terminal() && Rejected.is_terminal());
        assert!(!Settling.is_terminal());
    }

    #[test]
    fn test_advance_enforces_state_machine() {
        let mut book = FillBook::new();
        book.begin(42, 1000, 1, Some("ETH-USDC".to_string()), FillState::RequestSent);

        let err = book.advance(42, FillState::Confirmed).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { order_id: 42, .. }));

        book.advance(42, FillState::MatchPending).unwrap();
        book.advance(42, FillState::Settling).unwrap();
        let record = book.advance(42, FillState::Confirmed).unwrap();
        assert_eq!(record.state, FillState::Confirmed);

        assert!(matches!(
            book.advance(7, FillState::MatchPending),
            Err(EngineError::UnknownFill(7))
        ));
    }

    #[test]
    fn test_drop_unsent_keeps_matched() {
        let mut book = FillBook::new();
        book.begin(1, 1000, 1, None, FillState::RequestSent);
        book.begin(2, 1000, 2, None, FillState::RequestSent);
        book.begin(3, 1000, 3, None, FillState::Settling);

        let dropped = book.drop_unsent_for(1);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].order_id, 1);

        let dropped = book.drop_unsent();
        assert_eq!(dropped.len(), 1);
        assert_eq!(book.len(), 1);
        assert!(book.contains(3));
        assert!(book.holds_wallet(3));
        assert!(!book.holds_wallet(1));
    }

    #[test]
    fn test_unmatched_request_holds_wallet() {
        let mut book = FillBook::new();
        book.begin(5, 1000, 1, None, FillState::RequestSent);
        assert!(book.holds_wallet(1));

        book.advance(5, FillState::MatchPending).unwrap();
        book.advance(5, FillState::Rejected).unwrap();
        assert!(!book.holds_wallet(1));
        assert!(!book.holds_wallet(2));
    }
}
