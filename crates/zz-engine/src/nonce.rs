//! Counterparty nonce ledger.
//!
//! A match is only settled if the counter-order's nonce is strictly greater
//! than the last nonce confirmed for that account. The ledger only advances
//! on confirmed settlements.

use std::collections::HashMap;
use zz_core::AccountId;

#[derive(Debug, Clone, Default)]
pub struct NonceLedger {
    last: HashMap<AccountId, u64>,
}

impl NonceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `nonce` is newer than anything confirmed for `account`.
    pub fn accepts(&self, account: AccountId, nonce: u64) -> bool {
        self.last.get(&account).map_or(true, |last| nonce > *last)
    }

    /// Record a confirmed nonce. Never moves backwards.
    pub fn confirm(&mut self, account: AccountId, nonce: u64) {
        let entry = self.last.entry(account).or_insert(nonce);
        if nonce > *entry {
            *entry = nonce;
        }
    }

    pub fn last(&self, account: AccountId) -> Option<u64> {
        self.last.get(&account).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_account_accepts_any_nonce() {
        let ledger = NonceLedger::new();
        assert!(ledger.accepts(9, 0));
        assert_eq!(ledger.last(9), None);
    }

    #[test]
    fn test_replayed_nonce_rejected() {
        let mut ledger = NonceLedger::new();
        ledger.confirm(9, 17);
        assert!(!ledger.accepts(9, 17));
        assert!(!ledger.accepts(9, 3));
        assert!(ledger.accepts(9, 18));
        assert!(ledger.accepts(10, 1));
    }

    #[test]
    fn test_ledger_is_monotonic() {
        let mut ledger = NonceLedger::new();
        ledger.confirm(9, 17);
        ledger.confirm(9, 12);
        assert_eq!(ledger.last(9), Some(17));
        ledger.confirm(9, 20);
        assert_eq!(ledger.last(9), Some(20));
    }
}
