//! Wallet balances and broadcasting locks.
//!
//! Each wallet may have at most one fill in flight. The lock is taken when a
//! fill request is sent (or a late match is accepted) and released when the
//! fill reaches a terminal state, on disconnect, or on an exchange error.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use zz_core::AccountId;

/// Required balance multiple over the sell amount (105%).
pub const BALANCE_HEADROOM: Decimal = Decimal::from_parts(105, 0, 0, false, 2);

/// Why no wallet could be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletSelectError {
    /// No wallet holds enough of the sell asset.
    NoBalance,
    /// Wallets with enough balance exist but all are locked.
    AllBusy,
}

#[derive(Debug, Clone, Default)]
struct WalletState {
    balances: HashMap<String, Decimal>,
    broadcasting: bool,
}

/// All custodial wallets, iterated in ascending account order.
#[derive(Debug, Clone, Default)]
pub struct WalletBook {
    wallets: BTreeMap<AccountId, WalletState>,
}

impl WalletBook {
    pub fn new(accounts: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            wallets: accounts
                .into_iter()
                .map(|a| (a, WalletState::default()))
                .collect(),
        }
    }

    pub fn contains(&self, account: AccountId) -> bool {
        self.wallets.contains_key(&account)
    }

    pub fn accounts(&self) -> Vec<AccountId> {
        self.wallets.keys().copied().collect()
    }

    /// Committed balance of `symbol` (zero if unknown).
    pub fn balance(&self, account: AccountId, symbol: &str) -> Decimal {
        self.wallets
            .get(&account)
            .and_then(|w| w.balances.get(symbol))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Replace a wallet's balances with a fresh snapshot.
    pub fn set_balances(&mut self, account: AccountId, balances: HashMap<String, Decimal>) {
        if let Some(wallet) = self.wallets.get_mut(&account) {
            wallet.balances = balances;
        }
    }

    /// Take the broadcasting lock. False if unknown or already locked.
    pub fn try_lock(&mut self, account: AccountId) -> bool {
        match self.wallets.get_mut(&account) {
            Some(wallet) if !wallet.broadcasting => {
                wallet.broadcasting = true;
                true
            }
            _ => false,
        }
    }

    pub fn unlock(&mut self, account: AccountId) {
        if let Some(wallet) = self.wallets.get_mut(&account) {
            wallet.broadcasting = false;
        }
    }

    pub fn is_locked(&self, account: AccountId) -> bool {
        self.wallets
            .get(&account)
            .map(|w| w.broadcasting)
            .unwrap_or(false)
    }

    /// Release every lock; returns how many were held.
    pub fn clear_all(&mut self) -> usize {
        let mut released = 0;
        for wallet in self.wallets.values_mut() {
            if wallet.broadcasting {
                wallet.broadcasting = false;
                released += 1;
            }
        }
        released
    }

    pub fn locked_count(&self) -> usize {
        self.wallets.values().filter(|w| w.broadcasting).count()
    }

    /// First unlocked wallet holding at least 105% of `amount` of `symbol`.
    pub fn select(&self, symbol: &str, amount: Decimal) -> Result<AccountId, WalletSelectError> {
        let Some(required) = amount.checked_mul(BALANCE_HEADROOM) else {
            return Err(WalletSelectError::NoBalance);
        };
        let mut funded = false;

        for (account, wallet) in &self.wallets {
            let balance = wallet.balances.get(symbol).copied().unwrap_or(Decimal::ZERO);
            if balance < required {
                continue;
            }
            funded = true;
            if !wallet.broadcasting {
                return Ok(*account);
            }
        }

        if funded {
            Err(WalletSelectError::AllBusy)
        } else {
            Err(WalletSelectError::NoBalance)
        }
    }

    /// Largest single-wallet balance of `symbol`.
    pub fn richest(&self, symbol: &str) -> Decimal {
        self.wallets
            .values()
            .filter_map(|w| w.balances.get(symbol))
            .copied()
            .max()
            .unwrap_or(Decimal::ZERO)
    }

    /// Balances summed across wallets per asset.
    pub fn totals(&self) -> BTreeMap<String, Decimal> {
        let mut totals = BTreeMap::new();
        for wallet in self.wallets.values() {
            for (symbol, amount) in &wallet.balances {
                *totals.entry(symbol.clone()).or_insert(Decimal::ZERO) += *amount;
            }
        }
        totals
    }

    /// Book a settled fill against a wallet's balances.
    pub fn apply_fill(
        &mut self,
        account: AccountId,
        sell_symbol: &str,
        sell_quantity: Decimal,
        buy_symbol: &str,
        buy_quantity: Decimal,
    ) {
        let Some(wallet) = self.wallets.get_mut(&account) else {
            return;
        };
        *wallet
            .balances
            .entry(sell_symbol.to_string())
            .or_insert(Decimal::ZERO) -= sell_quantity;
        *wallet
            .balances
            .entry(buy_symbol.to_string())
            .or_insert(Decimal::ZERO) += buy_quantity;
        debug!(account, sell_symbol, %sell_quantity, buy_symbol, %buy_quantity, "balances booked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> WalletBook {
        let mut book = WalletBook::new([2, 1]);
        book.set_balances(1, HashMap::from([("USDC".to_string(), dec!(100))]));
        book.set_balances(2, HashMap::from([("USDC".to_string(), dec!(0))]));
        book
    }

    #[test]
    fn test_headroom_constant() {
        assert_eq!(BALANCE_HEADROOM, dec!(1.05));
    }

    #[test]
    fn test_select_funded_wallet() {
        let book = book();
        assert_eq!(book.select("USDC", dec!(50)), Ok(1));
    }

    #[test]
    fn test_select_requires_headroom() {
        let book = book();
        // 100 / 1.05 = 95.238...
        assert_eq!(book.select("USDC", dec!(95)), Ok(1));
        assert_eq!(book.select("USDC", dec!(96)), Err(WalletSelectError::NoBalance));
        assert_eq!(book.select("ETH", dec!(1)), Err(WalletSelectError::NoBalance));
    }

    #[test]
    fn test_select_oversized_amount_is_unfunded() {
        let book = book();
        assert_eq!(book.select("USDC", Decimal::MAX), Err(WalletSelectError::NoBalance));
    }

    #[test]
    fn test_locked_wallet_is_never_selected() {
        let mut book = book();
        book.set_balances(2, HashMap::from([("USDC".to_string(), dec!(1000))]));

        assert_eq!(book.select("USDC", dec!(50)), Ok(1));
        assert!(book.try_lock(1));
        assert_eq!(book.select("USDC", dec!(50)), Ok(2));
        assert!(book.try_lock(2));
        assert_eq!(book.select("USDC", dec!(50)), Err(WalletSelectError::AllBusy));
    }

    #[test]
    fn test_lock_lifecycle() {
        let mut book = book();
        assert!(book.try_lock(1));
        assert!(!book.try_lock(1));
        assert!(!book.try_lock(99));
        assert_eq!(book.locked_count(), 1);

        book.unlock(1);
        assert!(!book.is_locked(1));

        book.try_lock(1);
        book.try_lock(2);
        assert_eq!(book.clear_all(), 2);
        assert_eq!(book.locked_count(), 0);
    }

    #[test]
    fn test_richest_is_single_wallet() {
        let mut book = book();
        book.set_balances(2, HashMap::from([("USDC".to_string(), dec!(60))]));
        assert_eq!(book.richest("USDC"), dec!(100));
        assert_eq!(book.totals()["USDC"], dec!(160));
        assert_eq!(book.richest("ETH"), dec!(0));
    }

    #[test]
    fn test_apply_fill() {
        let mut book = book();
        book.apply_fill(1, "USDC", dec!(40), "ETH", dec!(0.02));
        assert_eq!(book.balance(1, "USDC"), dec!(60));
        assert_eq!(book.balance(1, "ETH"), dec!(0.02));
    }
}
