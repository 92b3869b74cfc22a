//! Engine error types.

use thiserror::Error;
use zz_core::{AccountId, OrderId};

use crate::lifecycle::FillState;

/// Errors reported by the wallet service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("Unknown account: {0}")]
    UnknownAccount(AccountId),

    #[error("Wallet unavailable: {0}")]
    Unavailable(String),

    #[error("Settlement rejected: {0}")]
    Rejected(String),
}

pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Order {order_id}: invalid fill transition {from:?} -> {to:?}")]
    InvalidTransition {
        order_id: OrderId,
        from: FillState,
        to: FillState,
    },

    #[error("Unknown fill: {0}")]
    UnknownFill(OrderId),
}

pub type EngineResult<T> = Result<T, EngineError>;
