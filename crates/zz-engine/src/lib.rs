//! Decision engine for the zz market maker.
//!
//! `MakerEngine` is an owned state machine: every input (exchange frame,
//! price tick, wallet completion, timer) is an `EngineEvent`, every side
//! effect is an `EngineCommand`. `EngineDriver` runs it on a single tokio
//! task and executes commands against the wallet service and the exchange.
//!
//! Building blocks:
//! - `quote`: spread + slippage pricing
//! - `fillability`: ordered checks deciding whether to fill an order
//! - `wallet`: balances and per-wallet broadcasting locks
//! - `lifecycle`: fill state machine records
//! - `memory`: short-lived record of orders we sent fill requests for
//! - `nonce`: counterparty nonce ledger
//! - `liquidity`: tiered liquidity ladder
//! - `adjust`: temporary post-fill reactions and their reversions

pub mod adjust;
pub mod driver;
pub mod engine;
pub mod error;
pub mod fillability;
pub mod lifecycle;
pub mod liquidity;
pub mod memory;
pub mod nonce;
pub mod quote;
pub mod service;
pub mod wallet;

pub use adjust::{Adjustment, CooldownTracker, TimerEvent};
pub use driver::{DriverIntervals, EngineDriver};
pub use engine::{EngineCommand, EngineConfig, EngineEvent, MakerEngine, Tick};
pub use error::{EngineError, EngineResult, WalletError, WalletResult};
pub use fillability::{Fillability, FillabilityEvaluator, RejectReason};
pub use lifecycle::{FillBook, FillRecord, FillState};
pub use liquidity::{build_ladder, LADDER_TIERS, LADDER_TTL_SECS};
pub use memory::{OrderMemory, RememberedOrder, ORDER_MEMORY_TTL_MS};
pub use nonce::NonceLedger;
pub use quote::{compute_quote, Quote, QuoteError, QuoteGenerator};
pub use service::{
    ExchangeSender, OrderIntent, PendingSettlement, RecordingSender, SettlementReceipt,
    SignedOrder, SimulatedWallet, WalletService,
};
pub use wallet::{WalletBook, WalletSelectError, BALANCE_HEADROOM};
