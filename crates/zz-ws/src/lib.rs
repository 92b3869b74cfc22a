//! Exchange websocket transport for the zz market maker.
//!
//! Provides:
//! - `{op, args}` message codec (`ExchangeMessage`, `Inbound`)
//! - A supervised connection that reconnects after a fixed delay and
//!   re-subscribes every configured market
//! - A cloneable, channel-based write handle

pub mod connection;
pub mod error;
pub mod message;
pub mod ws_write_handle;

pub use connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, SubscriptionTarget, TransportEvent,
};
pub use error::{WsError, WsResult};
pub use message::{ExchangeMessage, Inbound, MatchedOrder, OrderMatch, OrderStatus, StatusUpdate};
pub use ws_write_handle::{SendError, WsWriteHandle};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
