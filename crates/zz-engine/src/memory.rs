//! Short-lived memory of orders we sent fill requests for.
//!
//! The settlement path needs the market and amounts of the order after the
//! match arrives; entries expire 900 s after they were remembered.

use rust_decimal::Decimal;
use std::collections::HashMap;
use zz_core::{ChainId, MarketId, OrderId};

/// Retention of a remembered order.
pub const ORDER_MEMORY_TTL_MS: u64 = 900_000;

/// What we agreed to trade for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RememberedOrder {
    pub chain_id: ChainId,
    pub market_id: MarketId,
    pub price: Decimal,
    pub sell_symbol: String,
    pub sell_quantity: Decimal,
    pub buy_symbol: String,
    pub buy_quantity: Decimal,
    pub expires_at_ms: u64,
}

#[derive(Debug, Default)]
pub struct OrderMemory {
    orders: HashMap<OrderId, RememberedOrder>,
}

impl OrderMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `order`, stamping its expiry. Expired entries are purged first.
    pub fn remember(&mut self, order_id: OrderId, mut order: RememberedOrder, now_ms: u64) {
        self.orders.retain(|_, o| o.expires_at_ms >= now_ms);
        order.expires_at_ms = now_ms + ORDER_MEMORY_TTL_MS;
        self.orders.insert(order_id, order);
    }

    /// Remembered order, if still within its retention window.
    pub fn get(&self, order_id: OrderId, now_ms: u64) -> Option<&RememberedOrder> {
        self.orders
            .get(&order_id)
            .filter(|o| now_ms <= o.expires_at_ms)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
