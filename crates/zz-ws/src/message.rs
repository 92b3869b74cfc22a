//! Exchange message codec.
//!
//! Every frame is `{"op": <tag>, "args": [...]}`. Inbound frames are decoded
//! into `Inbound`; outbound frames are built with the `ExchangeMessage`
//! constructors.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;
use zz_core::decimal::{decimal_from_value, decimal_to_value};
use zz_core::{
    AccountId, AssetInfo, ChainId, ExchangeOrder, LiquidityEntry, Market, OrderId, Side,
};

use crate::error::{WsError, WsResult};

/// Raw `{op, args}` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeMessage {
    pub op: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl ExchangeMessage {
    pub fn new(op: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            op: op.into(),
            args,
        }
    }

    /// `subscribemarket [chain, market]`
    pub fn subscribe_market(chain_id: ChainId, market_id: &str) -> Self {
        Self::new("subscribemarket", vec![json!(chain_id), json!(market_id)])
    }

    /// `fillrequest [chain, orderId, signedOrder]`
    pub fn fill_request(chain_id: ChainId, order_id: OrderId, signed_order: Value) -> Self {
        Self::new(
            "fillrequest",
            vec![json!(chain_id), json!(order_id), signed_order],
        )
    }

    /// `orderstatusupdate [[[chain, orderId, status, txRef, error]]]`
    pub fn order_status(update: &StatusUpdate) -> Self {
        let row = json!([
            update.chain_id,
            update.order_id,
            update.status.as_str(),
            update.tx_ref,
            update.error,
        ]);
        Self::new("orderstatusupdate", vec![json!([row])])
    }

    /// `indicateliq2 [chain, market, ladder, clientId]`; an empty ladder cancels.
    pub fn indicate_liquidity(
        chain_id: ChainId,
        market_id: &str,
        ladder: &[LiquidityEntry],
        client_id: &str,
    ) -> Self {
        let entries: Vec<Value> = ladder
            .iter()
            .map(|e| {
                json!([
                    e.side.as_str(),
                    decimal_to_value(e.price),
                    decimal_to_value(e.size),
                    e.expires
                ])
            })
            .collect();
        Self::new(
            "indicateliq2",
            vec![
                json!(chain_id),
                json!(market_id),
                Value::Array(entries),
                json!(client_id),
            ],
        )
    }

    pub fn to_json(&self) -> WsResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Fill status reported back to the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    /// `r`
    Rejected,
    /// `b`: settlement submitted, tx reference known.
    Broadcast,
    /// `f`
    Filled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Rejected => "r",
            OrderStatus::Broadcast => "b",
            OrderStatus::Filled => "f",
        }
    }
}

/// One row of an `orderstatusupdate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub chain_id: ChainId,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub tx_ref: Option<String>,
    pub error: Option<String>,
}

/// One side of a `userordermatch`. `raw` is handed to the wallet untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedOrder {
    pub account_id: AccountId,
    pub nonce: u64,
    pub raw: Value,
}

/// The exchange matched a user order against our fill request.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderMatch {
    pub chain_id: ChainId,
    pub order_id: OrderId,
    /// The user's order.
    pub counter: MatchedOrder,
    /// Our signed fill order; `account_id` names our wallet.
    pub own: MatchedOrder,
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Orders(Vec<ExchangeOrder>),
    UserOrderMatch(OrderMatch),
    MarketInfo(Market),
    Error {
        op: Option<String>,
        account_id: Option<AccountId>,
    },
    /// Any op the maker does not act on.
    Other(String),
}

impl Inbound {
    /// Decode a text frame.
    pub fn parse(text: &str) -> WsResult<Self> {
        let msg: ExchangeMessage = serde_json::from_str(text)?;
        Self::from_message(msg)
    }

    pub fn from_message(msg: ExchangeMessage) -> WsResult<Self> {
        match msg.op.as_str() {
            "orders" => parse_orders(&msg.args),
            "userordermatch" => parse_order_match(&msg.args).map(Inbound::UserOrderMatch),
            "marketinfo" => parse_market_info(&msg.args).map(Inbound::MarketInfo),
            "error" => Ok(Inbound::Error {
                op: msg.args.first().and_then(Value::as_str).map(str::to_string),
                account_id: msg.args.get(1).and_then(as_u64),
            }),
            _ => Ok(Inbound::Other(msg.op)),
        }
    }
}

fn parse_orders(args: &[Value]) -> WsResult<Inbound> {
    let rows = args
        .first()
        .and_then(Value::as_array)
        .ok_or_else(|| WsError::ParseError("orders: args[0] is not an array".to_string()))?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        match parse_order(row) {
            Ok(order) => orders.push(order),
            Err(e) => warn!(error = %e, "skipping malformed order"),
        }
    }
    Ok(Inbound::Orders(orders))
}

/// Decode `[chain, orderId, market, side, price, baseQty, quoteQty, expires, ...]`.
pub fn parse_order(row: &Value) -> WsResult<ExchangeOrder> {
    let fields = row
        .as_array()
        .filter(|f| f.len() >= 8)
        .ok_or_else(|| WsError::ParseError(format!("order tuple too short: {row}")))?;

    let side_text = fields[3]
        .as_str()
        .ok_or_else(|| WsError::ParseError("order side is not a string".to_string()))?;
    let side = Side::from_wire(side_text).map_err(|e| WsError::ParseError(e.to_string()))?;

    Ok(ExchangeOrder {
        chain_id: required_u64(&fields[0], "chainId")?,
        order_id: required_u64(&fields[1], "orderId")?,
        market_id: fields[2]
            .as_str()
            .ok_or_else(|| WsError::ParseError("order market is not a string".to_string()))?
            .to_string(),
        side,
        price: required_decimal(&fields[4], "price")?,
        base_quantity: required_decimal(&fields[5], "baseQuantity")?,
        quote_quantity: required_decimal(&fields[6], "quoteQuantity")?,
        expires: required_u64(&fields[7], "expires")?,
    })
}

fn parse_order_match(args: &[Value]) -> WsResult<OrderMatch> {
    let field = |i: usize| {
        args.get(i)
            .ok_or_else(|| WsError::ParseError(format!("userordermatch: missing args[{i}]")))
    };
    Ok(OrderMatch {
        chain_id: required_u64(field(0)?, "chainId")?,
        order_id: required_u64(field(1)?, "orderId")?,
        counter: parse_matched_order(field(2)?)?,
        own: parse_matched_order(field(3)?)?,
    })
}

fn parse_matched_order(value: &Value) -> WsResult<MatchedOrder> {
    let account_id = value
        .get("accountId")
        .and_then(as_u64)
        .ok_or_else(|| WsError::ParseError("matched order without accountId".to_string()))?;
    let nonce = value
        .get("nonce")
        .and_then(as_u64)
        .ok_or_else(|| WsError::ParseError("matched order without nonce".to_string()))?;
    Ok(MatchedOrder {
        account_id,
        nonce,
        raw: value.clone(),
    })
}

fn parse_market_info(args: &[Value]) -> WsResult<Market> {
    let info = args
        .first()
        .ok_or_else(|| WsError::ParseError("marketinfo: missing args[0]".to_string()))?;
    let alias = info
        .get("alias")
        .and_then(Value::as_str)
        .ok_or_else(|| WsError::ParseError("marketinfo without alias".to_string()))?;

    Ok(Market {
        id: alias.to_string(),
        base: parse_asset(info, "baseAsset", "baseAssetId")?,
        quote: parse_asset(info, "quoteAsset", "quoteAssetId")?,
        base_fee: info
            .get("baseFee")
            .and_then(decimal_from_value)
            .unwrap_or(Decimal::ZERO),
        quote_fee: info
            .get("quoteFee")
            .and_then(decimal_from_value)
            .unwrap_or(Decimal::ZERO),
    })
}

fn parse_asset(info: &Value, key: &str, id_key: &str) -> WsResult<AssetInfo> {
    let asset = info
        .get(key)
        .ok_or_else(|| WsError::ParseError(format!("marketinfo without {key}")))?;
    let symbol = asset
        .get("symbol")
        .and_then(Value::as_str)
        .ok_or_else(|| WsError::ParseError(format!("{key} without symbol")))?;
    let decimals = asset
        .get("decimals")
        .and_then(as_u64)
        .ok_or_else(|| WsError::ParseError(format!("{key} without decimals")))?;
    let decimals = u32::try_from(decimals)
        .map_err(|_| WsError::ParseError(format!("{key} decimals out of range: {decimals}")))?;
    let id = info
        .get(id_key)
        .and_then(as_u64)
        .or_else(|| asset.get("id").and_then(as_u64))
        .unwrap_or(0);
    Ok(AssetInfo::new(symbol, decimals, id))
}

/// Accept integers, integral floats and numeric strings.
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f < u64::MAX as f64)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn required_u64(value: &Value, name: &str) -> WsResult<u64> {
    as_u64(value).ok_or_else(|| WsError::ParseError(format!("{name} is not an integer: {value}")))
}

fn required_decimal(value: &Value, name: &str) -> WsResult<Decimal> {
    decimal_from_value(value)
        .ok_or_else(|| WsError::ParseError(format!("{name} is not a number: {value}")))
}
