//! Type definitions for Paradex REST API payloads.

use crate::exchange::types::{InstrumentMetadata, MarketSnapshot, OrderSide, PositionSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Paginated `{"results": [...]}` wrapper used by most list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsPage<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Response of `POST /auth`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub jwt_token: String,
}

/// Single token balance.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceEntry {
    pub token: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub size: Decimal,
}

/// Position as reported by `GET /positions`.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionEntry {
    pub market: String,
    pub side: PositionSide,
    #[serde(with = "rust_decimal::serde::str")]
    pub size: Decimal,
    #[serde(default)]
    pub status: String,
}

impl PositionEntry {
    /// Open and non-empty.
    pub fn is_open(&self) -> bool {
        self.status != "CLOSED" && self.size > Decimal::ZERO
    }
}

/// Market definition from `GET /markets`.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketEntry {
    pub symbol: String,
    #[serde(default = "default_tick_size", with = "rust_decimal::serde::str")]
    pub price_tick_size: Decimal,
    #[serde(default = "default_size_increment", with = "rust_decimal::serde::str")]
    pub order_size_increment: Decimal,
    #[serde(default = "default_min_notional", with = "rust_decimal::serde::str")]
    pub min_notional: Decimal,
}

fn default_tick_size() -> Decimal {
    Decimal::new(1, 1) // 0.1
}

fn default_size_increment() -> Decimal {
    Decimal::new(1, 4) // 0.0001
}

fn default_min_notional() -> Decimal {
    Decimal::new(10, 0) // $10
}

impl From<&MarketEntry> for InstrumentMetadata {
    fn from(entry: &MarketEntry) -> Self {
        Self {
            tick_size: entry.price_tick_size,
            size_increment: entry.order_size_increment,
            min_notional: entry.min_notional,
        }
    }
}

/// Order book response of `GET /orderbook/{market}`.
///
/// Levels are `[price, size]` string pairs.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookResponse {
    #[serde(default)]
    pub bids: Vec<Vec<String>>,
    #[serde(default)]
    pub asks: Vec<Vec<String>>,
    #[serde(default)]
    pub best_bid_api: Option<Vec<String>>,
    #[serde(default)]
    pub best_ask_api: Option<Vec<String>>,
}

impl OrderBookResponse {
    /// Best bid/ask, preferring the dedicated BBO fields over the level arrays.
    ///
    /// An empty BBO field counts as absent.
    pub fn to_snapshot(&self) -> Option<MarketSnapshot> {
        let best_bid = self
            .best_bid_api
            .as_deref()
            .filter(|level| !level.is_empty())
            .or_else(|| self.bids.first().map(Vec::as_slice))?;
        let best_ask = self
            .best_ask_api
            .as_deref()
            .filter(|level| !level.is_empty())
            .or_else(|| self.asks.first().map(Vec::as_slice))?;

        let (bid, bid_size) = parse_level(best_bid)?;
        let (ask, ask_size) = parse_level(best_ask)?;
        Some(MarketSnapshot::new(bid, ask, bid_size, ask_size))
    }
}

fn parse_level(level: &[String]) -> Option<(Decimal, Decimal)> {
    let price = Decimal::from_str(level.first()?).ok()?;
    let size = Decimal::from_str(level.get(1)?).ok()?;
    Some((price, size))
}

/// Order type on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WireOrderType {
    Limit,
    Market,
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub market: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: WireOrderType,
    #[serde(with = "rust_decimal::serde::str")]
    pub size: Decimal,
    #[serde(skip_serializing_if = "Option::is_none", with = "rust_decimal::serde::str_option")]
    pub price: Option<Decimal>,
    pub instruction: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    pub signature: String,
    pub signature_timestamp: i64,
}

impl OrderRequest {
    /// Canonical string covered by the request signature.
    pub fn signing_payload(&self) -> String {
        format!(
            "{}|{}|{}|{:?}|{}|{}|{}",
            self.signature_timestamp,
            self.market,
            self.side,
            self.order_type,
            self.size,
            self.price.map(|p| p.to_string()).unwrap_or_default(),
            self.flags.join(",")
        )
    }
}

/// Order as returned by `POST /orders` and `GET /orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    #[serde(default)]
    pub client_id: String,
    pub market: String,
    pub side: OrderSide,
    #[serde(with = "rust_decimal::serde::str")]
    pub size: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub flags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_orderbook_prefers_bbo_fields() {
        let json = r#"{
            "bids": [["99.0", "1"]],
            "asks": [["101.0", "1"]],
            "best_bid_api": ["100.00", "10"],
            "best_ask_api": ["100.004", "12"]
        }"#;
        let book: OrderBookResponse = serde_json::from_str(json).unwrap();
        let snapshot = book.to_snapshot().unwrap();
        assert_eq!(snapshot.bid, dec!(100.00));
        assert_eq!(snapshot.ask, dec!(100.004));
        assert_eq!(snapshot.ask_size, dec!(12));
    }

    #[test]
    fn test_orderbook_falls_back_to_levels() {
        let json = r#"{"bids": [["99.5", "2"]], "asks": [["100.5", "3"]]}"#;
        let book: OrderBookResponse = serde_json::from_str(json).unwrap();
        let snapshot = book.to_snapshot().unwrap();
        assert_eq!(snapshot.bid, dec!(99.5));
        assert_eq!(snapshot.ask_size, dec!(3));
    }

    #[test]
    fn test_empty_bbo_fields_fall_back_to_levels() {
        let json = r#"{
            "bids": [["100.0", "10"]],
            "asks": [["100.004", "8"]],
            "best_bid_api": [],
            "best_ask_api": []
        }"#;
        let book: OrderBookResponse = serde_json::from_str(json).unwrap();
        let snapshot = book.to_snapshot().unwrap();
        assert_eq!(snapshot.bid, dec!(100.0));
        assert_eq!(snapshot.ask, dec!(100.004));
        assert_eq!(snapshot.bid_size, dec!(10));
    }

    #[test]
    fn test_empty_orderbook_has_no_snapshot() {
        let book: OrderBookResponse = serde_json::from_str(r#"{"bids": [], "asks": []}"#).unwrap();
        assert!(book.to_snapshot().is_none());
    }

    #[test]
    fn test_position_entry_open_filter() {
        let json = r#"{"market": "BTC-USD-PERP", "side": "SHORT", "size": "0.5", "status": "OPEN"}"#;
        let entry: PositionEntry = serde_json::from_str(json).unwrap();
        assert!(entry.is_open());
        assert_eq!(entry.side, PositionSide::Short);

        let closed = r#"{"market": "BTC-USD-PERP", "side": "LONG", "size": "0", "status": "CLOSED"}"#;
        let entry: PositionEntry = serde_json::from_str(closed).unwrap();
        assert!(!entry.is_open());
    }

    #[test]
    fn test_order_request_serialization() {
        let request = OrderRequest {
            market: "BTC-USD-PERP".to_string(),
            side: OrderSide::Sell,
            order_type: WireOrderType::Market,
            size: dec!(0.0179),
            price: None,
            instruction: "IOC".to_string(),
            client_id: "sniper_mkt_1".to_string(),
            flags: vec!["REDUCE_ONLY".to_string()],
            signature: "abc".to_string(),
            signature_timestamp: 1,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "MARKET");
        assert_eq!(json["side"], "SELL");
        assert_eq!(json["size"], "0.0179");
        assert!(json.get("price").is_none());
        assert_eq!(json["flags"][0], "REDUCE_ONLY");
    }
}
