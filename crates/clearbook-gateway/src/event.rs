//! Typed events pushed to connected clients.
//!
//! Every push frame is `{"type": ..., "data": ...}`. The known types are
//! `connected`, `orderbook`, `trade`, `yellow_auth_success`, and `error`.

use clearbook_engine::BookSnapshot;
use clearbook_types::{MarketId, Trade};
use serde::Serialize;

/// One push-channel frame.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    /// Greeting sent right after registration.
    Connected { status: String },
    /// Bi-outcome book snapshot for one market.
    Orderbook(OrderbookEvent),
    /// One executed trade.
    Trade(Trade),
    /// Push-channel auth succeeded.
    YellowAuthSuccess {
        address: String,
        session_key: String,
        expires_at: i64,
    },
    /// Any per-connection failure the client should see.
    Error { error: String },
}

/// Both outcome books of one market, as pushed after every change.
#[derive(Debug, Clone, Serialize)]
pub struct OrderbookEvent {
    pub market_id: MarketId,
    #[serde(rename = "YES")]
    pub yes: BookSnapshot,
    #[serde(rename = "NO")]
    pub no: BookSnapshot,
}

impl Event {
    /// The standard greeting.
    #[must_use]
    pub fn connected() -> Self {
        Self::Connected {
            status: "connected".to_string(),
        }
    }

    /// An error frame with a human-readable reason.
    #[must_use]
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error {
            error: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clearbook_types::{Order, Side, Trade};

    use super::*;

    #[test]
    fn connected_wire_form() {
        let json = serde_json::to_string(&Event::connected()).unwrap();
        assert_eq!(json, r#"{"type":"connected","data":{"status":"connected"}}"#);
    }

    #[test]
    fn trade_event_is_tagged() {
        let buy = Order::limit(Side::Buy, 5000, 1);
        let sell = Order::limit(Side::Sell, 5000, 1);
        let event = Event::Trade(Trade::between(&buy, &sell, 5000, 1, 0));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.starts_with(r#"{"type":"trade","data":{"#));
    }

    #[test]
    fn orderbook_event_uses_outcome_keys() {
        let event = Event::Orderbook(OrderbookEvent {
            market_id: MarketId::new(),
            yes: BookSnapshot::default(),
            no: BookSnapshot::default(),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"orderbook""#));
        assert!(json.contains(r#""YES":{"#));
        assert!(json.contains(r#""NO":{"#));
    }

    #[test]
    fn auth_success_wire_form() {
        let event = Event::YellowAuthSuccess {
            address: "0xabc".into(),
            session_key: "sk".into(),
            expires_at: 1234,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"yellow_auth_success""#));
        assert!(json.contains(r#""expires_at":1234"#));
    }
}
