//! Order model for the Clearbook matching engine.
//!
//! Prices are integer basis points in `0..=10_000` (10 000 bp = 1 quote
//! unit), so a price doubles as the market-implied probability of the
//! outcome. Market orders do not exist as a separate type; the edge
//! expresses them as limit orders at the extreme price (0 or 10 000).

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{constants, MarketId, OrderId, Outcome, Side, UserId};

/// Process-wide order sequence. Strictly increasing across *all* books so
/// FIFO tie-breaks stay fair even when an order stream is replayed across
/// books.
static ORDER_SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_sequence() -> u64 {
    ORDER_SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Partial,
    Filled,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Partial => write!(f, "partial"),
            Self::Filled => write!(f, "filled"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A single limit instruction resting in (or crossing) one outcome book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub market_id: MarketId,
    pub outcome: Outcome,
    pub side: Side,
    /// Basis points, `0..=10_000`.
    pub price: u64,
    /// Total quantity in shares. Always positive.
    pub quantity: u64,
    /// Already-filled quantity. `filled <= quantity`.
    pub filled: u64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    /// FIFO tie-breaker at equal price, allocated process-wide.
    pub sequence: u64,
}

impl Order {
    /// Build a new OPEN order, stamping the creation time and claiming the
    /// next process-wide sequence number.
    #[must_use]
    pub fn new(
        user_id: UserId,
        market_id: MarketId,
        outcome: Outcome,
        side: Side,
        price: u64,
        quantity: u64,
    ) -> Self {
        Self {
            id: OrderId::new(),
            user_id,
            market_id,
            outcome,
            side,
            price,
            quantity,
            filled: 0,
            status: OrderStatus::Open,
            created_at: Utc::now(),
            sequence: next_sequence(),
        }
    }

    /// Unfilled quantity.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.quantity - self.filled
    }

    /// Record a fill and advance the status.
    pub fn fill(&mut self, qty: u64) {
        self.filled = (self.filled + qty).min(self.quantity);
        if self.filled == self.quantity {
            self.status = OrderStatus::Filled;
        } else if self.filled > 0 {
            self.status = OrderStatus::Partial;
        }
    }

    /// Mark the order cancelled. Terminal.
    pub fn cancel(&mut self) {
        self.status = OrderStatus::Cancelled;
    }

    #[must_use]
    pub fn is_buy(&self) -> bool {
        self.side == Side::Buy
    }

    /// A dead order never matches: cancelled, or nothing left to fill.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status != OrderStatus::Cancelled && self.remaining() > 0
    }

    /// Quote cost of the full order in basis points (`price * quantity`).
    #[must_use]
    pub fn notional(&self) -> u64 {
        self.price * self.quantity
    }

    /// Whether the price is inside the valid probability range.
    #[must_use]
    pub fn price_in_range(&self) -> bool {
        self.price <= constants::PRICE_SCALE
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn limit(side: Side, price: u64, quantity: u64) -> Self {
        Self::new(
            UserId::from("trader"),
            MarketId::new(),
            Outcome::Yes,
            side,
            price,
            quantity,
        )
    }

    pub fn limit_for(user: &str, side: Side, price: u64, quantity: u64) -> Self {
        Self::new(
            UserId::from(user),
            MarketId::new(),
            Outcome::Yes,
            side,
            price,
            quantity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_strictly_increasing() {
        let a = Order::limit(Side::Buy, 5000, 10);
        let b = Order::limit(Side::Buy, 5000, 10);
        let c = Order::limit(Side::Sell, 4000, 1);
        assert!(a.sequence < b.sequence);
        assert!(b.sequence < c.sequence);
    }

    #[test]
    fn fill_advances_status() {
        let mut order = Order::limit(Side::Buy, 5000, 10);
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.remaining(), 10);

        order.fill(4);
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.remaining(), 6);

        order.fill(6);
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.remaining(), 0);
    }

    #[test]
    fn cancel_is_terminal() {
        let mut order = Order::limit(Side::Sell, 7000, 5);
        order.cancel();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(!order.is_live());
    }

    #[test]
    fn filled_order_is_not_live() {
        let mut order = Order::limit(Side::Buy, 100, 2);
        order.fill(2);
        assert!(!order.is_live());
    }

    #[test]
    fn notional_is_price_times_quantity() {
        let order = Order::limit(Side::Buy, 6000, 100);
        assert_eq!(order.notional(), 600_000);
    }

    #[test]
    fn price_range_check() {
        assert!(Order::limit(Side::Buy, 10_000, 1).price_in_range());
        assert!(Order::limit(Side::Buy, 0, 1).price_in_range());
        assert!(!Order::limit(Side::Buy, 10_001, 1).price_in_range());
    }

    #[test]
    fn status_wire_form() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Partial).unwrap(),
            "\"partial\""
        );
    }
}
