//! Trade model: the immutable record of one fill between two orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MarketId, Order, OrderId, Outcome, TradeId, UserId};

/// A completed match between a buy and a sell order on one outcome book.
///
/// The execution price is always the resting order's price (price
/// improvement goes to the taker), so `price` can differ from either
/// order's limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub market_id: MarketId,
    pub outcome: Outcome,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    /// Execution price in basis points. Positive.
    pub price: u64,
    /// Executed quantity in shares. Positive.
    pub quantity: u64,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    /// Record a fill between a buy and a sell order. `fill_seq` is the
    /// book's fill counter, which makes the trade id deterministic: the
    /// same order stream replayed against a fresh book yields the same ids.
    #[must_use]
    pub fn between(buy: &Order, sell: &Order, price: u64, quantity: u64, fill_seq: u64) -> Self {
        Self {
            id: TradeId::deterministic(buy.market_id, buy.outcome, fill_seq),
            market_id: buy.market_id,
            outcome: buy.outcome,
            buy_order_id: buy.id,
            sell_order_id: sell.id,
            buyer_id: buy.user_id.clone(),
            seller_id: sell.user_id.clone(),
            price,
            quantity,
            executed_at: Utc::now(),
        }
    }

    /// Quote amount moved by this trade, in basis points.
    #[must_use]
    pub fn cost(&self) -> u64 {
        self.price * self.quantity
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade[{}] {} {} {} x {} @ {}bp",
            self.id, self.market_id, self.outcome, self.buyer_id, self.quantity, self.price,
        )
    }
}
