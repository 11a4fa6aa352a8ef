//! The order book for a single (market, outcome) pair.
//!
//! Uses `BTreeMap` for price-level ordering:
//! - **Bids** (buys): `BTreeMap<Reverse<u64>, PriceLevel>` -- highest price first
//! - **Asks** (sells): `BTreeMap<u64, PriceLevel>` -- lowest price first
//!
//! An auxiliary `HashMap<OrderId, (Side, price)>` enables O(log N)
//! cancellation. Cancellation is **lazy**: the entry is marked dead in its
//! level and dropped from the index; the matcher discards dead entries when
//! they surface at the top of book. Matching must therefore always skip
//! orders that are cancelled or have zero remaining.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use clearbook_types::{
    constants, Error, MarketId, Order, OrderId, OrderStatus, Outcome, Result, Side, Trade,
};
use serde::{Deserialize, Serialize};

use crate::level::PriceLevel;
use crate::trade_log::TradeLog;

/// Callback invoked for every trade, under the book lock. Implementations
/// must only enqueue; anything blocking stalls the matching path.
pub type TradeCallback = Box<dyn Fn(&Trade) + Send + Sync>;

/// Outcome of placing an order: the post-match state of the incoming order
/// and the trades it produced, in execution order.
#[derive(Debug, Clone)]
pub struct Placement {
    pub order: Order,
    pub trades: Vec<Trade>,
}

/// One aggregated price level of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub price: u64,
    pub quantity: u64,
    pub count: usize,
}

/// Aggregated view of the live book: bids descending, asks ascending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub bids: Vec<LevelSnapshot>,
    pub asks: Vec<LevelSnapshot>,
}

/// Price-time-priority matching engine for one outcome book.
pub struct OrderBook {
    market_id: MarketId,
    outcome: Outcome,
    /// Buy side: highest price first (`Reverse` key).
    bids: BTreeMap<Reverse<u64>, PriceLevel>,
    /// Sell side: lowest price first.
    asks: BTreeMap<u64, PriceLevel>,
    /// Fast lookup: `OrderId -> (side, price)`. Live orders only; an entry
    /// is dropped when its order fills, cancels, or is swept.
    index: HashMap<OrderId, (Side, u64)>,
    log: TradeLog,
    /// Fills stamped so far; feeds deterministic trade ids.
    fill_seq: u64,
    on_trade: Option<TradeCallback>,
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("market_id", &self.market_id)
            .field("outcome", &self.outcome)
            .field("orders", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl OrderBook {
    /// Create a new empty order book.
    #[must_use]
    pub fn new(market_id: MarketId, outcome: Outcome) -> Self {
        Self {
            market_id,
            outcome,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
            log: TradeLog::new(constants::TRADE_LOG_CAPACITY),
            fill_seq: 0,
            on_trade: None,
        }
    }

    /// Register the per-trade callback. Invoked under the book lock.
    pub fn set_trade_callback(&mut self, callback: TradeCallback) {
        self.on_trade = Some(callback);
    }

    #[must_use]
    pub fn market_id(&self) -> MarketId {
        self.market_id
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    // =================================================================
    // Placement & matching
    // =================================================================

    /// Accept an order, match it against the opposing side until exhausted
    /// or out of price, then rest any remainder.
    ///
    /// # Errors
    /// - `InvalidPrice` if price > 10 000 bp
    /// - `InvalidQuantity` if quantity is zero
    /// - `DuplicateOrder` if the ID already rests in the book
    pub fn place(&mut self, mut order: Order) -> Result<Placement> {
        if !order.price_in_range() {
            return Err(Error::InvalidPrice { price: order.price });
        }
        if order.quantity == 0 {
            return Err(Error::InvalidQuantity);
        }
        if self.index.contains_key(&order.id) {
            return Err(Error::DuplicateOrder(order.id));
        }

        let trades = match order.side {
            Side::Buy => self.match_buy(&mut order),
            Side::Sell => self.match_sell(&mut order),
        };

        // Rest the remainder at its original price and sequence.
        if order.remaining() > 0 && order.status != OrderStatus::Cancelled {
            self.index.insert(order.id, (order.side, order.price));
            match order.side {
                Side::Buy => self
                    .bids
                    .entry(Reverse(order.price))
                    .or_insert_with(|| PriceLevel::new(order.price))
                    .push_back(order.clone()),
                Side::Sell => self
                    .asks
                    .entry(order.price)
                    .or_insert_with(|| PriceLevel::new(order.price))
                    .push_back(order.clone()),
            }
        }

        for trade in &trades {
            self.log.push(trade.clone());
            if let Some(callback) = &self.on_trade {
                callback(trade);
            }
        }

        Ok(Placement { order, trades })
    }

    /// Match an incoming buy against the ask side, best (lowest) price
    /// first, FIFO within a level. Executes at the resting ask's price.
    fn match_buy(&mut self, buy: &mut Order) -> Vec<Trade> {
        let mut trades = Vec::new();

        while buy.remaining() > 0 {
            let Some(mut entry) = self.asks.first_entry() else {
                break;
            };
            let level = entry.get_mut();

            let Some(front) = level.front() else {
                entry.remove();
                continue;
            };
            // Lazy deletion: discard dead entries as they surface.
            if !front.is_live() {
                level.pop_front();
                continue;
            }

            // Price check: buy must reach the best ask.
            if buy.price < level.price {
                break;
            }

            let resting = level.front_mut().expect("front checked above");
            let qty = buy.remaining().min(resting.remaining());
            let price = resting.price;

            buy.fill(qty);
            resting.fill(qty);
            trades.push(Trade::between(buy, resting, price, qty, self.fill_seq));
            self.fill_seq += 1;

            if resting.remaining() == 0 {
                let filled = level.pop_front().expect("front checked above");
                self.index.remove(&filled.id);
            }
            if level.is_empty() {
                entry.remove();
            }
        }

        trades
    }

    /// Match an incoming sell against the bid side, best (highest) price
    /// first. Symmetric to [`Self::match_buy`]; executes at the bid's price.
    fn match_sell(&mut self, sell: &mut Order) -> Vec<Trade> {
        let mut trades = Vec::new();

        while sell.remaining() > 0 {
            let Some(mut entry) = self.bids.first_entry() else {
                break;
            };
            let level = entry.get_mut();

            let Some(front) = level.front() else {
                entry.remove();
                continue;
            };
            if !front.is_live() {
                level.pop_front();
                continue;
            }

            if sell.price > level.price {
                break;
            }

            let resting = level.front_mut().expect("front checked above");
            let qty = sell.remaining().min(resting.remaining());
            let price = resting.price;

            sell.fill(qty);
            resting.fill(qty);
            trades.push(Trade::between(resting, sell, price, qty, self.fill_seq));
            self.fill_seq += 1;

            if resting.remaining() == 0 {
                let filled = level.pop_front().expect("front checked above");
                self.index.remove(&filled.id);
            }
            if level.is_empty() {
                entry.remove();
            }
        }

        trades
    }

    // =================================================================
    // Cancellation
    // =================================================================

    /// Cancel a resting order. The entry is marked dead in place and only
    /// physically removed when the matcher reaches it.
    ///
    /// # Errors
    /// Returns `OrderNotFound` if the ID is not live in this book.
    pub fn cancel(&mut self, order_id: &OrderId) -> Result<()> {
        let (side, price) = self
            .index
            .remove(order_id)
            .ok_or(Error::OrderNotFound(*order_id))?;

        let marked = match side {
            Side::Buy => self
                .bids
                .get_mut(&Reverse(price))
                .is_some_and(|level| level.cancel_order(order_id)),
            Side::Sell => self
                .asks
                .get_mut(&price)
                .is_some_and(|level| level.cancel_order(order_id)),
        };

        if !marked {
            // Index said live but the level disagrees: the book is corrupt.
            return Err(Error::Internal(format!(
                "order {order_id} indexed at {side} {price}bp but missing from level"
            )));
        }
        Ok(())
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Look up a live order by ID.
    #[must_use]
    pub fn order(&self, order_id: &OrderId) -> Option<Order> {
        let (side, price) = self.index.get(order_id)?;
        let level = match side {
            Side::Buy => self.bids.get(&Reverse(*price))?,
            Side::Sell => self.asks.get(price)?,
        };
        level.orders.iter().find(|o| o.id == *order_id).cloned()
    }

    /// Best (highest) live bid price.
    #[must_use]
    pub fn best_bid(&self) -> Option<u64> {
        self.bids
            .values()
            .find(|level| !level.is_exhausted())
            .map(|level| level.price)
    }

    /// Best (lowest) live ask price.
    #[must_use]
    pub fn best_ask(&self) -> Option<u64> {
        self.asks
            .values()
            .find(|level| !level.is_exhausted())
            .map(|level| level.price)
    }

    /// Spread = best_ask - best_bid. `None` if either side is empty.
    #[must_use]
    pub fn spread(&self) -> Option<u64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.saturating_sub(bid)),
            _ => None,
        }
    }

    /// Number of live orders in the book.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Aggregate the live book into per-price levels: bids descending,
    /// asks ascending. Dead entries never appear.
    #[must_use]
    pub fn snapshot(&self) -> BookSnapshot {
        let aggregate = |level: &PriceLevel| {
            let quantity = level.live_quantity();
            let count = level.live_count();
            (count > 0).then_some(LevelSnapshot {
                price: level.price,
                quantity,
                count,
            })
        };

        BookSnapshot {
            bids: self.bids.values().filter_map(aggregate).collect(),
            asks: self.asks.values().filter_map(aggregate).collect(),
        }
    }

    /// The last `n` trades on this book, most recent first.
    #[must_use]
    pub fn recent_trades(&self, n: usize) -> Vec<Trade> {
        self.log.recent(n)
    }
}

#[cfg(test)]
mod tests {
    use clearbook_types::UserId;

    use super::*;

    fn book() -> OrderBook {
        OrderBook::new(MarketId::new(), Outcome::Yes)
    }

    fn order(book: &OrderBook, user: &str, side: Side, price: u64, qty: u64) -> Order {
        Order::new(
            UserId::from(user),
            book.market_id(),
            book.outcome(),
            side,
            price,
            qty,
        )
    }

    #[test]
    fn rejects_price_above_scale() {
        let mut book = book();
        let bad = order(&book, "a", Side::Buy, 10_001, 1);
        assert!(matches!(
            book.place(bad),
            Err(Error::InvalidPrice { price: 10_001 })
        ));
    }

    #[test]
    fn rejects_zero_quantity() {
        let mut book = book();
        let bad = order(&book, "a", Side::Buy, 5000, 0);
        assert!(matches!(book.place(bad), Err(Error::InvalidQuantity)));
    }

    #[test]
    fn no_cross_rests_both_sides() {
        let mut book = book();
        let bid = order(&book, "a", Side::Buy, 4000, 10);
        let ask = order(&book, "b", Side::Sell, 6000, 10);

        assert!(book.place(bid).unwrap().trades.is_empty());
        assert!(book.place(ask).unwrap().trades.is_empty());

        let snap = book.snapshot();
        assert_eq!(snap.bids, vec![LevelSnapshot { price: 4000, quantity: 10, count: 1 }]);
        assert_eq!(snap.asks, vec![LevelSnapshot { price: 6000, quantity: 10, count: 1 }]);
        assert_eq!(book.spread(), Some(2000));
    }

    #[test]
    fn full_cross_executes_at_resting_price() {
        let mut book = book();
        let ask = order(&book, "alice", Side::Sell, 6000, 100);
        book.place(ask).unwrap();

        let buy = order(&book, "bob", Side::Buy, 7000, 100);
        let placement = book.place(buy).unwrap();

        assert_eq!(placement.trades.len(), 1);
        let trade = &placement.trades[0];
        assert_eq!(trade.price, 6000, "price improvement for the taker");
        assert_eq!(trade.quantity, 100);
        assert_eq!(trade.buyer_id, UserId::from("bob"));
        assert_eq!(trade.seller_id, UserId::from("alice"));
        assert_eq!(placement.order.status, OrderStatus::Filled);
        assert!(book.is_empty());
    }

    #[test]
    fn partial_fill_rests_remainder_fifo() {
        let mut book = book();
        let first = order(&book, "m1", Side::Sell, 5000, 40);
        let second = order(&book, "m2", Side::Sell, 5000, 40);
        let first_id = first.id;
        let second_id = second.id;
        book.place(first).unwrap();
        book.place(second).unwrap();

        let buy = order(&book, "taker", Side::Buy, 5000, 100);
        let placement = book.place(buy).unwrap();

        assert_eq!(placement.trades.len(), 2);
        assert_eq!(placement.trades[0].sell_order_id, first_id, "FIFO");
        assert_eq!(placement.trades[1].sell_order_id, second_id);
        assert_eq!(placement.order.status, OrderStatus::Partial);
        assert_eq!(placement.order.remaining(), 20);

        let snap = book.snapshot();
        assert_eq!(snap.bids, vec![LevelSnapshot { price: 5000, quantity: 20, count: 1 }]);
        assert!(snap.asks.is_empty());
    }

    #[test]
    fn matches_best_price_across_levels() {
        let mut book = book();
        book.place(order(&book, "m1", Side::Sell, 5200, 10)).unwrap();
        book.place(order(&book, "m2", Side::Sell, 5000, 10)).unwrap();
        book.place(order(&book, "m3", Side::Sell, 5100, 10)).unwrap();

        let placement = book
            .place(order(&book, "taker", Side::Buy, 5100, 25))
            .unwrap();

        assert_eq!(placement.trades.len(), 2, "5200 is out of reach");
        assert_eq!(placement.trades[0].price, 5000);
        assert_eq!(placement.trades[1].price, 5100);
        assert_eq!(placement.order.remaining(), 5);
    }

    #[test]
    fn sell_matches_highest_bid_first() {
        let mut book = book();
        book.place(order(&book, "b1", Side::Buy, 4000, 5)).unwrap();
        book.place(order(&book, "b2", Side::Buy, 4500, 5)).unwrap();

        let placement = book
            .place(order(&book, "taker", Side::Sell, 4000, 8))
            .unwrap();

        assert_eq!(placement.trades.len(), 2);
        assert_eq!(placement.trades[0].price, 4500);
        assert_eq!(placement.trades[1].price, 4000);
        assert_eq!(placement.trades[1].quantity, 3);
    }

    #[test]
    fn cancelled_order_never_matches() {
        let mut book = book();
        let ask = order(&book, "alice", Side::Sell, 5000, 10);
        let ask_id = ask.id;
        book.place(ask).unwrap();
        book.cancel(&ask_id).unwrap();

        let placement = book
            .place(order(&book, "bob", Side::Buy, 5000, 10))
            .unwrap();
        assert!(placement.trades.is_empty(), "cancelled order must be skipped");

        let snap = book.snapshot();
        assert!(snap.asks.is_empty());
        assert_eq!(snap.bids.len(), 1, "the buy rests instead");
    }

    #[test]
    fn cancelled_order_in_front_is_skipped_not_matched() {
        let mut book = book();
        let dead = order(&book, "m1", Side::Sell, 5000, 10);
        let dead_id = dead.id;
        book.place(dead).unwrap();
        let live = order(&book, "m2", Side::Sell, 5000, 10);
        book.place(live).unwrap();
        book.cancel(&dead_id).unwrap();

        let placement = book
            .place(order(&book, "taker", Side::Buy, 5000, 10))
            .unwrap();
        assert_eq!(placement.trades.len(), 1);
        assert_eq!(placement.trades[0].seller_id, UserId::from("m2"));
    }

    #[test]
    fn cancel_unknown_order_fails() {
        let mut book = book();
        assert!(matches!(
            book.cancel(&OrderId::new()),
            Err(Error::OrderNotFound(_))
        ));
    }

    #[test]
    fn cancel_twice_fails() {
        let mut book = book();
        let ask = order(&book, "a", Side::Sell, 5000, 1);
        let id = ask.id;
        book.place(ask).unwrap();
        book.cancel(&id).unwrap();
        assert!(matches!(book.cancel(&id), Err(Error::OrderNotFound(_))));
    }

    #[test]
    fn zero_price_buy_only_matches_free_asks() {
        let mut book = book();
        book.place(order(&book, "m", Side::Sell, 1, 5)).unwrap();
        let placement = book.place(order(&book, "t", Side::Buy, 0, 5)).unwrap();
        assert!(placement.trades.is_empty());

        book.place(order(&book, "m2", Side::Sell, 0, 5)).unwrap();
        let placement = book.place(order(&book, "t2", Side::Buy, 0, 5)).unwrap();
        assert_eq!(placement.trades.len(), 1);
        assert_eq!(placement.trades[0].price, 0);
    }

    #[test]
    fn extreme_price_acts_as_market_order() {
        let mut book = book();
        book.place(order(&book, "m1", Side::Sell, 3000, 5)).unwrap();
        book.place(order(&book, "m2", Side::Sell, 9000, 5)).unwrap();

        let placement = book
            .place(order(&book, "t", Side::Buy, 10_000, 10))
            .unwrap();
        assert_eq!(placement.trades.len(), 2, "sweeps the whole ask side");
        assert_eq!(placement.trades[0].price, 3000);
        assert_eq!(placement.trades[1].price, 9000);
    }

    #[test]
    fn order_lookup() {
        let mut book = book();
        let ask = order(&book, "a", Side::Sell, 5000, 10);
        let id = ask.id;
        book.place(ask).unwrap();

        let found = book.order(&id).unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.remaining(), 10);
        assert!(book.order(&OrderId::new()).is_none());
    }

    #[test]
    fn snapshot_aggregates_same_price_orders() {
        let mut book = book();
        book.place(order(&book, "a", Side::Buy, 4000, 10)).unwrap();
        book.place(order(&book, "b", Side::Buy, 4000, 15)).unwrap();
        book.place(order(&book, "c", Side::Buy, 3900, 5)).unwrap();

        let snap = book.snapshot();
        assert_eq!(
            snap.bids,
            vec![
                LevelSnapshot { price: 4000, quantity: 25, count: 2 },
                LevelSnapshot { price: 3900, quantity: 5, count: 1 },
            ],
            "bids descend by price"
        );
    }

    #[test]
    fn duplicate_resting_order_rejected() {
        let mut book = book();
        let ask = order(&book, "a", Side::Sell, 5000, 10);
        let dup = ask.clone();
        book.place(ask).unwrap();
        assert!(matches!(book.place(dup), Err(Error::DuplicateOrder(_))));
    }

    #[test]
    fn trade_callback_fires_under_place() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let mut book = book();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        book.set_trade_callback(Box::new(move |_trade| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        book.place(order(&book, "a", Side::Sell, 5000, 10)).unwrap();
        book.place(order(&book, "b", Side::Buy, 5000, 10)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn trade_ids_are_deterministic_across_replays() {
        let market = MarketId::new();
        let run = |book: &mut OrderBook| {
            book.place(order(book, "m1", Side::Sell, 5000, 40)).unwrap();
            book.place(order(book, "m2", Side::Sell, 5000, 40)).unwrap();
            book.place(order(book, "taker", Side::Buy, 5000, 100))
                .unwrap()
                .trades
        };

        let first = run(&mut OrderBook::new(market, Outcome::Yes));
        let replay = run(&mut OrderBook::new(market, Outcome::Yes));
        assert_eq!(first.len(), 2);
        for (a, b) in first.iter().zip(replay.iter()) {
            assert_eq!(a.id, b.id, "same stream, same fills, same ids");
        }

        // The complementary book counts its own fills.
        let other_side = run(&mut OrderBook::new(market, Outcome::No));
        assert_ne!(first[0].id, other_side[0].id);
    }

    #[test]
    fn trades_land_in_the_log() {
        let mut book = book();
        book.place(order(&book, "a", Side::Sell, 5000, 10)).unwrap();
        book.place(order(&book, "b", Side::Buy, 5000, 4)).unwrap();
        book.place(order(&book, "c", Side::Buy, 5000, 6)).unwrap();

        let recent = book.recent_trades(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].quantity, 6, "most recent first");
        assert_eq!(recent[1].quantity, 4);
    }
}
