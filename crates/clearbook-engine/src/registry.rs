//! Lazy per-market book registry.
//!
//! Each market carries two independent books, one per outcome. Books are
//! created on first touch and never destroyed. Every book sits behind its
//! own mutex; the registry map has a separate lock, so looking up one book
//! never serializes matching on another.

use std::collections::HashMap;
use std::sync::Arc;

use clearbook_types::{MarketId, Outcome, Trade};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::book::OrderBook;

/// A market's YES and NO books.
#[derive(Clone)]
pub struct OutcomeBooks {
    pub yes: Arc<Mutex<OrderBook>>,
    pub no: Arc<Mutex<OrderBook>>,
}

impl OutcomeBooks {
    fn new(market_id: MarketId) -> Self {
        Self {
            yes: Arc::new(Mutex::new(OrderBook::new(market_id, Outcome::Yes))),
            no: Arc::new(Mutex::new(OrderBook::new(market_id, Outcome::No))),
        }
    }

    /// Select one outcome's book.
    #[must_use]
    pub fn book(&self, outcome: Outcome) -> Arc<Mutex<OrderBook>> {
        match outcome {
            Outcome::Yes => Arc::clone(&self.yes),
            Outcome::No => Arc::clone(&self.no),
        }
    }
}

/// Shared factory for trade callbacks, applied to every new book pair.
type CallbackFactory = Box<dyn Fn() -> crate::book::TradeCallback + Send + Sync>;

/// Registry of all books, keyed by market.
#[derive(Default)]
pub struct BookRegistry {
    books: RwLock<HashMap<MarketId, OutcomeBooks>>,
    on_trade: RwLock<Option<CallbackFactory>>,
}

impl BookRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a trade-callback factory. Applied immediately to every
    /// existing book and to every book created afterwards.
    pub fn set_global_trade_callback<F>(&self, factory: F)
    where
        F: Fn() -> crate::book::TradeCallback + Send + Sync + 'static,
    {
        for books in self.books.read().values() {
            books.yes.lock().set_trade_callback(factory());
            books.no.lock().set_trade_callback(factory());
        }
        *self.on_trade.write() = Some(Box::new(factory));
    }

    /// The book pair for a market, created atomically on first touch.
    /// Two concurrent lookups for the same market observe the same books.
    pub fn get_or_create(&self, market_id: MarketId) -> OutcomeBooks {
        if let Some(books) = self.books.read().get(&market_id) {
            return books.clone();
        }

        let mut map = self.books.write();
        // Re-check under the write lock; someone may have won the race.
        map.entry(market_id)
            .or_insert_with(|| {
                debug!(%market_id, "creating outcome books");
                let books = OutcomeBooks::new(market_id);
                if let Some(factory) = self.on_trade.read().as_ref() {
                    books.yes.lock().set_trade_callback(factory());
                    books.no.lock().set_trade_callback(factory());
                }
                books
            })
            .clone()
    }

    /// The book pair for a market, if one exists.
    #[must_use]
    pub fn get(&self, market_id: MarketId) -> Option<OutcomeBooks> {
        self.books.read().get(&market_id).cloned()
    }

    /// One outcome's book for a market, creating the pair if needed.
    pub fn book(&self, market_id: MarketId, outcome: Outcome) -> Arc<Mutex<OrderBook>> {
        self.get_or_create(market_id).book(outcome)
    }

    /// Number of markets with live book pairs.
    #[must_use]
    pub fn market_count(&self) -> usize {
        self.books.read().len()
    }
}

/// Convenience: a callback factory that clones a sender-like closure.
pub fn fanout_factory<F>(f: F) -> impl Fn() -> crate::book::TradeCallback + Send + Sync
where
    F: Fn(&Trade) + Send + Sync + Clone + 'static,
{
    move || {
        let f = f.clone();
        Box::new(move |trade: &Trade| f(trade))
    }
}
