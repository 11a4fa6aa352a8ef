//! # clearbook-engine
//!
//! The matching core of Clearbook: price-time-priority order books for
//! binary outcome markets, plus the position ledger that the orchestration
//! layer settles trades against.
//!
//! - [`OrderBook`]: BTreeMap-based book with FIFO price levels and lazy
//!   cancellation
//! - [`TradeLog`]: bounded ring of recent trades per book
//! - [`BookRegistry`]: lazy creation and lookup of YES/NO book pairs per
//!   market
//! - [`Ledger`]: atomic balance and share bookkeeping, order admission,
//!   minting/redemption, resolution payout
//!
//! Everything here is synchronous; each component guards its state with its
//! own lock and never calls across components while holding it.

pub mod book;
pub mod ledger;
pub mod level;
pub mod registry;
pub mod trade_log;

pub use book::{BookSnapshot, LevelSnapshot, OrderBook, Placement, TradeCallback};
pub use ledger::Ledger;
pub use level::PriceLevel;
pub use registry::{fanout_factory, BookRegistry, OutcomeBooks};
pub use trade_log::TradeLog;
