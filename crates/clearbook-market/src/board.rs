//! The market board: every market this deployment knows about, plus the
//! lifecycle transitions.
//!
//! Transitions are one-way: `Trading -> Locked -> Resolved`. Anything else
//! is rejected; a resolved market is immutable.

use std::collections::HashMap;

use chrono::Utc;
use clearbook_types::{Error, Market, MarketId, MarketStatus, Outcome, Result, UserId};
use parking_lot::RwLock;

/// Owns all market records. Every operation locks internally.
#[derive(Debug, Default)]
pub struct MarketBoard {
    markets: RwLock<HashMap<MarketId, Market>>,
}

impl MarketBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new market in TRADING.
    pub fn create(
        &self,
        question: impl Into<String>,
        description: Option<String>,
        resolves_at: chrono::DateTime<Utc>,
        creator_id: UserId,
    ) -> Market {
        let market = Market::open(question, description, resolves_at, creator_id);
        self.markets.write().insert(market.id, market.clone());
        market
    }

    /// Fetch one market.
    ///
    /// # Errors
    /// Returns `MarketNotFound` for unknown IDs.
    pub fn get(&self, id: MarketId) -> Result<Market> {
        self.markets
            .read()
            .get(&id)
            .cloned()
            .ok_or(Error::MarketNotFound(id))
    }

    /// All markets, unordered.
    #[must_use]
    pub fn list(&self) -> Vec<Market> {
        self.markets.read().values().cloned().collect()
    }

    /// TRADING -> LOCKED.
    ///
    /// # Errors
    /// - `MarketNotFound` for unknown IDs
    /// - `InvalidTransition` unless the market is TRADING
    pub fn lock(&self, id: MarketId) -> Result<Market> {
        let mut markets = self.markets.write();
        let market = markets.get_mut(&id).ok_or(Error::MarketNotFound(id))?;
        if market.status != MarketStatus::Trading {
            return Err(Error::InvalidTransition);
        }
        market.status = MarketStatus::Locked;
        Ok(market.clone())
    }

    /// LOCKED -> RESOLVED, stamping the outcome and resolution time.
    ///
    /// # Errors
    /// - `MarketNotFound` for unknown IDs
    /// - `AlreadyResolved` if an outcome is already set
    /// - `MarketNotLocked` unless the market is LOCKED
    pub fn resolve(&self, id: MarketId, outcome: Outcome) -> Result<Market> {
        let mut markets = self.markets.write();
        let market = markets.get_mut(&id).ok_or(Error::MarketNotFound(id))?;
        if market.outcome.is_some() {
            return Err(Error::AlreadyResolved);
        }
        if market.status != MarketStatus::Locked {
            return Err(Error::MarketNotLocked);
        }
        market.status = MarketStatus::Resolved;
        market.outcome = Some(outcome);
        market.resolved_at = Some(Utc::now());
        Ok(market.clone())
    }

    /// IDs of TRADING markets whose `resolves_at` has passed.
    #[must_use]
    pub fn lock_due(&self) -> Vec<MarketId> {
        let now = Utc::now();
        self.markets
            .read()
            .values()
            .filter(|m| m.lock_due(now))
            .map(|m| m.id)
            .collect()
    }
}
