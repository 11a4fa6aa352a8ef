//! Position ledger: per-user quote balances and per-(user, market) share
//! holdings, with order admission checks.
//!
//! All operations take the single internal lock, mutate, and release before
//! returning, so each one is atomic. The accounting rules:
//!
//! - `mint` turns `n * 10_000` bp into `n` YES + `n` NO shares;
//!   `redeem` is the inverse.
//! - Admission for a BUY requires `balance >= price * quantity` (both in
//!   basis points). Admission for a SELL requires enough shares of the
//!   traded outcome. The same `price * quantity` figure is what `apply`
//!   later moves, so admission and application never disagree on units.
//! - `payout` converts winning shares at 10 000 bp apiece and zeroes the
//!   position, so a second call for the same pair credits nothing.
//!
//! For any unresolved market the mint/trade/redeem rules keep
//! `sum(yes) == sum(no)` across users.

use std::collections::HashMap;

use clearbook_types::{
    constants, Error, MarketId, Order, Outcome, Position, Result, Side, Trade, UserId,
};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct LedgerState {
    /// Quote balances in basis points.
    balances: HashMap<UserId, u64>,
    /// Share holdings per (user, market).
    positions: HashMap<(UserId, MarketId), Position>,
}

impl LedgerState {
    fn position_mut(&mut self, user_id: &UserId, market_id: MarketId) -> &mut Position {
        self.positions
            .entry((user_id.clone(), market_id))
            .or_insert_with(|| Position::empty(user_id.clone(), market_id))
    }
}

/// The authoritative in-memory ledger. Cheap to share: every operation
/// locks internally.
#[derive(Debug, Default)]
pub struct Ledger {
    state: Mutex<LedgerState>,
}

impl Ledger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =================================================================
    // Balances
    // =================================================================

    /// Credit a user's quote balance.
    ///
    /// # Errors
    /// Returns `InvalidAmount` if `amount` is zero.
    pub fn deposit(&self, user_id: &UserId, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(Error::InvalidAmount);
        }
        let mut state = self.state.lock();
        let balance = state.balances.entry(user_id.clone()).or_insert(0);
        *balance += amount;
        Ok(*balance)
    }

    /// A user's quote balance in basis points. Unknown users hold zero.
    #[must_use]
    pub fn balance_of(&self, user_id: &UserId) -> u64 {
        self.state
            .lock()
            .balances
            .get(user_id)
            .copied()
            .unwrap_or(0)
    }

    // =================================================================
    // Minting & redemption
    // =================================================================

    /// Mint `n` complementary YES/NO share pairs against a market at
    /// 10 000 bp per pair.
    ///
    /// # Errors
    /// - `InvalidAmount` if `n` is zero
    /// - `InsufficientBalance` if the user cannot cover `n * 10_000` bp
    pub fn mint(&self, user_id: &UserId, market_id: MarketId, n: u64) -> Result<Position> {
        if n == 0 {
            return Err(Error::InvalidAmount);
        }
        let cost = n * constants::PRICE_SCALE;

        let mut state = self.state.lock();
        let balance = state.balances.entry(user_id.clone()).or_insert(0);
        if *balance < cost {
            return Err(Error::InsufficientBalance {
                needed: cost,
                available: *balance,
            });
        }
        *balance -= cost;

        let position = state.position_mut(user_id, market_id);
        position.yes_shares += n;
        position.no_shares += n;
        Ok(position.clone())
    }

    /// Redeem `n` YES/NO pairs back into `n * 10_000` bp of quote balance.
    ///
    /// # Errors
    /// - `InvalidAmount` if `n` is zero
    /// - `InsufficientShares` unless the user holds at least `n` of each
    pub fn redeem(&self, user_id: &UserId, market_id: MarketId, n: u64) -> Result<Position> {
        if n == 0 {
            return Err(Error::InvalidAmount);
        }

        let mut state = self.state.lock();
        let position = state.position_mut(user_id, market_id);
        let pairs = position.yes_shares.min(position.no_shares);
        if pairs < n {
            return Err(Error::InsufficientShares {
                needed: n,
                available: pairs,
            });
        }
        position.yes_shares -= n;
        position.no_shares -= n;
        let snapshot = position.clone();

        let balance = state.balances.entry(user_id.clone()).or_insert(0);
        *balance += n * constants::PRICE_SCALE;
        Ok(snapshot)
    }

    // =================================================================
    // Order admission & trade application
    // =================================================================

    /// Pre-trade check for an incoming order.
    ///
    /// BUY: `balance >= price * quantity` (basis points).
    /// SELL: shares of the order's outcome `>= quantity`.
    ///
    /// # Errors
    /// `InsufficientBalance` / `InsufficientShares` accordingly.
    pub fn admit(&self, order: &Order) -> Result<()> {
        let state = self.state.lock();
        match order.side {
            Side::Buy => {
                let required = order.price * order.quantity;
                let available = state.balances.get(&order.user_id).copied().unwrap_or(0);
                if available < required {
                    return Err(Error::InsufficientBalance {
                        needed: required,
                        available,
                    });
                }
            }
            Side::Sell => {
                let available = state
                    .positions
                    .get(&(order.user_id.clone(), order.market_id))
                    .map_or(0, |p| p.shares(order.outcome));
                if available < order.quantity {
                    return Err(Error::InsufficientShares {
                        needed: order.quantity,
                        available,
                    });
                }
            }
        }
        Ok(())
    }

    /// Apply an executed trade: move `price * quantity` bp from buyer to
    /// seller and transfer the traded outcome's shares the other way.
    ///
    /// # Errors
    /// Returns `Internal` if the buyer's balance or the seller's shares
    /// cannot cover the trade; admission should have made that impossible.
    pub fn apply(&self, trade: &Trade) -> Result<()> {
        let cost = trade.cost();
        let mut state = self.state.lock();

        let buyer_balance = state.balances.entry(trade.buyer_id.clone()).or_insert(0);
        *buyer_balance = buyer_balance.checked_sub(cost).ok_or_else(|| {
            Error::Internal(format!(
                "trade {} overdraws buyer {} by {}bp",
                trade.id, trade.buyer_id, cost
            ))
        })?;

        let seller_position = state.position_mut(&trade.seller_id, trade.market_id);
        let seller_shares = match trade.outcome {
            Outcome::Yes => &mut seller_position.yes_shares,
            Outcome::No => &mut seller_position.no_shares,
        };
        *seller_shares = seller_shares.checked_sub(trade.quantity).ok_or_else(|| {
            Error::Internal(format!(
                "trade {} overdraws seller {} shares",
                trade.id, trade.seller_id
            ))
        })?;

        let buyer_position = state.position_mut(&trade.buyer_id, trade.market_id);
        match trade.outcome {
            Outcome::Yes => buyer_position.yes_shares += trade.quantity,
            Outcome::No => buyer_position.no_shares += trade.quantity,
        }

        let seller_balance = state.balances.entry(trade.seller_id.clone()).or_insert(0);
        *seller_balance += cost;
        Ok(())
    }

    // =================================================================
    // Resolution payout
    // =================================================================

    /// Pay out a resolved market for one user: credit winning shares at
    /// 10 000 bp each and zero both sides of the position. Losing shares
    /// become worthless. Returns the credited amount; calling again for the
    /// same pair credits 0.
    pub fn payout(&self, user_id: &UserId, market_id: MarketId, winning: Outcome) -> u64 {
        let mut state = self.state.lock();
        let position = state.position_mut(user_id, market_id);
        let amount = position.shares(winning) * constants::PRICE_SCALE;
        position.yes_shares = 0;
        position.no_shares = 0;

        if amount > 0 {
            let balance = state.balances.entry(user_id.clone()).or_insert(0);
            *balance += amount;
        }
        amount
    }

    // =================================================================
    // Queries
    // =================================================================

    /// A user's position in one market. Unknown pairs are flat.
    #[must_use]
    pub fn position(&self, user_id: &UserId, market_id: MarketId) -> Position {
        self.state
            .lock()
            .positions
            .get(&(user_id.clone(), market_id))
            .cloned()
            .unwrap_or_else(|| Position::empty(user_id.clone(), market_id))
    }

    /// Every non-flat position in a market.
    #[must_use]
    pub fn list_positions(&self, market_id: MarketId) -> Vec<Position> {
        self.state
            .lock()
            .positions
            .iter()
            .filter(|((_, m), position)| *m == market_id && !position.is_flat())
            .map(|(_, position)| position.clone())
            .collect()
    }
}
