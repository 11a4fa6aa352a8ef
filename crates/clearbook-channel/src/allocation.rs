//! Per-channel fund allocations.
//!
//! An allocation maps participant addresses to amounts in the channel's
//! declared asset. The total is fixed when the channel opens: transfers
//! only move value between participants and bump the version, so
//! `sum(amounts)` is invariant for the channel's lifetime. Amounts are
//! integers internally and decimal strings on the wire.

use std::collections::HashMap;

use clearbook_types::{constants, ChannelId, Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::protocol::WireAllocation;

/// JSON-serializable snapshot of a channel's allocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationSnapshot {
    pub channel_id: ChannelId,
    pub asset: String,
    pub balances: HashMap<String, u64>,
    pub version: u64,
}

/// Versioned participant -> amount map for one channel.
pub struct Allocations {
    channel_id: ChannelId,
    asset: String,
    state: RwLock<AllocationState>,
    /// Fixed at creation; every mutation must preserve it.
    total: u64,
}

struct AllocationState {
    balances: HashMap<String, u64>,
    version: u64,
}

impl Allocations {
    /// Seed a channel's allocations at version 0. The initial sum defines
    /// the conserved total.
    #[must_use]
    pub fn new(channel_id: ChannelId, asset: impl Into<String>, initial: HashMap<String, u64>) -> Self {
        let total = initial.values().sum();
        Self {
            channel_id,
            asset: asset.into(),
            state: RwLock::new(AllocationState {
                balances: initial,
                version: 0,
            }),
            total,
        }
    }

    /// Amount currently allocated to one participant.
    #[must_use]
    pub fn balance(&self, participant: &str) -> u64 {
        self.state
            .read()
            .balances
            .get(participant)
            .copied()
            .unwrap_or(0)
    }

    /// Move `amount` from one participant to another and bump the version.
    ///
    /// # Errors
    /// Returns `InsufficientAllocation` if `from` cannot cover `amount`.
    pub fn transfer(&self, from: &str, to: &str, amount: u64) -> Result<u64> {
        let mut state = self.state.write();
        let available = state.balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(Error::InsufficientAllocation {
                needed: amount,
                available,
            });
        }
        *state.balances.entry(from.to_string()).or_insert(0) -= amount;
        *state.balances.entry(to.to_string()).or_insert(0) += amount;
        state.version += 1;
        Ok(state.version)
    }

    /// Apply a matched trade: the buyer pays the seller
    /// `price * quantity / 10_000` in the channel's asset.
    ///
    /// # Errors
    /// Same as [`Self::transfer`].
    pub fn apply_trade(&self, buyer: &str, seller: &str, price: u64, quantity: u64) -> Result<u64> {
        let cost = price * quantity / constants::PRICE_SCALE;
        self.transfer(buyer, seller, cost)
    }

    /// Current version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// The conserved total.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Export a snapshot for the channel protocol or diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> AllocationSnapshot {
        let state = self.state.read();
        AllocationSnapshot {
            channel_id: self.channel_id.clone(),
            asset: self.asset.clone(),
            balances: state.balances.clone(),
            version: state.version,
        }
    }

    /// Render the current balances in the clearinghouse wire format,
    /// sorted by participant for deterministic output.
    #[must_use]
    pub fn to_wire(&self) -> Vec<WireAllocation> {
        let state = self.state.read();
        let mut allocations: Vec<WireAllocation> = state
            .balances
            .iter()
            .map(|(participant, amount)| WireAllocation {
                participant: participant.clone(),
                asset: self.asset.clone(),
                amount: amount.to_string(),
            })
            .collect();
        allocations.sort_by(|a, b| a.participant.cmp(&b.participant));
        allocations
    }
}
