//! Pure settlement adjudicator.
//!
//! Decides whether a candidate channel state is admissible against a proof
//! history. No I/O, no clock: given the same inputs this always returns the
//! same verdict, which is what lets the on-chain contract and every
//! off-chain participant agree on it.
//!
//! Rules:
//! 1. With proofs, the candidate must strictly advance the last proof's
//!    version and keep the allocation total unchanged.
//! 2. The candidate must carry exactly one signature per declared
//!    participant.
//! 3. With no proofs, any candidate satisfying (2) is admissible.

use serde::{Deserialize, Serialize};

use crate::protocol::WireAllocation;

/// The channel parameters the adjudicator judges against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub participants: Vec<String>,
}

/// A (possibly signed) channel state as submitted for adjudication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedState {
    pub version: u64,
    pub allocations: Vec<WireAllocation>,
    pub signatures: Vec<String>,
}

impl SignedState {
    /// Sum of the allocation amounts. Unparseable amounts count as zero;
    /// the clearinghouse never emits them, and a forged state that relies
    /// on one fails the total check anyway.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.allocations
            .iter()
            .filter_map(|a| a.amount.parse::<u64>().ok())
            .sum()
    }
}

/// Validate a candidate state against the channel config and proof history.
#[must_use]
pub fn adjudicate(config: &ChannelConfig, candidate: &SignedState, proofs: &[SignedState]) -> bool {
    if let Some(last) = proofs.last() {
        if candidate.version <= last.version {
            return false;
        }
        if candidate.total() != last.total() {
            return false;
        }
    }
    candidate.signatures.len() == config.participants.len()
}
