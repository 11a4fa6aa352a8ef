//! Market records and the lifecycle status machine.
//!
//! Transitions are strictly `Trading -> Locked -> Resolved`; a resolved
//! market is immutable and its `outcome`/`resolved_at` are set exactly then.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MarketId, Outcome, UserId};

/// Lifecycle stage of a prediction market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    /// Accepting orders.
    Trading,
    /// No more orders, awaiting resolution.
    Locked,
    /// Outcome determined, payouts ready.
    Resolved,
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trading => write!(f, "trading"),
            Self::Locked => write!(f, "locked"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// A binary prediction market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: MarketStatus,
    /// Set iff `status == Resolved`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
    /// When trading locks.
    pub resolves_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub creator_id: UserId,
}

impl Market {
    /// Open a new market in TRADING.
    #[must_use]
    pub fn open(
        question: impl Into<String>,
        description: Option<String>,
        resolves_at: DateTime<Utc>,
        creator_id: UserId,
    ) -> Self {
        Self {
            id: MarketId::new(),
            question: question.into(),
            description,
            status: MarketStatus::Trading,
            outcome: None,
            created_at: Utc::now(),
            resolves_at,
            resolved_at: None,
            creator_id,
        }
    }

    #[must_use]
    pub fn is_trading(&self) -> bool {
        self.status == MarketStatus::Trading
    }

    /// Whether the auto-lock deadline has passed for a still-trading market.
    #[must_use]
    pub fn lock_due(&self, now: DateTime<Utc>) -> bool {
        self.status == MarketStatus::Trading && now > self.resolves_at
    }
}
