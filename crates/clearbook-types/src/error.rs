//! Error types for the Clearbook matching service.
//!
//! All errors use the `CB_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order / book errors
//! - 2xx: Ledger errors
//! - 3xx: Market lifecycle errors
//! - 4xx: Channel / allocation errors
//! - 5xx: Session / transport errors
//! - 6xx: Push-channel / auth errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{ChannelId, MarketId, OrderId};

/// Central error enum for all Clearbook operations.
#[derive(Debug, Error)]
pub enum Error {
    // =================================================================
    // Order / Book Errors (1xx)
    // =================================================================
    /// Price is outside the basis-point probability range.
    #[error("CB_ERR_100: Invalid price {price}: must be between 0 and 10000 basis points")]
    InvalidPrice { price: u64 },

    /// Quantity must be a positive number of shares.
    #[error("CB_ERR_101: Invalid quantity: must be greater than 0")]
    InvalidQuantity,

    /// The requested order was not found in the book.
    #[error("CB_ERR_102: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// An order with this ID already rests in the book.
    #[error("CB_ERR_103: Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// Side was neither "buy" nor "sell".
    #[error("CB_ERR_104: Invalid side: {value:?} (must be \"buy\" or \"sell\")")]
    InvalidSide { value: String },

    /// Outcome was neither "YES" nor "NO".
    #[error("CB_ERR_105: Invalid outcome: {value:?} (must be \"YES\" or \"NO\")")]
    InvalidOutcome { value: String },

    /// Malformed or incomplete request body.
    #[error("CB_ERR_106: Invalid request: {reason}")]
    InvalidRequest { reason: String },

    // =================================================================
    // Ledger Errors (2xx)
    // =================================================================
    /// Not enough quote balance for the operation.
    #[error("CB_ERR_200: Insufficient balance: need {needed}bp, have {available}bp")]
    InsufficientBalance { needed: u64, available: u64 },

    /// Not enough shares of the selected outcome.
    #[error("CB_ERR_201: Insufficient shares: need {needed}, have {available}")]
    InsufficientShares { needed: u64, available: u64 },

    /// Deposit / mint / redeem amount must be positive.
    #[error("CB_ERR_202: Amount must be greater than 0")]
    InvalidAmount,

    // =================================================================
    // Market Lifecycle Errors (3xx)
    // =================================================================
    /// No market with this ID.
    #[error("CB_ERR_300: Market not found: {0}")]
    MarketNotFound(MarketId),

    /// The market is not accepting orders.
    #[error("CB_ERR_301: Market is not accepting orders")]
    MarketNotTrading,

    /// Illegal status transition (e.g. locking a locked market).
    #[error("CB_ERR_302: Invalid market status transition")]
    InvalidTransition,

    /// Resolution requires a locked market.
    #[error("CB_ERR_303: Market must be locked before resolution")]
    MarketNotLocked,

    /// The market already carries an outcome.
    #[error("CB_ERR_304: Market already resolved")]
    AlreadyResolved,

    // =================================================================
    // Channel / Allocation Errors (4xx)
    // =================================================================
    /// An allocation transfer would overdraw the sender.
    #[error("CB_ERR_400: Insufficient channel allocation: need {needed}, have {available}")]
    InsufficientAllocation { needed: u64, available: u64 },

    // =================================================================
    // Session / Transport Errors (5xx)
    // =================================================================
    /// No session bound to this channel.
    #[error("CB_ERR_500: Session not found: {0}")]
    SessionNotFound(ChannelId),

    /// The session has been closed; no further updates.
    #[error("CB_ERR_501: Session is not active")]
    SessionInactive,

    /// The clearinghouse connection is not established or not authenticated.
    #[error("CB_ERR_502: Clearinghouse not connected: {reason}")]
    NotConnected { reason: String },

    /// The clearinghouse rejected a request.
    #[error("CB_ERR_503: Clearinghouse error {code}: {message}")]
    Clearinghouse { code: i64, message: String },

    /// Transport-level failure (socket error, protocol violation).
    #[error("CB_ERR_504: Transport error: {0}")]
    Transport(String),

    /// A clearinghouse request did not answer within the deadline.
    #[error("CB_ERR_505: Request timed out")]
    Timeout,

    /// Signing a state or challenge failed.
    #[error("CB_ERR_506: Signing failed: {0}")]
    Signing(String),

    // =================================================================
    // Push / Auth Errors (6xx)
    // =================================================================
    /// The push-channel token was missing, malformed, or expired.
    #[error("CB_ERR_600: Unauthorized: {reason}")]
    Unauthorized { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Invariant violation, should be unreachable.
    #[error("CB_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("CB_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (bad env value, missing field).
    #[error("CB_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (socket, bind).
    #[error("CB_ERR_903: I/O error: {0}")]
    Io(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
