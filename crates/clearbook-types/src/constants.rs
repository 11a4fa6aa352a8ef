//! System-wide constants for the Clearbook matching service.

/// Basis points per quote unit. A price of 10 000 bp buys a share for one
/// full unit; a winning share pays out exactly this many basis points.
pub const PRICE_SCALE: u64 = 10_000;

/// Capacity of each book's bounded trade log.
pub const TRADE_LOG_CAPACITY: usize = 1000;

/// Default number of trades returned by the recent-trades query.
pub const RECENT_TRADES_DEFAULT: usize = 100;

/// Cadence of the market auto-lock sweep, in seconds.
pub const AUTO_LOCK_INTERVAL_SECS: u64 = 10;

/// Per-connection outbound push buffer (messages). A connection that falls
/// this far behind is evicted.
pub const PUSH_BUFFER_CAPACITY: usize = 256;

/// Clearinghouse WebSocket connect timeout, in seconds.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Clearinghouse request/response timeout, in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Challenge period declared on created app sessions, in seconds.
pub const SESSION_CHALLENGE_SECS: i64 = 3600;

/// Default API listen port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name.
pub const SERVICE_NAME: &str = "clearbook";
