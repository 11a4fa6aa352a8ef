//! # clearbook-channel
//!
//! Off-chain settlement channel support for Clearbook:
//!
//! - [`Allocations`]: versioned participant→amount map with a conserved
//!   total, mirroring the in-memory ledger onto the channel
//! - [`adjudicate`]: the pure validator deciding whether a candidate
//!   channel state is admissible against a proof history
//! - [`protocol`]: JSON-RPC 2.0 shapes for the clearinghouse wire
//! - [`ClearinghouseClient`]: WebSocket transport with request/response
//!   correlation and the auth handshake
//! - [`StateSigner`] / [`WalletSigner`]: the signing seam
//! - [`SessionManager`] / [`Session`]: app-session lifecycle with
//!   monotonic state versions

pub mod adjudicator;
pub mod allocation;
pub mod client;
pub mod protocol;
pub mod session;
pub mod signer;

pub use adjudicator::{adjudicate, ChannelConfig, SignedState};
pub use allocation::{AllocationSnapshot, Allocations};
pub use client::{ChannelTransport, ClearinghouseClient};
pub use protocol::{StateUpdate, WireAllocation};
pub use session::{Session, SessionManager};
pub use signer::{StateSigner, WalletSigner};

#[cfg(any(test, feature = "test-stubs"))]
pub use signer::StubSigner;
