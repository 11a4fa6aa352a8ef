//! # clearbook-gateway
//!
//! The outward face of Clearbook: the broadcast [`Hub`] and push channel,
//! push-token validation, and the [`Service`] orchestration layer that
//! sequences admission, matching, ledger settlement, fan-out, and channel
//! updates. Also home of the `clearbook` binary.

pub mod auth;
pub mod event;
pub mod hub;
pub mod push;
pub mod service;

pub use auth::{Principal, StructuralValidator, TokenValidator};
pub use event::{Event, OrderbookEvent};
pub use hub::{ConnId, Hub};
pub use service::Service;
