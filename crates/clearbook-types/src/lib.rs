//! # clearbook-types
//!
//! Shared types, errors, and configuration for the **Clearbook** prediction
//! market matching service.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`UserId`], [`MarketId`], [`TradeId`], [`ChannelId`]
//! - **Order model**: [`Order`], [`Side`], [`Outcome`], [`OrderStatus`]
//! - **Trade model**: [`Trade`]
//! - **Market model**: [`Market`], [`MarketStatus`]
//! - **Position model**: [`Position`]
//! - **Configuration**: [`ServiceConfig`]
//! - **Errors**: [`Error`] with `CB_ERR_` prefix codes
//! - **Constants**: basis-point scale, buffer sizes, timeouts

pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod market;
pub mod order;
pub mod outcome;
pub mod position;
pub mod trade;

// Re-export all primary types at crate root for ergonomic imports:
//   use clearbook_types::{Order, Side, Outcome, Trade, ...};

pub use config::*;
pub use error::*;
pub use ids::*;
pub use market::*;
pub use order::*;
pub use outcome::*;
pub use position::*;
pub use trade::*;

// Constants are accessed via `clearbook_types::constants::FOO`
// (not re-exported to avoid name collisions).
