//! # clearbook-market
//!
//! Market lifecycle for Clearbook: the [`MarketBoard`] owning every market
//! record and enforcing the `Trading -> Locked -> Resolved` state machine,
//! and the [`AutoLock`] sweep that locks markets once their resolution time
//! passes.

pub mod board;
pub mod lifecycle;

pub use board::MarketBoard;
pub use lifecycle::AutoLock;
