//! Order handling for the visual-markets system.
//!
//! This crate provides:
//! - The exchange port and a recording in-memory exchange
//! - Per-player trading state and settled holdings
//! - The single-active-order-per-side overlay on exchange callbacks

pub mod exchange;
pub mod market;
pub mod memory;
pub mod trader;

pub use exchange::{Exchange, OrderFilter, OrderRequest};
pub use market::{Market, MarketRules, OrderOutcome, RejectReason};
pub use memory::InMemoryExchange;
pub use trader::{Shortfall, TrackedOrder, Trader};
